use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tremor_bd::{
    AccessMode, DatabaseError, GROUP_FILE, GreenDatabase, PairsHeader, database_lock_path,
    read_pairs, scenario_digest, write_pairs,
};
use tremor_kernel::{
    DedupConfig, Deduplicator, GreenTensor, PairTable, PointSource, Station, Tolerance,
};

struct TempDirGuard {
    path: PathBuf,
}

impl TempDirGuard {
    fn new(prefix: &str) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "tremor-bd-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

fn sample_header() -> PairsHeader {
    let stations = vec![Station::new([1.0, 0.0, 0.0]), Station::new([4.0, 0.0, 0.0])];
    let sources = vec![PointSource::new([0.0, 0.0, 1.0], [0.0; 3])];
    let table = PairTable::build(&stations, &sources);
    let outcome = Deduplicator::run(DedupConfig::default(), &table).expect("dedup should run");
    let digest = scenario_digest(&stations, &sources, &Tolerance::default()).expect("digest");
    PairsHeader::from_canonical(&outcome.canonical, &Tolerance::default(), digest, 2, 1)
}

fn tensor(nt: usize, scale: f64) -> GreenTensor {
    let data = (0..nt * 9).map(|k| k as f64 * scale).collect();
    GreenTensor::new(nt, data).expect("tensor shape should match")
}

#[test]
fn entries_survive_reopen_read_only() {
    let dir = TempDirGuard::new("reopen");
    {
        let mut db = GreenDatabase::open(dir.path(), AccessMode::ReadWrite)
            .expect("read-write open should succeed");
        db.write_header(sample_header()).expect("header should write");
        db.put_entry(0, 0.25, &tensor(4, 1.0)).expect("entry 0");
        db.put_entry(1, 0.75, &tensor(3, 0.5)).expect("entry 1");
        db.flush().expect("flush");
    }

    let db = GreenDatabase::open(dir.path(), AccessMode::ReadOnly)
        .expect("read-only open should succeed");
    assert_eq!(db.entries().into_iter().collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(db.t0(1).expect("t0"), 0.75);
    assert_eq!(db.tdata(0).expect("tdata"), tensor(4, 1.0));
    assert_eq!(db.require_header().expect("header").len(), 2);
    assert!(matches!(
        db.t0(2),
        Err(DatabaseError::MissingEntry(key)) if key == "2_t0"
    ));
}

#[test]
fn read_only_handle_cannot_write() {
    let dir = TempDirGuard::new("read-only");
    let mut db = GreenDatabase::open(dir.path(), AccessMode::ReadOnly)
        .expect("read-only open of empty dir should succeed");
    assert!(db.header().is_none());
    assert!(matches!(
        db.put_entry(0, 0.0, &tensor(2, 1.0)),
        Err(DatabaseError::ReadOnly)
    ));
}

#[test]
fn writer_lock_is_exclusive_and_released_on_drop() {
    let dir = TempDirGuard::new("lock");
    let db = GreenDatabase::open(dir.path(), AccessMode::ReadWrite).expect("first writer");
    assert!(database_lock_path(&dir.path().join(GROUP_FILE)).exists());
    assert!(matches!(
        GreenDatabase::open(dir.path(), AccessMode::ReadWrite),
        Err(DatabaseError::LockBusy { .. })
    ));
    assert!(matches!(
        write_pairs(dir.path(), &sample_header()),
        Err(DatabaseError::LockBusy { .. })
    ));
    drop(db);
    write_pairs(dir.path(), &sample_header()).expect("lock should be free after drop");
    assert_eq!(read_pairs(dir.path()).expect("pairs").pairs_to_compute, vec![[0, 0], [1, 0]]);
}

#[test]
fn reset_group_starts_anew_and_later_writes_win() {
    let dir = TempDirGuard::new("reset");
    let mut db = GreenDatabase::open(dir.path(), AccessMode::ReadWrite).expect("writer");
    db.put_entry(0, 1.0, &tensor(2, 1.0)).expect("entry");
    db.put_entry(0, 2.0, &tensor(2, 2.0)).expect("overwrite");
    assert_eq!(db.t0(0).expect("t0"), 2.0);
    assert_eq!(db.tdata(0).expect("tdata"), tensor(2, 2.0));

    db.reset_group().expect("reset");
    assert!(db.entries().is_empty());
    db.put_entry(3, 0.5, &tensor(2, 3.0)).expect("entry after reset");
    drop(db);

    let reopened = GreenDatabase::open(dir.path(), AccessMode::ReadOnly).expect("reader");
    assert_eq!(reopened.entries().into_iter().collect::<Vec<_>>(), vec![3]);
    assert_eq!(reopened.tdata(3).expect("tdata"), tensor(2, 3.0));
}

#[test]
fn truncated_group_is_reported_as_corrupt() {
    let dir = TempDirGuard::new("truncated");
    fs::write(
        dir.path().join(GROUP_FILE),
        b"{\"kind\":\"scalar\",\"key\":\"0_t0\",\"value\":1.0}\n{\"kind\":\"scal",
    )
    .expect("fixture should write");
    match GreenDatabase::open(dir.path(), AccessMode::ReadOnly) {
        Err(DatabaseError::Corrupt(message)) => assert!(message.contains("truncated")),
        other => panic!("expected corrupt group error, got {other:?}"),
    }
}
