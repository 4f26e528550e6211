//! Atomic file replacement and substrate checks.
//!
//! Writers go through a temp file in the same directory, fsync it, rename
//! it over the target and fsync the directory. Readers reject files that
//! contain NUL bytes or invalid UTF-8 before parsing anything.

use crate::error::DatabaseError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Replace `path` with the pretty JSON form of `value`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), DatabaseError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| DatabaseError::io(parent, e))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), DatabaseError> {
        let file = File::create(&tmp_path).map_err(|e| DatabaseError::io(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)
            .map_err(|e| DatabaseError::Serialize(e.to_string()))?;
        writeln!(writer).map_err(|e| DatabaseError::io(&tmp_path, e))?;
        writer.flush().map_err(|e| DatabaseError::io(&tmp_path, e))?;
        let file = writer
            .into_inner()
            .map_err(|e| DatabaseError::io(&tmp_path, e))?;
        file.sync_all().map_err(|e| DatabaseError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DatabaseError::Io {
            path: format!("{} -> {}", tmp_path.display(), path.display()),
            message: e.to_string(),
        }
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let dir = File::open(parent).map_err(|e| DatabaseError::io(parent, e))?;
        dir.sync_all().map_err(|e| DatabaseError::io(parent, e))?;
    }

    Ok(())
}

/// Read and parse a JSON document after substrate validation.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DatabaseError> {
    let bytes = fs::read(path).map_err(|e| DatabaseError::io(path, e))?;
    validate_substrate_bytes(path, &bytes)?;
    serde_json::from_slice(&bytes).map_err(|e| DatabaseError::Parse {
        path: path.display().to_string(),
        line: e.line(),
        message: e.to_string(),
    })
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

pub(crate) fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), DatabaseError> {
    if bytes.contains(&0) {
        return Err(DatabaseError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(DatabaseError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "tremor-jsonl-{prefix}-{}-{unique}.json",
            std::process::id()
        ))
    }

    #[test]
    fn read_json_rejects_nul_payload() {
        let path = temp_path("nul");
        fs::write(&path, b"{\"a\":1}\n\0garbage").expect("fixture should write");
        match read_json::<Value>(&path) {
            Err(DatabaseError::Corrupt(message)) => assert!(message.contains("contains NUL")),
            other => panic!("expected corrupt substrate error, got {other:?}"),
        }
        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_json_rejects_non_utf8_payload() {
        let path = temp_path("non-utf8");
        fs::write(&path, [0xff, 0xfe, 0xfd]).expect("fixture should write");
        match read_json::<Value>(&path) {
            Err(DatabaseError::Corrupt(message)) => assert!(message.contains("non-UTF-8")),
            other => panic!("expected corrupt substrate error, got {other:?}"),
        }
        let _ = fs::remove_file(path);
    }

    #[test]
    fn write_json_atomic_replaces_and_leaves_no_temp_files() {
        let path = temp_path("atomic");
        write_json_atomic(&path, &json!({"version": 1})).expect("first write should succeed");
        write_json_atomic(&path, &json!({"version": 2})).expect("second write should succeed");
        let value: Value = read_json(&path).expect("read should succeed");
        assert_eq!(value["version"], 2);

        let parent = path.parent().expect("temp file should have a parent");
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .expect("temp name should be utf-8");
        let leftovers = fs::read_dir(parent)
            .expect("temp dir should list")
            .filter_map(Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(&format!("{name}.tmp.")))
            })
            .count();
        assert_eq!(leftovers, 0);
        let _ = fs::remove_file(path);
    }
}
