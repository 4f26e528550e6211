//! The Green's-function database directory.
//!
//! ```text
//! <dir>/pairs.json            canonical pairs, geometry arrays, tolerances
//! <dir>/tdata_dict.jsonl      one dataset per line: "<i>_t0", "<i>_tdata"
//! <dir>/tdata_dict.jsonl.lock present while a writer holds the directory
//! ```
//!
//! Opening scans the group once and keeps a key -> byte span index, so
//! reads are a seek plus one line parse. Appending the same key again
//! shadows the older line (last write wins).

use crate::error::DatabaseError;
use crate::jsonl::{validate_substrate_bytes, write_json_atomic};
use crate::lock::DatabaseLockGuard;
use crate::pairs::{PAIRS_FILE, PairsHeader, read_pairs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tremor_kernel::{GREEN_COMPONENTS, GreenTensor};

pub const GROUP_FILE: &str = "tdata_dict.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// One line of the group file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupRecord {
    Scalar {
        key: String,
        value: f64,
    },
    Tensor {
        key: String,
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
}

#[derive(Deserialize)]
struct KeyOnly {
    key: String,
}

pub fn t0_key(index: usize) -> String {
    format!("{index}_t0")
}

pub fn tdata_key(index: usize) -> String {
    format!("{index}_tdata")
}

#[derive(Debug, Clone, Copy)]
struct Span {
    offset: u64,
    len: usize,
    line: usize,
}

#[derive(Debug)]
pub struct GreenDatabase {
    dir: PathBuf,
    group_path: PathBuf,
    mode: AccessMode,
    file: Option<File>,
    index: BTreeMap<String, Span>,
    end: u64,
    lines: usize,
    header: Option<PairsHeader>,
    _lock: Option<DatabaseLockGuard>,
}

impl GreenDatabase {
    pub fn open(dir: impl AsRef<Path>, mode: AccessMode) -> Result<Self, DatabaseError> {
        let dir = dir.as_ref().to_path_buf();
        let group_path = dir.join(GROUP_FILE);

        let (file, lock) = match mode {
            AccessMode::ReadWrite => {
                fs::create_dir_all(&dir).map_err(|e| DatabaseError::io(&dir, e))?;
                let lock = DatabaseLockGuard::acquire(&group_path)?;
                let file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .create(true)
                    .open(&group_path)
                    .map_err(|e| DatabaseError::io(&group_path, e))?;
                (Some(file), Some(lock))
            }
            AccessMode::ReadOnly if group_path.exists() => {
                let file = File::open(&group_path).map_err(|e| DatabaseError::io(&group_path, e))?;
                (Some(file), None)
            }
            AccessMode::ReadOnly => (None, None),
        };

        let header = if dir.join(PAIRS_FILE).exists() {
            Some(read_pairs(&dir)?)
        } else {
            None
        };

        let mut db = Self {
            dir,
            group_path,
            mode,
            file,
            index: BTreeMap::new(),
            end: 0,
            lines: 0,
            header,
            _lock: lock,
        };
        db.scan()?;
        Ok(db)
    }

    fn scan(&mut self) -> Result<(), DatabaseError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| DatabaseError::io(&self.group_path, e))?;
        let mut offset = 0u64;
        let mut line = 0usize;
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| DatabaseError::io(&self.group_path, e))?;
            if read == 0 {
                break;
            }
            line += 1;
            if buf.last() != Some(&b'\n') {
                return Err(DatabaseError::Corrupt(format!(
                    "{}:{line}: truncated record",
                    self.group_path.display()
                )));
            }
            validate_substrate_bytes(&self.group_path, &buf)?;
            let trimmed = &buf[..buf.len() - 1];
            if !trimmed.iter().all(u8::is_ascii_whitespace) {
                let KeyOnly { key } =
                    serde_json::from_slice(trimmed).map_err(|e| DatabaseError::Parse {
                        path: self.group_path.display().to_string(),
                        line,
                        message: e.to_string(),
                    })?;
                self.index.insert(
                    key,
                    Span {
                        offset,
                        len: trimmed.len(),
                        line,
                    },
                );
            }
            offset += read as u64;
        }
        self.end = offset;
        self.lines = line;
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn header(&self) -> Option<&PairsHeader> {
        self.header.as_ref()
    }

    pub fn require_header(&self) -> Result<&PairsHeader, DatabaseError> {
        self.header
            .as_ref()
            .ok_or_else(|| DatabaseError::MissingHeader(self.dir.join(PAIRS_FILE).display().to_string()))
    }

    fn writable(&self) -> Result<&File, DatabaseError> {
        match (&self.file, self.mode) {
            (Some(file), AccessMode::ReadWrite) => Ok(file),
            _ => Err(DatabaseError::ReadOnly),
        }
    }

    /// Replace `pairs.json`; the directory lock is already held.
    pub fn write_header(&mut self, header: PairsHeader) -> Result<(), DatabaseError> {
        self.writable()?;
        header.validate()?;
        write_json_atomic(&self.dir.join(PAIRS_FILE), &header)?;
        self.header = Some(header);
        Ok(())
    }

    /// Drop every dataset so the group can be rebuilt from scratch.
    pub fn reset_group(&mut self) -> Result<(), DatabaseError> {
        let file = self.writable()?;
        file.set_len(0)
            .map_err(|e| DatabaseError::io(&self.group_path, e))?;
        self.index.clear();
        self.end = 0;
        self.lines = 0;
        Ok(())
    }

    fn append(&mut self, record: &GroupRecord) -> Result<(), DatabaseError> {
        let key = match record {
            GroupRecord::Scalar { key, .. } | GroupRecord::Tensor { key, .. } => key.clone(),
        };
        let mut line =
            serde_json::to_vec(record).map_err(|e| DatabaseError::Serialize(e.to_string()))?;
        let len = line.len();
        line.push(b'\n');
        let mut file = self.writable()?;
        file.write_all(&line)
            .map_err(|e| DatabaseError::io(&self.group_path, e))?;
        self.lines += 1;
        self.index.insert(
            key,
            Span {
                offset: self.end,
                len,
                line: self.lines,
            },
        );
        self.end += line.len() as u64;
        Ok(())
    }

    /// Append the `t0` and raw tensor of canonical entry `index`.
    pub fn put_entry(
        &mut self,
        index: usize,
        t0: f64,
        tdata: &GreenTensor,
    ) -> Result<(), DatabaseError> {
        self.append(&GroupRecord::Scalar {
            key: t0_key(index),
            value: t0,
        })?;
        self.append(&GroupRecord::Tensor {
            key: tdata_key(index),
            rows: tdata.nt(),
            cols: GREEN_COMPONENTS,
            data: tdata.as_slice().to_vec(),
        })
    }

    pub fn record(&self, key: &str) -> Result<GroupRecord, DatabaseError> {
        let span = *self
            .index
            .get(key)
            .ok_or_else(|| DatabaseError::MissingEntry(key.to_string()))?;
        let Some(file) = &self.file else {
            return Err(DatabaseError::MissingEntry(key.to_string()));
        };
        let mut reader = file;
        reader
            .seek(SeekFrom::Start(span.offset))
            .map_err(|e| DatabaseError::io(&self.group_path, e))?;
        let mut buf = vec![0u8; span.len];
        reader
            .read_exact(&mut buf)
            .map_err(|e| DatabaseError::io(&self.group_path, e))?;
        serde_json::from_slice(&buf).map_err(|e| DatabaseError::Parse {
            path: self.group_path.display().to_string(),
            line: span.line,
            message: e.to_string(),
        })
    }

    pub fn t0(&self, index: usize) -> Result<f64, DatabaseError> {
        let key = t0_key(index);
        match self.record(&key)? {
            GroupRecord::Scalar { value, .. } => Ok(value),
            GroupRecord::Tensor { .. } => Err(DatabaseError::WrongKind {
                key,
                expected: "scalar",
            }),
        }
    }

    pub fn tdata(&self, index: usize) -> Result<GreenTensor, DatabaseError> {
        let key = tdata_key(index);
        match self.record(&key)? {
            GroupRecord::Tensor {
                rows, cols, data, ..
            } if cols == GREEN_COMPONENTS => Ok(GreenTensor::new(rows, data)?),
            _ => Err(DatabaseError::WrongKind {
                key,
                expected: "9-column tensor",
            }),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.index.contains_key(&t0_key(index)) && self.index.contains_key(&tdata_key(index))
    }

    /// Canonical entries with both datasets present.
    pub fn entries(&self) -> BTreeSet<usize> {
        self.index
            .keys()
            .filter_map(|key| key.strip_suffix("_tdata")?.parse::<usize>().ok())
            .filter(|&i| self.contains(i))
            .collect()
    }

    pub fn flush(&self) -> Result<(), DatabaseError> {
        self.writable()?
            .sync_all()
            .map_err(|e| DatabaseError::io(&self.group_path, e))
    }
}
