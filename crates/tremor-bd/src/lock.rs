//! Exclusive writer lock for a database directory.

use crate::error::DatabaseError;
use chrono::Utc;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn database_lock_path(group_path: &Path) -> PathBuf {
    let mut path: OsString = group_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

/// Held by the single read-write opener; removed on drop.
#[derive(Debug)]
pub struct DatabaseLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl DatabaseLockGuard {
    pub fn acquire(group_path: &Path) -> Result<Self, DatabaseError> {
        let lock_path = database_lock_path(group_path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| lock_io(&lock_path, e))?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(DatabaseError::LockBusy {
                    lock_path: lock_path.display().to_string(),
                })
            }
            Err(err) => Err(lock_io(&lock_path, err)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

fn lock_io(lock_path: &Path, err: std::io::Error) -> DatabaseError {
    DatabaseError::LockIo {
        lock_path: lock_path.display().to_string(),
        message: err.to_string(),
    }
}

impl Drop for DatabaseLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "tremor-lock-{prefix}-{}-{unique}.jsonl",
            std::process::id()
        ))
    }

    #[test]
    fn second_acquire_is_busy_until_release() {
        let path = temp_path("busy");
        let guard = DatabaseLockGuard::acquire(&path).expect("first acquire should succeed");
        assert!(guard.path().exists());
        assert!(matches!(
            DatabaseLockGuard::acquire(&path),
            Err(DatabaseError::LockBusy { .. })
        ));
        drop(guard);
        let again = DatabaseLockGuard::acquire(&path).expect("lock should be free again");
        drop(again);
        assert!(!database_lock_path(&path).exists());
    }
}
