//! Single-instance guard for a mirror tree.
//!
//! The sentinel is created with `create_new`, so two processes racing for
//! it cannot both succeed. It lives as long as the [`ProcessLock`] guard and
//! is removed in `Drop`, which also runs during panic unwinding. A sentinel
//! left by a killed process has to be removed by hand.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, MirrorResult};
use crate::storage::ensure_dir;

/// Diagnostic content of the sentinel file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    /// Epoch seconds at acquisition.
    pub started_at: i64,
}

/// Held process lock; dropping it releases the lock.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Take the lock at `path`, failing with [`MirrorError::LockHeld`] if
    /// another instance holds it.
    pub fn acquire(path: impl Into<PathBuf>) -> MirrorResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(MirrorError::LockHeld { path });
            }
            Err(e) => return Err(MirrorError::io(&path, e)),
        };

        // From here on the guard owns the sentinel, so a failed write still
        // removes it.
        let lock = Self { path };
        let info = LockInfo {
            pid: std::process::id(),
            started_at: chrono::Utc::now().timestamp(),
        };
        let data = serde_json::to_vec(&info).map_err(|source| MirrorError::Json {
            path: lock.path.clone(),
            source,
        })?;
        file.write_all(&data)
            .map_err(|e| MirrorError::io(&lock.path, e))?;

        tracing::debug!(path = %lock.path.display(), pid = info.pid, "Lock acquired");
        Ok(lock)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Who holds the lock at `path`, if the sentinel is readable.
    pub fn holder(path: &Path) -> Option<LockInfo> {
        let data = fs::read(path).ok()?;
        serde_json::from_slice(&data).ok()
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to release lock"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_while_held() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("inprogress.lock");

        let lock = ProcessLock::acquire(&path).unwrap();
        assert!(path.is_file());
        assert!(matches!(
            ProcessLock::acquire(&path),
            Err(MirrorError::LockHeld { .. })
        ));

        drop(lock);
        assert!(!path.exists());
        assert!(ProcessLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_holder_records_pid() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("inprogress.lock");
        let _lock = ProcessLock::acquire(&path).unwrap();

        let info = ProcessLock::holder(&path).unwrap();
        assert_eq!(info.pid, std::process::id());
    }

    #[test]
    fn test_released_on_panic() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("inprogress.lock");

        let result = std::panic::catch_unwind(|| {
            let _lock = ProcessLock::acquire(&path).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_missing_root() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("new/root/inprogress.lock");
        let lock = ProcessLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path.as_path());
    }
}
