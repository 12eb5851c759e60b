//! The exclusive lock that keeps two daemons out of one data directory.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

/// A pid file created exclusively at startup and removed on drop.
///
/// Creation fails if the file already exists, which means another
/// instance is running (or died without cleanup; the error message tells
/// the operator which file to inspect).
pub struct LockFile {
    path: PathBuf,
}

impl LockFile {
    pub fn acquire(path: &Path) -> std::io::Result<LockFile> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(LockFile {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %error, "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("spvd.lock");

        let lock = LockFile::acquire(&path).expect("first acquisition succeeds");
        assert!(path.exists());
        assert!(LockFile::acquire(&path).is_err());

        drop(lock);
        assert!(!path.exists());
        LockFile::acquire(&path).expect("the lock can be taken again");
    }
}
