//! Single-instance guard.
//!
//! Two daemons buffering the same streams would double-transcribe and
//! fight over the port; an advisory file lock taken before the listener
//! binds keeps it to one. The lock dies with the process, so a crashed
//! daemon never wedges the next start.

use crate::error::{Result, ScribedError};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Held advisory lock; released and removed on drop.
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Default lock path under the system temp directory.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join("scribed.lock")
    }

    /// Acquires the lock, writing this process's pid into the file.
    ///
    /// # Errors
    /// `InstanceLock` when another process already holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(ScribedError::InstanceLock {
                message: format!(
                    "another instance is already running (lock file: {})",
                    path.display()
                ),
            });
        }

        file.set_len(0)?;
        write!(file, "{}", std::process::id())?;
        file.flush()?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        let _ = std::fs::remove_file(&self.path);
    }
}
