//! Advisory per-session-file locking.
//!
//! A sibling `.lock` file created with `create_new` (O_EXCL) serializes
//! writers across separate invocations. Acquisition polls with a bounded
//! wait; the lock is released on every exit path through the drop guard.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::VaultError;

/// How often to re-check a held lock.
const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Give up after this long and report the lock as busy.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

/// Exclusive write access to one session file. Removing the lock file
/// on drop releases it for the next writer.
pub struct SessionLock {
    path: PathBuf,
}

impl SessionLock {
    /// Acquire the lock guarding `session_path`, waiting up to the
    /// bound for a concurrent writer to finish.
    pub fn acquire(session_path: &Path) -> Result<Self, VaultError> {
        let path = lock_path(session_path);
        let deadline = Instant::now() + ACQUIRE_TIMEOUT;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Best effort; the pid helps diagnose a stale lock
                    let _ = write!(file, "{}", std::process::id());
                    debug!(lock = %path.display(), "session lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(VaultError::LockTimeout(format!(
                            "session file busy, lock held at {} (retry shortly)",
                            path.display()
                        )));
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(VaultError::Io(e)),
            }
        }
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release session lock");
        }
    }
}

fn lock_path(session_path: &Path) -> PathBuf {
    let mut name = session_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    session_path.with_file_name(name)
}
