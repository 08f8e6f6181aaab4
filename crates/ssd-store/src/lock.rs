//! Cross-process store locking.
//!
//! Separate invocations of the tool share one store file, so every mutation
//! holds an exclusive advisory lock on a sidecar `<store>.lock` file for the
//! whole read-modify-write. Acquisition polls with a bounded wait and never
//! blocks indefinitely.
//!
//! Uses the `fs2` crate for cross-platform file locking (MSRV 1.80 does not
//! have `std::fs::File::lock`).

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, StoreError};

/// A guard that holds the exclusive store lock.
///
/// The lock is released when the guard is dropped.
pub struct StoreLock {
    _file: File,
    lock_path: PathBuf,
}

impl StoreLock {
    /// Acquire the lock for `store_path`, polling every `poll` until
    /// `timeout` has elapsed.
    pub fn acquire(store_path: &Path, timeout: Duration, poll: Duration) -> Result<Self> {
        let lock_path = lock_path_for(store_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|source| StoreError::Unavailable {
                path: lock_path.clone(),
                source,
            })?;

        let started = Instant::now();
        loop {
            // Fully qualified so newer toolchains don't pick std's `File::try_lock_exclusive`.
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => {
                    debug!(lock = %lock_path.display(), waited = ?started.elapsed(), "acquired store lock");
                    return Ok(Self {
                        _file: file,
                        lock_path,
                    });
                }
                Err(e) if is_contended(&e) => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        return Err(StoreError::Locked {
                            path: store_path.to_path_buf(),
                            waited,
                        });
                    }
                    thread::sleep(poll.min(timeout - waited));
                }
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // The OS releases the lock when the file is closed.
        debug!(lock = %self.lock_path.display(), "releasing store lock");
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Get the lock file path for a store path.
///
/// - `/run/ss-hits-doit/ref-store` → `/run/ss-hits-doit/ref-store.lock`
/// - `/data/refs.csv` → `/data/refs.csv.lock`
pub fn lock_path_for(store_path: &Path) -> PathBuf {
    let mut name = store_path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}
