//! Store location and locking configuration.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directory under the runtime dir shared by every tool.
pub const STORE_DIR_NAME: &str = "ss-hits-doit";
/// File name of the reference store inside [`STORE_DIR_NAME`].
pub const STORE_FILE_NAME: &str = "ref-store";

/// Where the store lives and how long mutations wait for the lock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub lock_timeout: Duration,
    pub lock_poll_interval: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            lock_timeout: Duration::from_secs(5),
            lock_poll_interval: Duration::from_millis(25),
        }
    }
}

/// `<runtime-dir>/ss-hits-doit/ref-store`, where the runtime dir is
/// `$XDG_RUNTIME_DIR` when set and the system temp dir otherwise.
pub fn default_store_path() -> PathBuf {
    let runtime_dir = env::var_os("XDG_RUNTIME_DIR")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);
    runtime_dir.join(STORE_DIR_NAME).join(STORE_FILE_NAME)
}
