use std::ffi::OsString;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use ssd_hit::HitConfig;
use ssd_store::StoreConfig;

/// Environment variable naming the store file.
pub const STORE_ENV: &str = "SSD_STORE";

/// Optional TOML configuration file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub store_path: Option<PathBuf>,
    pub lock_timeout_ms: Option<u64>,
    pub copy_buffer_size: Option<usize>,
}

impl Settings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Build the runtime configuration. The store path comes from `flag`,
    /// then `env`, then the file, then the default location.
    pub fn resolve(
        &self,
        env: Option<OsString>,
        flag: Option<PathBuf>,
    ) -> anyhow::Result<(StoreConfig, HitConfig)> {
        let mut store = match flag
            .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
            .or_else(|| self.store_path.clone())
        {
            Some(path) => StoreConfig::new(path),
            None => StoreConfig::default(),
        };
        if let Some(ms) = self.lock_timeout_ms {
            store = store.with_lock_timeout(Duration::from_millis(ms));
        }

        let mut hit = HitConfig::default();
        if let Some(size) = self.copy_buffer_size {
            let Some(size) = NonZeroUsize::new(size) else {
                bail!("copy_buffer_size must be at least 1");
            };
            hit.buffer_size = size;
        }
        Ok((store, hit))
    }
}
