//! Database configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::block::MIN_BLOCK_SIZE;
use crate::{DbError, DbResult};

/// Default slot size: 1 MiB.
pub const DEFAULT_MAX_ROOT_BLOCK_SIZE: usize = 1 << 20;

pub const ENV_PATH: &str = "VCOW_DB_PATH";
pub const ENV_MAX_ROOT_BLOCK_SIZE: &str = "VCOW_MAX_ROOT_BLOCK_SIZE";
pub const ENV_SYNC_ON_WRITE: &str = "VCOW_SYNC_ON_WRITE";

/// Configuration for one database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Path of the database file.
    pub path: PathBuf,
    /// Size of each of the two root block slots. The file is twice this.
    pub max_root_block_size: usize,
    /// `fsync` every write before adopting the new root.
    pub sync_on_write: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("vcow.db"),
            max_root_block_size: DEFAULT_MAX_ROOT_BLOCK_SIZE,
            sync_on_write: true,
        }
    }
}

impl DbConfig {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_root_block_size(mut self, size: usize) -> Self {
        self.max_root_block_size = size;
        self
    }

    #[must_use]
    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Read settings from `VCOW_*` environment variables over the defaults.
    pub fn from_env() -> DbResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_PATH) {
            config.path = PathBuf::from(path);
        }
        if let Some(size) = lookup(ENV_MAX_ROOT_BLOCK_SIZE) {
            config.max_root_block_size = size.trim().parse().map_err(|e| {
                DbError::Config(format!("{ENV_MAX_ROOT_BLOCK_SIZE}={size:?}: {e}"))
            })?;
        }
        if let Some(sync) = lookup(ENV_SYNC_ON_WRITE) {
            config.sync_on_write = match sync.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(DbError::Config(format!(
                        "{ENV_SYNC_ON_WRITE}={sync:?} is not a boolean"
                    )));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the slot size can hold a block and fits the int32 header.
    pub fn validate(&self) -> DbResult<()> {
        if self.max_root_block_size < MIN_BLOCK_SIZE {
            return Err(DbError::Config(format!(
                "max_root_block_size {} is below the minimum block size {MIN_BLOCK_SIZE}",
                self.max_root_block_size
            )));
        }
        if i32::try_from(self.max_root_block_size).is_err() {
            return Err(DbError::Config(format!(
                "max_root_block_size {} does not fit in the 32-bit block header",
                self.max_root_block_size
            )));
        }
        Ok(())
    }
}
