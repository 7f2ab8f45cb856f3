//! Engine configuration.
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! initial_capacity = 64
//! root_mode = 0o755
//! root_uid = 1000
//! root_gid = 1000
//! root_group_privileged = false
//! block_size = 4096
//! capacity_blocks = 262144
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Filesystem engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Inode slots allocated up front. The table doubles when they run out.
    pub initial_capacity: usize,
    /// Permission bits of the root directory.
    pub root_mode: u32,
    pub root_uid: u32,
    pub root_gid: u32,
    /// Whether a caller with gid 0 bypasses permission checks like uid 0.
    pub root_group_privileged: bool,
    /// Block size reported by statfs.
    pub block_size: u32,
    /// Size in blocks. File content beyond `capacity_blocks * block_size`
    /// bytes in total is refused with `ENOSPC`.
    pub capacity_blocks: u64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 10,
            root_mode: 0o777,
            root_uid: 0,
            root_gid: 0,
            root_group_privileged: true,
            block_size: 4096,
            capacity_blocks: 1024 * 1024,
        }
    }
}

impl FsConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Set the root directory's owner.
    pub fn with_root_owner(mut self, uid: u32, gid: u32) -> Self {
        self.root_uid = uid;
        self.root_gid = gid;
        self
    }

    /// Set the initial inode capacity.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
