use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Registry configuration.
///
/// ```json
/// {
///   "profile_dir": "/home/user/.config/blockwise/blocking",
///   "bundled_dir": "/usr/share/blockwise/blocking",
///   "auto_update": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Per-user directory holding one `.txt` list per profile.
    pub profile_dir: PathBuf,

    /// Directory of default lists copied into `profile_dir` when missing.
    #[serde(default)]
    pub bundled_dir: Option<PathBuf>,

    /// Download stale lists after bootstrap when a tokio runtime is running.
    #[serde(default = "default_auto_update")]
    pub auto_update: bool,

    /// Expiry used for lists without an `Expires` header.
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: u32,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_auto_update() -> bool {
    true
}

fn default_expiry_days() -> u32 {
    4
}

fn default_user_agent() -> String {
    format!("blockwise/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl RegistryConfig {
    /// Default configuration for a profile directory.
    pub fn new(profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            bundled_dir: None,
            auto_update: default_auto_update(),
            default_expiry_days: default_expiry_days(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Load a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
