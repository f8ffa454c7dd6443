use std::path::PathBuf;

use bw_compiler::{ChecksumError, HeaderError};

/// Error type for reading a profile's list file.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid filter list '{path}': {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: HeaderError,
    },
}

/// Error type for list updates.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Profile '{0}' has no update URL")]
    NoUpdateUrl(String),
    #[error("Download failed: {0}")]
    Transport(String),
    #[error("Download failed with HTTP status {0}")]
    HttpStatus(u16),
    #[error("Downloaded list is invalid: {0}")]
    Malformed(#[from] HeaderError),
    #[error(transparent)]
    Checksum(#[from] ChecksumError),
    #[error("Failed to save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Update superseded by a newer request")]
    Superseded,
}

/// Error type for registry bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to create profile directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to list '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
