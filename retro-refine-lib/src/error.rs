use thiserror::Error;

use retro_refine_catalog::TitleMapError;
use retro_refine_core::{PlatformTableError, RegionParseError};

/// Errors that make a configuration unusable.
///
/// These are reported before any scanning starts; no partial work is done.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Region(#[from] RegionParseError),

    #[error("invalid include/exclude pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("platform table: {0}")]
    PlatformTable(#[from] PlatformTableError),

    #[error("title mappings: {0}")]
    TitleMappings(#[from] TitleMapError),

    #[error("no sources configured")]
    NoSources,

    #[error("--commit needs a destination (set `dest` or pass --dest)")]
    MissingDest,

    #[error("unknown platform: '{0}'")]
    UnknownPlatform(String),

    #[error("invalid source '{0}'")]
    InvalidSource(String),

    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn invalid_source(msg: impl Into<String>) -> Self {
        Self::InvalidSource(msg.into())
    }
}
