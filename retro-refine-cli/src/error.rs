use thiserror::Error;

use retro_refine_fetch::{CacheError, FetchError};
use retro_refine_lib::ConfigError;

/// Errors that can occur during CLI command execution.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    /// I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Unusable configuration; nothing was scanned
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Acquisition cache or manifest error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Network setup error
    #[error("Network error: {0}")]
    Fetch(#[from] FetchError),

    /// Runtime creation or async error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// The user pressed Ctrl-C
    #[error("Interrupted")]
    Interrupted,

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl CliError {
    pub(crate) fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub(crate) fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Process exit status for this error.
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}
