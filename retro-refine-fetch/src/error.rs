/// Errors from listing fetches and file downloads.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("server ignored the byte range for {0}")]
    RangeIgnored(String),

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn status(url: impl Into<String>, status: u16) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether trying again could help.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            Self::Http(e) => !e.is_builder() && !e.is_redirect(),
            Self::Io(_) | Self::SizeMismatch { .. } | Self::RangeIgnored(_) | Self::Other(_) => {
                true
            }
            Self::InvalidUrl(_) | Self::Cancelled => false,
        }
    }
}

/// Errors from the acquisition cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
