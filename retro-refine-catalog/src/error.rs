use thiserror::Error;

/// Errors loading the title synonym table.
#[derive(Debug, Error)]
pub enum TitleMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid title mappings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("title mappings contain a cycle through '{0}'")]
    Cycle(String),
}

impl TitleMapError {
    pub fn cycle(title: impl Into<String>) -> Self {
        Self::Cycle(title.into())
    }
}
