use thiserror::Error;

/// Errors raised while turning a filename into release metadata.
///
/// A parse error excludes a single item; the surrounding batch continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty file name")]
    Empty,

    #[error("file name contains control characters: {0:?}")]
    ControlCharacters(String),

    #[error("unbalanced tag group in {0:?}")]
    Unbalanced(String),

    #[error("no title left after removing tags from {0:?}")]
    NoTitle(String),
}

impl ParseError {
    pub fn control_characters(name: impl Into<String>) -> Self {
        Self::ControlCharacters(name.into())
    }

    pub fn unbalanced(name: impl Into<String>) -> Self {
        Self::Unbalanced(name.into())
    }

    pub fn no_title(name: impl Into<String>) -> Self {
        Self::NoTitle(name.into())
    }
}

/// Errors loading a user platform table.
#[derive(Debug, Error)]
pub enum PlatformTableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid platform table: {0}")]
    Toml(#[from] toml::de::Error),
}
