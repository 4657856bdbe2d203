//! Progress events emitted by scanners and the acquisition pipeline.
//!
//! Library code never touches the terminal; frontends receive these over a
//! tokio channel and render them however they like.

/// Progress while enumerating a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A directory (local) or listing page (network) was read
    DirectoryListed {
        location: String,
        files: usize,
        subdirs: usize,
    },

    /// A listing fetch failed and will be tried again
    Retrying {
        location: String,
        attempt: u32,
        message: String,
    },

    /// A directory was given up on; its siblings continue
    DirectoryFailed { location: String, message: String },

    /// A candidate file whose platform could not be determined
    Unclassified { location: String },
}

impl ScanEvent {
    pub fn failed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DirectoryFailed {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Progress while acquiring the selected files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireEvent {
    /// The batch is about to start
    BatchStarted {
        total: usize,
        cached: usize,
        parallel: usize,
        connections: usize,
        /// Sum of the known sizes of the files to download
        total_bytes: u64,
    },

    CacheHit { file: String },

    Started { file: String, size: Option<u64> },

    /// `bytes` more bytes of `file` arrived
    Bytes { file: String, bytes: u64 },

    Retrying {
        file: String,
        attempt: u32,
        message: String,
    },

    Finished { file: String, bytes: u64 },

    Failed { file: String, message: String },

    /// The watchdog aborted the batch with `pending` items unfinished
    Stalled { pending: usize },
}

impl AcquireEvent {
    pub fn failed(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Name of the file the event concerns, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::CacheHit { file }
            | Self::Started { file, .. }
            | Self::Bytes { file, .. }
            | Self::Retrying { file, .. }
            | Self::Finished { file, .. }
            | Self::Failed { file, .. } => Some(file),
            Self::BatchStarted { .. } | Self::Stalled { .. } => None,
        }
    }
}
