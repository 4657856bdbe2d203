//! Record of one acquisition batch, written as `manifest.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::verify::Verification;

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestItem {
    pub platform: String,
    pub file_name: String,
    pub url: String,
    /// Cache path of the finished file; absent for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

/// Why a batch stopped before every item finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The watchdog saw no progress for its whole window
    Stalled,
    /// The user cancelled
    Interrupted,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stalled => write!(f, "stalled"),
            Self::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub succeeded: Vec<ManifestItem>,
    pub failed: Vec<ManifestItem>,
    /// Already in the cache; not fetched
    pub skipped: Vec<ManifestItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
    pub started: String,
    pub finished: String,
}

impl Manifest {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Every item that ended up with a local file.
    pub fn available(&self) -> impl Iterator<Item = &ManifestItem> {
        self.skipped.iter().chain(self.succeeded.iter())
    }

    /// Write `manifest.json` into `dir`, replacing any previous one.
    pub fn write(&self, dir: &Path) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(MANIFEST_FILE);
        let tmp = dir.join(format!("{MANIFEST_FILE}.tmp"));
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, CacheError> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}
