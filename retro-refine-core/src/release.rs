use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::region::Region;

/// Where a candidate file lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Local(PathBuf),
    /// Absolute URL of a file in a remote listing
    Remote(String),
}

impl Location {
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => write!(f, "{url}"),
        }
    }
}

/// A file found by a scanner, before its name has been parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRef {
    /// Identifier of the configured source the file came from
    pub source_id: String,
    /// Platform short name
    pub platform: String,
    /// Decoded file name, including the extension
    pub file_name: String,
    pub location: Location,
    /// Size reported by the listing or the filesystem
    pub size_hint: Option<u64>,
    /// `size_hint` is a byte count, not a rounded `1.5M`-style figure
    #[serde(default)]
    pub size_exact: bool,
}

/// Whether a release comes from an official dump set or a fan-translation
/// collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OriginKind {
    #[default]
    Official,
    FanTranslation,
}

impl std::fmt::Display for OriginKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Official => write!(f, "official"),
            Self::FanTranslation => write!(f, "fan translation"),
        }
    }
}

/// Status flags derived from the whole file name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFlags {
    pub bios: bool,
    pub beta: bool,
    pub proto: bool,
    pub demo: bool,
    pub rerelease: bool,
    pub compilation: bool,
    pub unlicensed: bool,
    pub translation: bool,
    pub hack: bool,
}

/// One parsed release. Immutable once built by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCandidate {
    pub source_id: String,
    /// File name as found, extension included
    pub raw_name: String,
    pub platform: String,
    /// Title text with every tag group removed
    pub title: String,
    pub canonical_title: String,
    /// Region tags in the order they appear, without duplicates
    pub regions: Vec<Region>,
    /// Language codes in the order they appear (e.g. `"En"`, `"Fr"`)
    pub languages: Vec<String>,
    /// Ordinal revision; 0 for the original release
    pub revision: u32,
    /// Display form of the winning revision marker (`"Rev B"`, `"v1.1"`)
    pub revision_label: Option<String>,
    pub flags: ReleaseFlags,
    pub year: Option<u16>,
    pub size: Option<u64>,
    #[serde(default)]
    pub size_exact: bool,
    pub checksum: Option<String>,
    pub origin: OriginKind,
    pub location: Location,
    /// First-seen scan order
    pub seq: usize,
}

impl ReleaseCandidate {
    /// English if it carries an `En` language tag, an English region, or a
    /// translation.
    pub fn is_english(&self) -> bool {
        self.flags.translation
            || self.languages.iter().any(|l| l.eq_ignore_ascii_case("en"))
            || self.regions.iter().any(Region::is_english)
    }

    /// An official release tagged with an English-speaking region.
    pub fn is_official_english(&self) -> bool {
        self.origin == OriginKind::Official
            && !self.flags.translation
            && self.regions.iter().any(Region::is_english)
    }

    pub fn has_region(&self, region: Region) -> bool {
        self.regions.contains(&region)
    }
}
