//! Platform identities and the folder-alias / file-extension lookup table.
//!
//! [`Platform`] is the built-in catalog of systems the tool knows about.
//! [`PlatformTable`] is the read-only lookup built from it (optionally
//! extended by a user TOML file) and handed to the scanners by reference.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::PlatformTableError;

/// Built-in platform identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    // Nintendo
    Nes,
    Fds,
    Snes,
    N64,
    GameCube,
    Wii,
    GameBoy,
    GameBoyColor,
    Gba,
    Ds,
    N3ds,
    VirtualBoy,

    // Sega
    Sg1000,
    MasterSystem,
    Genesis,
    SegaCd,
    Sega32x,
    Saturn,
    Dreamcast,
    GameGear,

    // Sony
    Ps1,
    Ps2,
    Psp,

    // Others
    PcEngine,
    Atari2600,
    Atari7800,
    Lynx,
    Jaguar,
    NeoGeoPocket,
    WonderSwan,
    ColecoVision,
}

/// All platform variants in registration order.
const ALL_PLATFORMS: &[Platform] = &[
    Platform::Nes,
    Platform::Fds,
    Platform::Snes,
    Platform::N64,
    Platform::GameCube,
    Platform::Wii,
    Platform::GameBoy,
    Platform::GameBoyColor,
    Platform::Gba,
    Platform::Ds,
    Platform::N3ds,
    Platform::VirtualBoy,
    Platform::Sg1000,
    Platform::MasterSystem,
    Platform::Genesis,
    Platform::SegaCd,
    Platform::Sega32x,
    Platform::Saturn,
    Platform::Dreamcast,
    Platform::GameGear,
    Platform::Ps1,
    Platform::Ps2,
    Platform::Psp,
    Platform::PcEngine,
    Platform::Atari2600,
    Platform::Atari7800,
    Platform::Lynx,
    Platform::Jaguar,
    Platform::NeoGeoPocket,
    Platform::WonderSwan,
    Platform::ColecoVision,
];

/// Shortest alias matched inside a longer folder name (`fc` must not hit `sfc`).
const MIN_EMBEDDED_ALIAS: usize = 4;

/// Container and disc-image extensions that are candidate files on every
/// platform but say nothing about which platform they belong to.
const CONTAINER_EXTENSIONS: &[&str] = &[
    "zip", "7z", "rar", "chd", "iso", "cue", "bin", "rvz", "gcz", "wbfs", "cso", "pbp",
];

impl Platform {
    /// Canonical short name used for CLI, folder paths, and cache layout.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Nes => "nes",
            Self::Fds => "fds",
            Self::Snes => "snes",
            Self::N64 => "n64",
            Self::GameCube => "gamecube",
            Self::Wii => "wii",
            Self::GameBoy => "gameboy",
            Self::GameBoyColor => "gameboy-color",
            Self::Gba => "gba",
            Self::Ds => "nds",
            Self::N3ds => "3ds",
            Self::VirtualBoy => "virtualboy",
            Self::Sg1000 => "sg1000",
            Self::MasterSystem => "mastersystem",
            Self::Genesis => "genesis",
            Self::SegaCd => "segacd",
            Self::Sega32x => "32x",
            Self::Saturn => "saturn",
            Self::Dreamcast => "dreamcast",
            Self::GameGear => "gamegear",
            Self::Ps1 => "ps1",
            Self::Ps2 => "ps2",
            Self::Psp => "psp",
            Self::PcEngine => "pcengine",
            Self::Atari2600 => "atari2600",
            Self::Atari7800 => "atari7800",
            Self::Lynx => "lynx",
            Self::Jaguar => "jaguar",
            Self::NeoGeoPocket => "ngp",
            Self::WonderSwan => "wonderswan",
            Self::ColecoVision => "colecovision",
        }
    }

    /// Full display name for the platform.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Nes => "Nintendo Entertainment System",
            Self::Fds => "Famicom Disk System",
            Self::Snes => "Super Nintendo Entertainment System",
            Self::N64 => "Nintendo 64",
            Self::GameCube => "Nintendo GameCube",
            Self::Wii => "Nintendo Wii",
            Self::GameBoy => "Game Boy",
            Self::GameBoyColor => "Game Boy Color",
            Self::Gba => "Game Boy Advance",
            Self::Ds => "Nintendo DS",
            Self::N3ds => "Nintendo 3DS",
            Self::VirtualBoy => "Virtual Boy",
            Self::Sg1000 => "Sega SG-1000",
            Self::MasterSystem => "Sega Master System",
            Self::Genesis => "Sega Genesis / Mega Drive",
            Self::SegaCd => "Sega CD / Mega CD",
            Self::Sega32x => "Sega 32X",
            Self::Saturn => "Sega Saturn",
            Self::Dreamcast => "Sega Dreamcast",
            Self::GameGear => "Sega Game Gear",
            Self::Ps1 => "Sony PlayStation",
            Self::Ps2 => "Sony PlayStation 2",
            Self::Psp => "Sony PlayStation Portable",
            Self::PcEngine => "PC Engine / TurboGrafx-16",
            Self::Atari2600 => "Atari 2600",
            Self::Atari7800 => "Atari 7800",
            Self::Lynx => "Atari Lynx",
            Self::Jaguar => "Atari Jaguar",
            Self::NeoGeoPocket => "Neo Geo Pocket",
            Self::WonderSwan => "WonderSwan",
            Self::ColecoVision => "ColecoVision",
        }
    }

    /// All accepted folder names for this platform (case-insensitive,
    /// hyphens and underscores read as spaces).
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Nes => &["nes", "famicom", "fc"],
            Self::Fds => &["fds", "famicom disk system"],
            Self::Snes => &[
                "snes",
                "sfc",
                "super famicom",
                "superfamicom",
                "super nintendo",
                "super nes",
                "supernes",
            ],
            Self::N64 => &["n64", "nintendo 64", "nintendo64"],
            Self::GameCube => &["gamecube", "gcn", "gc", "ngc"],
            Self::Wii => &["wii"],
            Self::GameBoy => &["gameboy", "gb", "game boy"],
            Self::GameBoyColor => &["gameboy color", "gbc", "game boy color", "gbcolor"],
            Self::Gba => &["gba", "game boy advance", "gameboy advance", "gbadvance"],
            Self::Ds => &["nds", "ds", "nintendo ds"],
            Self::N3ds => &["3ds", "nintendo 3ds", "n3ds"],
            Self::VirtualBoy => &["virtualboy", "virtual boy", "vb"],
            Self::Sg1000 => &["sg1000", "sg 1000", "sc3000"],
            Self::MasterSystem => &["mastersystem", "sms", "master system", "mark iii"],
            Self::Genesis => &["genesis", "megadrive", "mega drive", "md", "gen"],
            Self::SegaCd => &["segacd", "sega cd", "megacd", "mega cd"],
            Self::Sega32x => &["32x", "sega32x", "sega 32x"],
            Self::Saturn => &["saturn", "sega saturn"],
            Self::Dreamcast => &["dreamcast", "dc"],
            Self::GameGear => &["gamegear", "game gear", "gg"],
            Self::Ps1 => &["ps1", "psx", "playstation", "playstation1"],
            Self::Ps2 => &["ps2", "playstation2", "playstation 2"],
            Self::Psp => &["psp", "playstation portable"],
            Self::PcEngine => &["pcengine", "pc engine", "pce", "tg16", "turbografx 16"],
            Self::Atari2600 => &["atari2600", "atari 2600", "a2600", "2600"],
            Self::Atari7800 => &["atari7800", "atari 7800", "a7800", "7800"],
            Self::Lynx => &["lynx", "atari lynx"],
            Self::Jaguar => &["jaguar", "atari jaguar"],
            Self::NeoGeoPocket => &["ngp", "neo geo pocket", "neogeo pocket", "ngpc"],
            Self::WonderSwan => &["wonderswan", "ws", "wsc", "wonderswan color"],
            Self::ColecoVision => &["colecovision", "coleco", "col"],
        }
    }

    /// Extensions that identify this platform unambiguously.
    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Nes => &["nes"],
            Self::Fds => &["fds"],
            Self::Snes => &["sfc", "smc"],
            Self::N64 => &["n64", "z64", "v64"],
            Self::GameCube => &["gcm"],
            Self::Wii => &[],
            Self::GameBoy => &["gb"],
            Self::GameBoyColor => &["gbc"],
            Self::Gba => &["gba"],
            Self::Ds => &["nds"],
            Self::N3ds => &["3ds", "cia"],
            Self::VirtualBoy => &["vb"],
            Self::Sg1000 => &["sg"],
            Self::MasterSystem => &["sms"],
            Self::Genesis => &["md", "gen", "smd"],
            Self::SegaCd => &[],
            Self::Sega32x => &["32x"],
            Self::Saturn => &[],
            Self::Dreamcast => &["gdi", "cdi"],
            Self::GameGear => &["gg"],
            Self::Ps1 => &[],
            Self::Ps2 => &[],
            Self::Psp => &[],
            Self::PcEngine => &["pce"],
            Self::Atari2600 => &["a26"],
            Self::Atari7800 => &["a78"],
            Self::Lynx => &["lnx"],
            Self::Jaguar => &["j64", "jag"],
            Self::NeoGeoPocket => &["ngp", "ngc"],
            Self::WonderSwan => &["ws", "wsc"],
            Self::ColecoVision => &["col"],
        }
    }

    /// Manufacturer name, used to group the `platforms` listing.
    pub fn manufacturer(&self) -> &'static str {
        match self {
            Self::Nes
            | Self::Fds
            | Self::Snes
            | Self::N64
            | Self::GameCube
            | Self::Wii
            | Self::GameBoy
            | Self::GameBoyColor
            | Self::Gba
            | Self::Ds
            | Self::N3ds
            | Self::VirtualBoy => "Nintendo",
            Self::Sg1000
            | Self::MasterSystem
            | Self::Genesis
            | Self::SegaCd
            | Self::Sega32x
            | Self::Saturn
            | Self::Dreamcast
            | Self::GameGear => "Sega",
            Self::Ps1 | Self::Ps2 | Self::Psp => "Sony",
            Self::PcEngine => "NEC",
            Self::Atari2600 | Self::Atari7800 | Self::Lynx | Self::Jaguar => "Atari",
            Self::NeoGeoPocket => "SNK",
            Self::WonderSwan => "Bandai",
            Self::ColecoVision => "Coleco",
        }
    }

    pub fn all() -> &'static [Platform] {
        ALL_PLATFORMS
    }
}

/// Error returned when a string doesn't match any known platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: '{0}'")]
pub struct PlatformParseError(pub String);

impl std::str::FromStr for Platform {
    type Err = PlatformParseError;

    /// Parse a platform from its short name or any alias (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize_folder_name(s);
        ALL_PLATFORMS
            .iter()
            .copied()
            .find(|p| {
                normalize_folder_name(p.short_name()) == wanted
                    || p.aliases().iter().any(|a| normalize_folder_name(a) == wanted)
            })
            .ok_or_else(|| PlatformParseError(s.trim().to_string()))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// User extensions to the built-in table, read from TOML.
///
/// ```toml
/// [aliases]
/// "my snes dumps" = "snes"
///
/// [extensions]
/// "sc" = "snes"
/// ```
#[derive(Debug, Default, Deserialize)]
struct PlatformTableFile {
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    extensions: HashMap<String, String>,
}

/// Read-only folder-alias and extension lookup used by both scanners.
#[derive(Debug, Clone)]
pub struct PlatformTable {
    /// Normalized folder name → platform short name
    aliases: HashMap<String, String>,
    /// Lowercase extension (no dot) → platform short name
    extensions: HashMap<String, String>,
    /// Every extension accepted as a candidate file
    candidate_extensions: BTreeSet<String>,
    /// Every platform short name the table can produce
    platforms: BTreeSet<String>,
}

impl PlatformTable {
    /// Table built from the [`Platform`] catalog.
    pub fn builtin() -> Self {
        let mut table = Self {
            aliases: HashMap::new(),
            extensions: HashMap::new(),
            candidate_extensions: CONTAINER_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            platforms: BTreeSet::new(),
        };
        for &platform in Platform::all() {
            let short = platform.short_name();
            table.insert_alias(short, short);
            table.insert_alias(platform.display_name(), short);
            for alias in platform.aliases() {
                table.insert_alias(alias, short);
            }
            for ext in platform.file_extensions() {
                table.insert_extension(ext, short);
            }
        }
        table
    }

    /// Built-in table extended with the entries of a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, PlatformTableError> {
        let file: PlatformTableFile = toml::from_str(contents)?;
        let mut table = Self::builtin();
        for (alias, platform) in &file.aliases {
            table.insert_alias(alias, &platform.to_lowercase());
        }
        for (ext, platform) in &file.extensions {
            table.insert_extension(ext, &platform.to_lowercase());
        }
        Ok(table)
    }

    /// Built-in table extended with a TOML file on disk.
    pub fn load(path: &Path) -> Result<Self, PlatformTableError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    fn insert_alias(&mut self, alias: &str, platform: &str) {
        self.aliases.insert(normalize_folder_name(alias), platform.to_string());
        self.platforms.insert(platform.to_string());
    }

    fn insert_extension(&mut self, ext: &str, platform: &str) {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.candidate_extensions.insert(ext.clone());
        self.extensions.insert(ext, platform.to_string());
        self.platforms.insert(platform.to_string());
    }

    /// Resolve a directory name to a platform.
    ///
    /// Also accepts DAT-style names such as
    /// `"Nintendo - Super Nintendo Entertainment System"`, and names that
    /// merely contain an alias (`"Nintendo - Super Famicom [T-En]"`). In the
    /// last case the longest embedded alias wins, and aliases shorter than
    /// four characters are not looked for.
    pub fn platform_for_folder(&self, folder_name: &str) -> Option<&str> {
        if let Some(p) = self.aliases.get(&normalize_folder_name(folder_name)) {
            return Some(p);
        }
        if let Some((_, rest)) = folder_name.split_once(" - ")
            && let Some(p) = self.aliases.get(&normalize_folder_name(rest))
        {
            return Some(p);
        }
        let compact = compact_name(folder_name);
        self.aliases
            .iter()
            .map(|(alias, platform)| (compact_name(alias), platform))
            .filter(|(alias, _)| alias.len() >= MIN_EMBEDDED_ALIAS && compact.contains(alias.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, p)| p.as_str())
    }

    /// Resolve a file name to a platform by its extension.
    pub fn platform_for_extension(&self, file_name: &str) -> Option<&str> {
        let ext = extension_of(file_name)?;
        self.extensions.get(&ext).map(String::as_str)
    }

    /// Whether a file name carries an extension the scanners should collect.
    pub fn is_candidate_file(&self, file_name: &str) -> bool {
        extension_of(file_name).is_some_and(|ext| self.candidate_extensions.contains(&ext))
    }

    /// Every extension accepted as a candidate file (lowercase, no dot).
    pub fn candidate_extensions(&self) -> impl Iterator<Item = &str> {
        self.candidate_extensions.iter().map(String::as_str)
    }

    /// Whether a short name is produced by this table.
    pub fn is_known_platform(&self, short_name: &str) -> bool {
        self.platforms.contains(short_name)
    }

    /// Sorted `(alias, platform)` pairs, for listing.
    pub fn alias_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .aliases
            .iter()
            .map(|(a, p)| (a.as_str(), p.as_str()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase, read `-`/`_` as spaces, collapse whitespace.
pub fn normalize_folder_name(name: &str) -> String {
    name.to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase ASCII letters and digits only: `"Super Famicom [T-En]"` → `"superfamicomten"`.
fn compact_name(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Lowercase extension of a file name, without the dot.
fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

#[cfg(test)]
#[path = "tests/platform_tests.rs"]
mod tests;
