//! User configuration: a TOML file merged with command-line overrides.
//!
//! The file lives at `~/.config/retro-refine/config.toml` unless a path is
//! given explicitly. [`RefineConfig::resolve`] validates everything up front
//! and loads the lookup tables, so a bad setting stops the run before any
//! scanning starts.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use retro_refine_catalog::{NameFilter, SelectConfig, SharedTitleMappings};
use retro_refine_core::{DEFAULT_REGION_PRIORITY, OriginKind, PlatformTable, Region};

use crate::error::ConfigError;
use crate::transfer::TransferMode;

pub const DEFAULT_RECURSIVE_DEPTH: usize = 3;
pub const DEFAULT_CRAWL_WORKERS: usize = 4;
/// Upper bound on connections per file.
pub const MAX_CONNECTIONS: usize = 16;

/// Canonical path to the config file: `~/.config/retro-refine/config.toml`.
pub fn config_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("retro-refine").join("config.toml")
}

/// Default acquisition cache: `~/.cache/retro-refine`.
pub fn default_cache_dir() -> PathBuf {
    let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    cache.join("retro-refine")
}

/// Settings as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefineConfig {
    /// Official sources: directories or listing URLs, optionally `id=location`
    pub sources: Vec<String>,
    /// Fan-translation sources, same syntax as `sources`
    pub translation_sources: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Only these platforms (short names); empty means all
    pub platforms: Vec<String>,
    pub region_priority: Vec<String>,
    pub keep_regions: Vec<String>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<u16>,
    pub exclude_protos: bool,
    pub allow_beta: bool,
    pub allow_unlicensed: bool,
    pub prefer_translations: bool,
    /// Source ids, best first
    pub prefer_sources: Vec<String>,
    pub flat: bool,
    pub recursive_depth: usize,
    pub crawl_workers: usize,
    /// Files downloaded in parallel; auto-tuned when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    /// Connections per file; auto-tuned when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<usize>,
    pub transfer_mode: TransferMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_mappings: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_table: Option<PathBuf>,
    pub commit: bool,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            translation_sources: Vec::new(),
            dest: None,
            cache_dir: None,
            platforms: Vec::new(),
            region_priority: DEFAULT_REGION_PRIORITY
                .iter()
                .map(|r| r.name().to_string())
                .collect(),
            keep_regions: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
            year_from: None,
            year_to: None,
            exclude_protos: false,
            allow_beta: false,
            allow_unlicensed: false,
            prefer_translations: false,
            prefer_sources: Vec::new(),
            flat: false,
            recursive_depth: DEFAULT_RECURSIVE_DEPTH,
            crawl_workers: DEFAULT_CRAWL_WORKERS,
            parallel: None,
            connections: None,
            transfer_mode: TransferMode::Copy,
            title_mappings: None,
            platform_table: None,
            commit: false,
        }
    }
}

/// Command-line values that replace file values when present.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Appended to the file's sources
    pub sources: Vec<String>,
    /// Appended to the file's translation sources
    pub translation_sources: Vec<String>,
    pub dest: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub platforms: Option<Vec<String>>,
    pub region_priority: Option<Vec<String>>,
    pub keep_regions: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub year_from: Option<u16>,
    pub year_to: Option<u16>,
    pub exclude_protos: Option<bool>,
    pub allow_beta: Option<bool>,
    pub allow_unlicensed: Option<bool>,
    pub prefer_translations: Option<bool>,
    pub prefer_sources: Option<Vec<String>>,
    pub flat: Option<bool>,
    pub recursive_depth: Option<usize>,
    pub crawl_workers: Option<usize>,
    pub parallel: Option<usize>,
    pub connections: Option<usize>,
    pub transfer_mode: Option<TransferMode>,
    pub title_mappings: Option<PathBuf>,
    pub platform_table: Option<PathBuf>,
    pub commit: Option<bool>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *slot = v;
    }
}

fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

impl RefineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load a config file. A missing file yields the defaults unless
    /// `required` is set (an explicit `--config` path).
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && !required => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = self.to_toml_string()?;
        write_atomic(path, &serialized)?;
        Ok(())
    }

    pub fn apply(&mut self, o: ConfigOverrides) {
        self.sources.extend(o.sources);
        self.translation_sources.extend(o.translation_sources);
        set_opt(&mut self.dest, o.dest);
        set_opt(&mut self.cache_dir, o.cache_dir);
        set(&mut self.platforms, o.platforms);
        set(&mut self.region_priority, o.region_priority);
        set(&mut self.keep_regions, o.keep_regions);
        set(&mut self.include, o.include);
        set(&mut self.exclude, o.exclude);
        set_opt(&mut self.year_from, o.year_from);
        set_opt(&mut self.year_to, o.year_to);
        set(&mut self.exclude_protos, o.exclude_protos);
        set(&mut self.allow_beta, o.allow_beta);
        set(&mut self.allow_unlicensed, o.allow_unlicensed);
        set(&mut self.prefer_translations, o.prefer_translations);
        set(&mut self.prefer_sources, o.prefer_sources);
        set(&mut self.flat, o.flat);
        set(&mut self.recursive_depth, o.recursive_depth);
        set(&mut self.crawl_workers, o.crawl_workers);
        set_opt(&mut self.parallel, o.parallel);
        set_opt(&mut self.connections, o.connections);
        set(&mut self.transfer_mode, o.transfer_mode);
        set_opt(&mut self.title_mappings, o.title_mappings);
        set_opt(&mut self.platform_table, o.platform_table);
        set(&mut self.commit, o.commit);
    }

    /// Every configured source, official sources first.
    pub fn source_specs(&self) -> Result<Vec<SourceSpec>, ConfigError> {
        let official = self
            .sources
            .iter()
            .map(|s| SourceSpec::parse(s, OriginKind::Official));
        let translations = self
            .translation_sources
            .iter()
            .map(|s| SourceSpec::parse(s, OriginKind::FanTranslation));
        official.chain(translations).collect()
    }

    /// Selection settings, with region names and patterns checked.
    pub fn select_config(&self) -> Result<SelectConfig, ConfigError> {
        let regions = |names: &[String]| -> Result<Vec<Region>, ConfigError> {
            names
                .iter()
                .map(|n| n.parse::<Region>().map_err(ConfigError::from))
                .collect()
        };
        Ok(SelectConfig {
            region_priority: regions(&self.region_priority)?,
            keep_regions: regions(&self.keep_regions)?,
            prefer_translations: self.prefer_translations,
            source_preference: self.prefer_sources.clone(),
            allow_beta: self.allow_beta,
            allow_unlicensed: self.allow_unlicensed,
            exclude_protos: self.exclude_protos,
            year_from: self.year_from,
            year_to: self.year_to,
            filter: NameFilter::new(self.include.as_slice(), self.exclude.as_slice())?,
        })
    }

    /// Validate the settings and load the lookup tables they name.
    pub fn resolve(self) -> Result<ResolvedConfig, ConfigError> {
        let sources = self.source_specs()?;
        if sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for (i, a) in sources.iter().enumerate() {
            if sources[..i].iter().any(|b| b.id == a.id) {
                return Err(ConfigError::invalid(format!(
                    "source id '{}' is used twice",
                    a.id
                )));
            }
        }
        if self.commit && self.dest.is_none() {
            return Err(ConfigError::MissingDest);
        }
        if let (Some(from), Some(to)) = (self.year_from, self.year_to)
            && from > to
        {
            return Err(ConfigError::invalid(format!(
                "year_from ({from}) is after year_to ({to})"
            )));
        }
        if self.crawl_workers == 0 {
            return Err(ConfigError::invalid("crawl_workers must be at least 1"));
        }
        if self.parallel == Some(0) {
            return Err(ConfigError::invalid("parallel must be at least 1"));
        }
        if let Some(c) = self.connections
            && !(1..=MAX_CONNECTIONS).contains(&c)
        {
            return Err(ConfigError::invalid(format!(
                "connections must be between 1 and {MAX_CONNECTIONS}"
            )));
        }

        let select = self.select_config()?;

        let platform_table = match &self.platform_table {
            Some(path) => PlatformTable::load(path)?,
            None => PlatformTable::builtin(),
        };
        let platforms: Vec<String> = self.platforms.iter().map(|p| p.to_lowercase()).collect();
        if let Some(unknown) = platforms
            .iter()
            .find(|p| !platform_table.is_known_platform(p))
        {
            return Err(ConfigError::UnknownPlatform(unknown.clone()));
        }

        for id in &self.prefer_sources {
            if !sources.iter().any(|s| &s.id == id) {
                log::warn!("prefer_sources names '{}', which is not a configured source", id);
            }
        }

        let title_mappings = SharedTitleMappings::open(self.title_mappings.clone())?;
        let cache_dir = self.cache_dir.clone().unwrap_or_else(default_cache_dir);

        Ok(ResolvedConfig {
            sources,
            select,
            platforms,
            platform_table: Arc::new(platform_table),
            title_mappings: Arc::new(title_mappings),
            cache_dir,
            raw: self,
        })
    }
}

/// Write a commented starter config if none exists. Returns whether a file
/// was written.
pub fn write_default_config(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    write_atomic(path, DEFAULT_CONFIG_TOML)?;
    Ok(true)
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

const DEFAULT_CONFIG_TOML: &str = r#"# retro-refine configuration
#
# Sources are local directories or HTTP(S) directory listings. Prefix a source
# with `name=` to give it an id for `prefer_sources`.
sources = []
translation_sources = []

# dest = "/path/to/library"
# cache_dir = "/path/to/cache"

# Only these platforms (short names, see `retro-refine platforms`)
platforms = []

region_priority = ["USA", "World", "Europe", "Australia", "United Kingdom", "Spain", "France", "Germany", "Italy", "Netherlands", "Sweden", "Asia", "Japan", "Korea", "China", "Taiwan", "Brazil"]
# One winner per listed region instead of a single winner
keep_regions = []

# Glob patterns matched against file names
include = []
exclude = []

# year_from = 1985
# year_to = 1999

exclude_protos = false
allow_beta = false
allow_unlicensed = false
prefer_translations = false
prefer_sources = []

flat = false
recursive_depth = 3
crawl_workers = 4
# parallel = 4
# connections = 2

# copy, move, symlink or hardlink
transfer_mode = "copy"

# title_mappings = "/path/to/title-mappings.json"
# platform_table = "/path/to/platforms.toml"

commit = false
"#;

/// Where a source's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    /// A directory listing; the path always ends in `/`
    Remote(Url),
}

/// One configured source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub id: String,
    pub location: SourceLocation,
    pub origin: OriginKind,
}

impl SourceSpec {
    /// Parse `location` or `id=location`.
    pub fn parse(spec: &str, origin: OriginKind) -> Result<Self, ConfigError> {
        let spec = spec.trim();
        let (id, location) = match spec.split_once('=') {
            Some((id, rest))
                if !id.is_empty()
                    && id
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                (id.to_string(), rest.trim())
            }
            _ => (spec.to_string(), spec),
        };
        if location.is_empty() {
            return Err(ConfigError::invalid_source(spec));
        }

        let location = if location.contains("://") {
            let mut url =
                Url::parse(location).map_err(|e| ConfigError::invalid_source(format!("{spec}: {e}")))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::invalid_source(format!(
                    "{spec}: only http and https listings are supported"
                )));
            }
            if !url.path().ends_with('/') {
                let path = format!("{}/", url.path());
                url.set_path(&path);
            }
            SourceLocation::Remote(url)
        } else {
            SourceLocation::Local(PathBuf::from(location))
        };

        Ok(Self {
            id,
            location,
            origin,
        })
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.location, SourceLocation::Remote(_))
    }
}

/// A validated configuration with its lookup tables loaded.
#[derive(Debug)]
pub struct ResolvedConfig {
    pub sources: Vec<SourceSpec>,
    pub select: SelectConfig,
    /// Lowercased platform filter; empty means all
    pub platforms: Vec<String>,
    pub platform_table: Arc<PlatformTable>,
    pub title_mappings: Arc<SharedTitleMappings>,
    pub cache_dir: PathBuf,
    /// The merged settings this was resolved from
    pub raw: RefineConfig,
}

impl ResolvedConfig {
    pub fn wants_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == platform)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
