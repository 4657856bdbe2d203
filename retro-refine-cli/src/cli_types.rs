//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use retro_refine_lib::{ConfigOverrides, TransferMode};

#[derive(Parser)]
#[command(name = "retro-refine")]
#[command(
    about = "Curate game archive collections down to one best release per game",
    long_about = None
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.config/retro-refine/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Scan sources, pick one release per game, then fetch and place the winners
    Refine(RefineArgs),

    /// Manage the download cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// List known platforms and their folder aliases
    Platforms {
        /// Also list every folder alias
        #[arg(long)]
        aliases: bool,
    },
}

/// Arguments of `refine`. Every option overrides the config file.
#[derive(Args, Clone, Default)]
pub(crate) struct RefineArgs {
    /// Extra sources: directories or listing URLs, optionally `id=location`
    pub sources: Vec<String>,

    /// Extra fan-translation sources
    #[arg(long = "translations", value_name = "SOURCE")]
    pub translation_sources: Vec<String>,

    /// Destination library
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Download cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Only these platforms (e.g., snes,nes,gba)
    #[arg(short, long, value_delimiter = ',')]
    pub platforms: Option<Vec<String>>,

    /// Region priority, best first (e.g., USA,Europe,Japan)
    #[arg(long, value_delimiter = ',')]
    pub regions: Option<Vec<String>>,

    /// Keep one release per listed region instead of a single winner
    #[arg(long, value_delimiter = ',')]
    pub keep_regions: Option<Vec<String>>,

    /// Only file names matching these glob patterns
    #[arg(long, value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Skip file names matching these glob patterns
    #[arg(long, value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    #[arg(long)]
    pub year_from: Option<u16>,

    #[arg(long)]
    pub year_to: Option<u16>,

    /// Drop prototypes even when nothing else exists
    #[arg(long)]
    pub exclude_protos: bool,

    /// Keep betas in the running
    #[arg(long)]
    pub allow_beta: bool,

    /// Keep unlicensed releases in the running
    #[arg(long)]
    pub allow_unlicensed: bool,

    /// Prefer fan translations over official English releases
    #[arg(long)]
    pub prefer_translations: bool,

    /// Source ids, best first, used to break ties
    #[arg(long, value_delimiter = ',')]
    pub prefer_sources: Option<Vec<String>>,

    /// Classify by extension and write without platform folders
    #[arg(long)]
    pub flat: bool,

    /// Directory levels to descend below each platform folder
    #[arg(long)]
    pub depth: Option<usize>,

    /// Listing pages fetched at once
    #[arg(long)]
    pub crawl_workers: Option<usize>,

    /// Files downloaded at once (auto-tuned when omitted)
    #[arg(short = 'j', long)]
    pub parallel: Option<usize>,

    /// Connections per file (auto-tuned when omitted)
    #[arg(long)]
    pub connections: Option<usize>,

    /// How files reach the destination: copy, move, symlink or hardlink
    #[arg(long)]
    pub mode: Option<TransferMode>,

    /// JSON file of title synonyms
    #[arg(long)]
    pub title_mappings: Option<PathBuf>,

    /// TOML file extending the platform table
    #[arg(long)]
    pub platform_table: Option<PathBuf>,

    /// Actually download and place files (default is a dry run)
    #[arg(long)]
    pub commit: bool,
}

fn flag(set: bool) -> Option<bool> {
    set.then_some(true)
}

impl RefineArgs {
    pub(crate) fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            sources: self.sources.clone(),
            translation_sources: self.translation_sources.clone(),
            dest: self.dest.clone(),
            cache_dir: self.cache_dir.clone(),
            platforms: self.platforms.clone(),
            region_priority: self.regions.clone(),
            keep_regions: self.keep_regions.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            year_from: self.year_from,
            year_to: self.year_to,
            exclude_protos: flag(self.exclude_protos),
            allow_beta: flag(self.allow_beta),
            allow_unlicensed: flag(self.allow_unlicensed),
            prefer_translations: flag(self.prefer_translations),
            prefer_sources: self.prefer_sources.clone(),
            flat: flag(self.flat),
            recursive_depth: self.depth,
            crawl_workers: self.crawl_workers,
            parallel: self.parallel,
            connections: self.connections,
            transfer_mode: self.mode,
            title_mappings: self.title_mappings.clone(),
            platform_table: self.platform_table.clone(),
            commit: flag(self.commit),
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum CacheAction {
    /// List cached files
    List,

    /// Remove every cached file
    Clear,
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the merged configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a starter config file if none exists
    Init,
}
