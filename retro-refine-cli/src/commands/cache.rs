use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use retro_refine_core::util::format_bytes_approx;
use retro_refine_fetch::AcquisitionCache;
use retro_refine_lib::default_cache_dir;

use super::config::load_config;
use crate::error::CliError;

fn cache_dir(config: Option<&Path>) -> Result<PathBuf, CliError> {
    let settings = load_config(config)?;
    Ok(settings.cache_dir.unwrap_or_else(default_cache_dir))
}

/// List cached downloads, grouped by platform.
pub(crate) fn run_cache_list(config: Option<&Path>) -> Result<(), CliError> {
    let dir = cache_dir(config)?;
    if !dir.exists() {
        log::info!(
            "{}",
            "No cached files.".if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }

    let cache = AcquisitionCache::open(&dir)?;
    let entries = cache.list()?;
    if entries.is_empty() {
        log::info!(
            "{}",
            "No cached files.".if_supports_color(Stdout, |t| t.dimmed()),
        );
        log::info!("Run 'retro-refine refine --commit' to fill the cache.");
        return Ok(());
    }

    log::info!(
        "{} {}",
        "Cached files in".if_supports_color(Stdout, |t| t.bold()),
        dir.display().if_supports_color(Stdout, |t| t.cyan()),
    );

    let mut current_platform = "";
    let mut total_size = 0u64;
    for entry in &entries {
        if entry.platform != current_platform {
            current_platform = &entry.platform;
            log::info!("");
            log::info!(
                "{}:",
                current_platform.if_supports_color(Stdout, |t| t.bold()),
            );
        }
        total_size += entry.size;
        let verified = if entry.verified {
            format!(
                " {}",
                format!("crc32 {}", entry.crc32.as_deref().unwrap_or("?"))
                    .if_supports_color(Stdout, |t| t.green())
            )
        } else {
            String::new()
        };
        log::info!(
            "  {} ({}){}",
            entry.file_name,
            format_bytes_approx(entry.size),
            verified,
        );
    }
    log::info!("");
    log::info!(
        "Total: {} files, {}",
        entries.len(),
        format_bytes_approx(total_size)
    );
    Ok(())
}

/// Remove every cached download.
pub(crate) fn run_cache_clear(config: Option<&Path>) -> Result<(), CliError> {
    let dir = cache_dir(config)?;
    if !dir.exists() {
        log::info!(
            "{} Cache is already empty",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        );
        return Ok(());
    }

    match AcquisitionCache::open(&dir).and_then(|cache| cache.clear()) {
        Ok(freed) => {
            log::info!(
                "{} Cache cleared ({} freed)",
                "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                format_bytes_approx(freed),
            );
            Ok(())
        }
        Err(e) => {
            log::warn!(
                "{} Error clearing cache: {}",
                "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                e,
            );
            Err(e.into())
        }
    }
}
