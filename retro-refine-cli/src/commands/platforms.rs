use std::path::Path;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use retro_refine_core::{Platform, PlatformTable};

use super::config::load_config;
use crate::error::CliError;

pub(crate) fn run_platforms(config: Option<&Path>, show_aliases: bool) -> Result<(), CliError> {
    let settings = load_config(config)?;
    let table = match &settings.platform_table {
        Some(path) => PlatformTable::load(path).map_err(retro_refine_lib::ConfigError::from)?,
        None => PlatformTable::builtin(),
    };

    log::info!("Known platforms:");
    log::info!("");

    let mut current_manufacturer = "";
    for platform in Platform::all() {
        if platform.manufacturer() != current_manufacturer {
            if !current_manufacturer.is_empty() {
                log::info!("");
            }
            current_manufacturer = platform.manufacturer();
            log::info!(
                "{}:",
                current_manufacturer.if_supports_color(Stdout, |t| t.bold()),
            );
        }
        log::info!(
            "  {} [{}]",
            platform.short_name().if_supports_color(Stdout, |t| t.bold()),
            platform.display_name().if_supports_color(Stdout, |t| t.cyan()),
        );
        log::info!("    Extensions: {}", platform.file_extensions().join(", "));
    }

    let extra: Vec<&str> = {
        let mut names: Vec<&str> = table
            .alias_pairs()
            .into_iter()
            .map(|(_, p)| p)
            .filter(|p| Platform::all().iter().all(|b| b.short_name() != *p))
            .collect();
        names.sort();
        names.dedup();
        names
    };
    if !extra.is_empty() {
        log::info!("");
        log::info!(
            "{}: {}",
            "From platform table".if_supports_color(Stdout, |t| t.bold()),
            extra.join(", "),
        );
    }

    if show_aliases {
        log::info!("");
        log::info!("Folder aliases:");
        for (alias, platform) in table.alias_pairs() {
            log::info!(
                "  {} {} {}",
                alias,
                "->".if_supports_color(Stdout, |t| t.dimmed()),
                platform.if_supports_color(Stdout, |t| t.bold()),
            );
        }
    }
    Ok(())
}
