use std::path::{Path, PathBuf};

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use retro_refine_lib::{ConfigError, RefineConfig, config_path, write_default_config};

use crate::error::CliError;

fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map(Path::to_path_buf).unwrap_or_else(config_path)
}

/// Load the config file. An explicit `--config` path must exist; the default
/// location may be missing.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<RefineConfig, ConfigError> {
    RefineConfig::load(&resolve_path(explicit), explicit.is_some())
}

/// Show the config file path, its status and the effective settings.
pub(crate) fn run_config_show(explicit: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_path(explicit);
    let config = load_config(explicit)?;

    log::info!(
        "{}",
        "retro-refine configuration".if_supports_color(Stdout, |t| t.bold()),
    );
    log::info!("");
    if path.exists() {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(exists)".if_supports_color(Stdout, |t| t.green()),
        );
    } else {
        log::info!(
            "  Config file: {} {}",
            path.display().if_supports_color(Stdout, |t| t.cyan()),
            "(not found, showing defaults)".if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    log::info!("");

    for line in config.to_toml_string()?.lines() {
        log::info!("  {}", line);
    }
    Ok(())
}

/// Print the config file path.
pub(crate) fn run_config_path(explicit: Option<&Path>) {
    log::info!("{}", resolve_path(explicit).display());
}

/// Write a starter config unless one already exists.
pub(crate) fn run_config_init(explicit: Option<&Path>) -> Result<(), CliError> {
    let path = resolve_path(explicit);
    if write_default_config(&path)? {
        log::info!(
            "{} Wrote {}",
            "\u{2714}".if_supports_color(Stdout, |t| t.green()),
            path.display(),
        );
    } else {
        log::info!(
            "{} {} already exists; left unchanged",
            "\u{2022}".if_supports_color(Stdout, |t| t.dimmed()),
            path.display(),
        );
    }
    Ok(())
}
