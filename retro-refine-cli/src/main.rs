//! retro-refine CLI
//!
//! Command-line interface for curating game archive collections.

mod cli_types;
mod commands;
mod error;
mod logger;
mod spinner;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli_types::{CacheAction, Cli, Commands, ConfigAction};
use error::CliError;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init(cli.quiet, cli.verbose, cli.logfile.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        std::process::exit(1);
    }

    let code = match run(cli) {
        Ok(()) => 0,
        Err(CliError::Interrupted) => {
            log::warn!("Interrupted");
            130
        }
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Refine(args) => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| CliError::runtime(format!("Failed to create tokio runtime: {}", e)))?;
            rt.block_on(async {
                let cancel = CancellationToken::new();
                tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
                commands::refine::run_refine(args, config, cli.quiet, cancel).await
            })
        }
        Commands::Cache { action } => match action {
            CacheAction::List => commands::cache::run_cache_list(config),
            CacheAction::Clear => commands::cache::run_cache_clear(config),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(config),
            ConfigAction::Path => {
                commands::config::run_config_path(config);
                Ok(())
            }
            ConfigAction::Init => commands::config::run_config_init(config),
        },
        Commands::Platforms { aliases } => commands::platforms::run_platforms(config, aliases),
    }
}

/// First Ctrl-C cancels the run so it can wind down and write its manifest;
/// a second one exits immediately.
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    log::warn!("Stopping... (press Ctrl-C again to exit now)");
    cancel.cancel();
    if tokio::signal::ctrl_c().await.is_ok() {
        std::process::exit(130);
    }
}
