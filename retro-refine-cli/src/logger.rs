//! Terminal logger.
//!
//! Every user-facing line goes through the `log` macros, so the level filter
//! doubles as the output switch: `--quiet` keeps warnings and errors,
//! `--verbose` adds debug messages with timestamps. `--logfile` mirrors the
//! same lines into a file with color codes stripped.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use log::{Level, LevelFilter};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

/// Writes to stdout and, with ANSI escapes removed, to a log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        if let Some(file) = &mut self.file {
            file.write_all(&strip_ansi_escapes::strip(buf))?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}

pub(crate) fn level_for(quiet: bool, verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    }
}

/// Install the global logger. Fails only if the log file cannot be created.
pub(crate) fn init(quiet: bool, verbose: bool, logfile: Option<&Path>) -> io::Result<()> {
    let file = logfile.map(File::create).transpose()?;
    let level = level_for(quiet, verbose);

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Warn)
        .filter_module("retro_refine", level)
        .filter_module("retro_refine_core", level)
        .filter_module("retro_refine_catalog", level)
        .filter_module("retro_refine_lib", level)
        .filter_module("retro_refine_fetch", level)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(Tee { file })));

    if verbose {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        });
    } else {
        builder.format(|buf, record| match record.level() {
            Level::Error => writeln!(
                buf,
                "{} {}",
                "error:".if_supports_color(Stdout, |t| t.red()),
                record.args()
            ),
            _ => writeln!(buf, "{}", record.args()),
        });
    }

    builder
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_flags() {
        assert_eq!(level_for(false, false), LevelFilter::Info);
        assert_eq!(level_for(true, false), LevelFilter::Warn);
        assert_eq!(level_for(false, true), LevelFilter::Debug);
        // --verbose wins over --quiet
        assert_eq!(level_for(true, true), LevelFilter::Debug);
    }

    #[test]
    fn test_tee_strips_colors_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        let mut tee = Tee {
            file: Some(File::create(&path).unwrap()),
        };
        tee.write_all(b"\x1b[32mok\x1b[0m done\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ok done\n");
    }
}
