use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::select::SelectionResult;

/// A single entry in a platform's selection log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Selected {
        file: String,
        canonical_title: String,
    },
    Rejected {
        file: String,
        canonical_title: String,
        reason: String,
    },
    /// Every candidate of a game was disqualified
    Skipped {
        canonical_title: String,
        candidates: usize,
    },
    ParseFailed {
        file: String,
        message: String,
    },
}

/// Collects selection decisions per platform and writes one log file each.
#[derive(Debug, Default)]
pub struct SelectionLog {
    entries: BTreeMap<String, Vec<LogEntry>>,
}

impl SelectionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, platform: &str, entry: LogEntry) {
        self.entries
            .entry(platform.to_string())
            .or_default()
            .push(entry);
    }

    /// Record every decision in a selection result.
    pub fn record(&mut self, result: &SelectionResult) {
        if result.is_skipped() {
            self.add(
                &result.platform,
                LogEntry::Skipped {
                    canonical_title: result.canonical_title.clone(),
                    candidates: result.rejected.len(),
                },
            );
        }
        for chosen in &result.chosen {
            self.add(
                &result.platform,
                LogEntry::Selected {
                    file: chosen.raw_name.clone(),
                    canonical_title: result.canonical_title.clone(),
                },
            );
        }
        for rejection in &result.rejected {
            self.add(
                &result.platform,
                LogEntry::Rejected {
                    file: rejection.candidate.raw_name.clone(),
                    canonical_title: result.canonical_title.clone(),
                    reason: rejection.reason.to_string(),
                },
            );
        }
    }

    pub fn parse_failed(&mut self, platform: &str, file: &str, message: impl Into<String>) {
        self.add(
            platform,
            LogEntry::ParseFailed {
                file: file.to_string(),
                message: message.into(),
            },
        );
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self, platform: &str) -> &[LogEntry] {
        self.entries.get(platform).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn summary(&self, platform: &str) -> LogSummary {
        let mut summary = LogSummary::default();
        for entry in self.entries(platform) {
            match entry {
                LogEntry::Selected { .. } => summary.selected += 1,
                LogEntry::Rejected { .. } => summary.rejected += 1,
                LogEntry::Skipped { .. } => summary.skipped += 1,
                LogEntry::ParseFailed { .. } => summary.parse_failed += 1,
            }
        }
        summary
    }

    /// Write one platform's log.
    pub fn write_platform(&self, platform: &str, out: &mut impl Write) -> std::io::Result<()> {
        let summary = self.summary(platform);

        writeln!(out, "=== Selection Log: {} ===", platform)?;
        writeln!(
            out,
            "Date: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(out)?;
        writeln!(out, "--- Summary ---")?;
        writeln!(out, "Selected: {}", summary.selected)?;
        writeln!(out, "Rejected: {}", summary.rejected)?;
        writeln!(out, "Skipped games: {}", summary.skipped)?;
        writeln!(out, "Unparseable names: {}", summary.parse_failed)?;
        writeln!(out)?;
        writeln!(out, "--- Details ---")?;
        writeln!(out)?;

        for entry in self.entries(platform) {
            match entry {
                LogEntry::Selected {
                    file,
                    canonical_title,
                } => writeln!(out, "[SELECTED] {} -> \"{}\"", file, canonical_title)?,
                LogEntry::Rejected {
                    file,
                    canonical_title,
                    reason,
                } => writeln!(
                    out,
                    "[REJECTED] {} -> \"{}\": {}",
                    file, canonical_title, reason
                )?,
                LogEntry::Skipped {
                    canonical_title,
                    candidates,
                } => writeln!(
                    out,
                    "[SKIPPED] \"{}\": all {} candidates disqualified",
                    canonical_title, candidates
                )?,
                LogEntry::ParseFailed { file, message } => {
                    writeln!(out, "[ERROR] {}: {}", file, message)?
                }
            }
        }

        Ok(())
    }

    /// Write `<dir>/<platform>-selection.log` for every platform seen. Each
    /// log goes to a temporary name first, so a reader never sees half of one.
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for platform in self.platforms() {
            let path = dir.join(format!("{platform}-selection.log"));
            let tmp = dir.join(format!("{platform}-selection.log.tmp"));
            let mut file = std::io::BufWriter::new(std::fs::File::create(&tmp)?);
            self.write_platform(platform, &mut file)?;
            file.flush()?;
            drop(file);
            std::fs::rename(&tmp, &path)?;
            written.push(path);
        }
        Ok(written)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub selected: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub parse_failed: usize,
}
