//! Local directory scanner.
//!
//! Subdirectories of a source root are platform folders, classified through
//! the [`PlatformTable`] alias lookup. Files directly in the root (and every
//! file in flat mode) are classified by extension instead. Entries are
//! visited in sorted order so first-seen order is stable between runs.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use retro_refine_core::{CandidateRef, Location, PlatformTable};

use crate::progress::ScanEvent;

/// Options shared by the local and network scanners.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Classify every file by extension instead of by platform folder
    pub flat: bool,
    /// How many directory levels below a platform folder (or below the root
    /// in flat mode) are descended
    pub max_depth: usize,
    /// Only these platforms; empty means all
    pub platforms: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            flat: false,
            max_depth: crate::config::DEFAULT_RECURSIVE_DEPTH,
            platforms: Vec::new(),
        }
    }
}

impl ScanOptions {
    pub fn wants(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.iter().any(|p| p == platform)
    }
}

struct Frame {
    dir: PathBuf,
    is_root: bool,
    depth: usize,
    platform: Option<String>,
}

/// Lazy walk over one source root, yielding candidate files.
///
/// ```ignore
/// let scan = LocalScan::new("roms", "/mnt/roms", table, ScanOptions::default());
/// for candidate in scan {
///     println!("{} {}", candidate.platform, candidate.file_name);
/// }
/// ```
pub struct LocalScan {
    source_id: String,
    table: Arc<PlatformTable>,
    options: ScanOptions,
    stack: Vec<Frame>,
    ready: VecDeque<CandidateRef>,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
}

impl LocalScan {
    pub fn new(
        source_id: impl Into<String>,
        root: impl Into<PathBuf>,
        table: Arc<PlatformTable>,
        options: ScanOptions,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            table,
            options,
            stack: vec![Frame {
                dir: root.into(),
                is_root: true,
                depth: 0,
                platform: None,
            }],
            ready: VecDeque::new(),
            events: None,
        }
    }

    /// Report directory progress on `tx`.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Platform for a subdirectory of `parent`, or `None` to skip it.
    fn subdir_platform(&self, parent: &Frame, name: &str) -> Option<Option<String>> {
        if self.options.flat {
            return Some(None);
        }
        if !parent.is_root {
            return Some(parent.platform.clone());
        }
        let platform = match self.table.platform_for_folder(name) {
            Some(p) => p.to_string(),
            None => {
                log::debug!("Folder '{}' is not a known platform alias", name);
                name.to_lowercase()
            }
        };
        if !self.options.wants(&platform) {
            log::debug!("Skipping platform folder '{}' ({})", name, platform);
            return None;
        }
        Some(Some(platform))
    }

    fn expand(&mut self, frame: Frame) {
        let entries = match read_sorted(&frame.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Skipping unreadable directory {}: {}", frame.dir.display(), e);
                self.emit(ScanEvent::failed(frame.dir.display().to_string(), e.to_string()));
                return;
            }
        };

        let mut subdirs = Vec::new();
        let mut files = 0;
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                log::debug!("Skipping non-UTF-8 name {}", path.display());
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            if path.is_dir() {
                if name.starts_with('_') {
                    continue;
                }
                let depth = if frame.is_root && !self.options.flat {
                    0
                } else {
                    frame.depth + 1
                };
                if depth > self.options.max_depth {
                    continue;
                }
                if let Some(platform) = self.subdir_platform(&frame, &name) {
                    subdirs.push(Frame {
                        dir: path,
                        is_root: false,
                        depth,
                        platform,
                    });
                }
            } else if path.is_file() && self.table.is_candidate_file(&name) {
                let platform = frame.platform.clone().or_else(|| {
                    self.table
                        .platform_for_extension(&name)
                        .map(str::to_string)
                });
                let Some(platform) = platform else {
                    log::debug!("No platform for {}, skipping", path.display());
                    self.emit(ScanEvent::Unclassified {
                        location: path.display().to_string(),
                    });
                    continue;
                };
                if !self.options.wants(&platform) {
                    continue;
                }
                files += 1;
                let size_hint = std::fs::metadata(&path).ok().map(|m| m.len());
                self.ready.push_back(CandidateRef {
                    source_id: self.source_id.clone(),
                    platform,
                    file_name: name,
                    location: Location::Local(path),
                    size_hint,
                    size_exact: true,
                });
            }
        }

        self.emit(ScanEvent::DirectoryListed {
            location: frame.dir.display().to_string(),
            files,
            subdirs: subdirs.len(),
        });

        // Reverse so the stack pops them in sorted order
        self.stack.extend(subdirs.into_iter().rev());
    }
}

impl Iterator for LocalScan {
    type Item = CandidateRef;

    fn next(&mut self) -> Option<CandidateRef> {
        loop {
            if let Some(candidate) = self.ready.pop_front() {
                return Some(candidate);
            }
            let frame = self.stack.pop()?;
            self.expand(frame);
        }
    }
}

fn read_sorted(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| e.path())
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
#[path = "tests/scanner_tests.rs"]
mod tests;
