//! Places acquired or local files into the destination tree.
//!
//! Layout is `<dest>/<platform>/<file>`, or `<dest>/<file>` in flat mode.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use retro_refine_core::util::sanitize_filename;

/// How a file reaches the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
    Symlink,
    Hardlink,
}

impl TransferMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Move => "move",
            Self::Symlink => "symlink",
            Self::Hardlink => "hardlink",
        }
    }

    pub fn all() -> &'static [TransferMode] {
        &[Self::Copy, Self::Move, Self::Symlink, Self::Hardlink]
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown transfer mode '{s}' (expected copy, move, symlink or hardlink)")
            })
    }
}

/// What [`transfer`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Placed(PathBuf),
    /// A file of the same size was already at the destination
    AlreadyPresent(PathBuf),
}

impl TransferOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Placed(p) | Self::AlreadyPresent(p) => p,
        }
    }
}

/// Destination path for a file.
pub fn destination_path(dest: &Path, platform: &str, file_name: &str, flat: bool) -> PathBuf {
    let name = sanitize_filename(file_name);
    if flat {
        dest.join(name)
    } else {
        dest.join(sanitize_filename(platform)).join(name)
    }
}

/// Place `source` at its destination path using `mode`.
///
/// An existing destination with the same size is left alone. Copies are
/// written to a temporary name first, so an interrupted copy never leaves a
/// truncated file under the final name.
pub fn transfer(
    source: &Path,
    dest: &Path,
    platform: &str,
    file_name: &str,
    mode: TransferMode,
    flat: bool,
) -> io::Result<TransferOutcome> {
    let target = destination_path(dest, platform, file_name, flat);
    let source_len = fs::metadata(source)?.len();

    if let Ok(existing) = fs::metadata(&target) {
        if existing.len() == source_len {
            log::debug!("Already present: {}", target.display());
            return Ok(TransferOutcome::AlreadyPresent(target));
        }
        fs::remove_file(&target)?;
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    match mode {
        TransferMode::Copy => copy_atomic(source, &target)?,
        TransferMode::Move => {
            if fs::rename(source, &target).is_err() {
                // Rename fails across filesystems
                copy_atomic(source, &target)?;
                fs::remove_file(source)?;
            }
        }
        TransferMode::Symlink => {
            let absolute = fs::canonicalize(source)?;
            symlink_file(&absolute, &target)?;
        }
        TransferMode::Hardlink => fs::hard_link(source, &target)?,
    }

    log::debug!("{} {} -> {}", mode, source.display(), target.display());
    Ok(TransferOutcome::Placed(target))
}

fn copy_atomic(source: &Path, target: &Path) -> io::Result<()> {
    let tmp = tmp_path(target);
    if let Err(e) = fs::copy(source, &tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, target)
}

fn tmp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    target.with_file_name(name)
}

#[cfg(unix)]
fn symlink_file(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn symlink_file(original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(original, link)
}

#[cfg(test)]
#[path = "tests/transfer_tests.rs"]
mod tests;
