//! On-disk acquisition cache.
//!
//! Layout is `<root>/<platform>/<file_name>`. A complete file at that path is
//! the cache hit; `index.json` only remembers sizes, checksums and the
//! verified flag. In-flight downloads live next to their target as
//! `<file_name>.part` and are renamed into place when complete.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use retro_refine_core::util::sanitize_filename;

use crate::error::CacheError;
use crate::util::{timestamp_now, timestamp_of};

/// Index format version. Bumping it discards older indexes on open.
const INDEX_VERSION: u32 = 1;
const INDEX_FILE: &str = "index.json";
pub const PART_SUFFIX: &str = ".part";

/// One cached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub platform: String,
    pub file_name: String,
    pub size: u64,
    /// Whether a checksum was computed for the file
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc32: Option<String>,
    pub fetched: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheIndex {
    #[serde(default)]
    version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

fn key(platform: &str, file_name: &str) -> String {
    format!("{platform}/{file_name}")
}

pub struct AcquisitionCache {
    root: PathBuf,
    index: Mutex<CacheIndex>,
}

impl AcquisitionCache {
    /// Open (creating if needed) the cache at `root`.
    ///
    /// An unreadable or outdated index is discarded; the files themselves
    /// are still hits.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let index_path = root.join(INDEX_FILE);
        let index = match fs::read_to_string(&index_path) {
            Ok(contents) => match serde_json::from_str::<CacheIndex>(&contents) {
                Ok(index) if index.version == INDEX_VERSION => index,
                Ok(_) => {
                    log::info!("Discarding outdated cache index {}", index_path.display());
                    CacheIndex::default()
                }
                Err(e) => {
                    log::warn!("Ignoring corrupt cache index {}: {}", index_path.display(), e);
                    CacheIndex::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheIndex::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn path_for(&self, platform: &str, file_name: &str) -> PathBuf {
        self.root
            .join(sanitize_filename(platform))
            .join(sanitize_filename(file_name))
    }

    pub fn part_path_for(&self, platform: &str, file_name: &str) -> PathBuf {
        let mut path = self.path_for(platform, file_name).into_os_string();
        path.push(PART_SUFFIX);
        PathBuf::from(path)
    }

    /// Path of the cached copy, if there is a usable one.
    ///
    /// When `remote_size` is known and disagrees with the cached file, the
    /// file is deleted and this is a miss.
    pub fn lookup(
        &self,
        platform: &str,
        file_name: &str,
        remote_size: Option<u64>,
    ) -> Result<Option<PathBuf>, CacheError> {
        let path = self.path_for(platform, file_name);
        let meta = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            _ => {
                if self.lock().entries.remove(&key(platform, file_name)).is_some() {
                    self.save()?;
                }
                return Ok(None);
            }
        };

        if let Some(expected) = remote_size
            && expected != meta.len()
        {
            log::info!(
                "Cached {} is {} bytes, remote reports {}; fetching again",
                path.display(),
                meta.len(),
                expected
            );
            fs::remove_file(&path)?;
            self.lock().entries.remove(&key(platform, file_name));
            self.save()?;
            return Ok(None);
        }
        Ok(Some(path))
    }

    /// Remember a completed download.
    pub fn record(
        &self,
        platform: &str,
        file_name: &str,
        size: u64,
        crc32: Option<String>,
    ) -> Result<(), CacheError> {
        self.lock().entries.insert(
            key(platform, file_name),
            CacheEntry {
                platform: platform.to_string(),
                file_name: file_name.to_string(),
                size,
                verified: crc32.is_some(),
                crc32,
                fetched: timestamp_now(),
            },
        );
        self.save()
    }

    pub fn entry(&self, platform: &str, file_name: &str) -> Option<CacheEntry> {
        self.lock().entries.get(&key(platform, file_name)).cloned()
    }

    /// Delete leftover `.part` files from interrupted runs.
    pub fn sweep_partials(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for dir in self.platform_dirs()? {
            for entry in fs::read_dir(&dir)?.flatten() {
                let path = entry.path();
                let is_part = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(PART_SUFFIX));
                if is_part && path.is_file() {
                    log::debug!("Removing partial download {}", path.display());
                    fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    /// Every complete file in the cache, sorted by platform then name.
    ///
    /// The directory tree is authoritative; index data fills in checksums
    /// and fetch times when it still matches the file.
    pub fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let index = self.lock();
        let mut entries = Vec::new();
        for dir in self.platform_dirs()? {
            let Some(platform) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            for entry in fs::read_dir(&dir)?.flatten() {
                let path = entry.path();
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if file_name.ends_with(PART_SUFFIX) {
                    continue;
                }
                let Ok(meta) = entry.metadata() else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let known = index
                    .entries
                    .get(&key(platform, file_name))
                    .filter(|e| e.size == meta.len());
                entries.push(match known {
                    Some(e) => e.clone(),
                    None => CacheEntry {
                        platform: platform.to_string(),
                        file_name: file_name.to_string(),
                        size: meta.len(),
                        verified: false,
                        crc32: None,
                        fetched: meta.modified().map(timestamp_of).unwrap_or_default(),
                    },
                });
            }
        }
        entries.sort_by(|a, b| {
            a.platform
                .cmp(&b.platform)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });
        Ok(entries)
    }

    pub fn total_size(&self) -> Result<u64, CacheError> {
        Ok(self.list()?.iter().map(|e| e.size).sum())
    }

    /// Remove every cached file and the index. Returns the bytes freed.
    pub fn clear(&self) -> Result<u64, CacheError> {
        let mut freed = 0u64;
        for dir in self.platform_dirs()? {
            for entry in fs::read_dir(&dir)?.flatten() {
                if let Ok(meta) = entry.metadata()
                    && meta.is_file()
                {
                    freed += meta.len();
                }
            }
            fs::remove_dir_all(&dir)?;
        }
        let index_path = self.root.join(INDEX_FILE);
        if index_path.exists() {
            fs::remove_file(&index_path)?;
        }
        self.lock().entries.clear();
        Ok(freed)
    }

    fn platform_dirs(&self) -> Result<Vec<PathBuf>, CacheError> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        Ok(dirs)
    }

    /// Held lock serializes concurrent writers on the temp file.
    fn save(&self) -> Result<(), CacheError> {
        let mut index = self.lock();
        index.version = INDEX_VERSION;
        let contents = serde_json::to_string_pretty(&*index)?;
        let path = self.root.join(INDEX_FILE);
        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
