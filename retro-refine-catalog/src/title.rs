//! Title canonicalization.
//!
//! Two names of the same game must produce the same key. The pipeline is:
//!
//! 1. lowercase
//! 2. move a trailing article (`"Legend of Zelda, The"`) out of the way
//! 3. delete apostrophes, map `&` to `and`, read other punctuation as spaces
//! 4. drop leading articles (`the`, `a`, `an`)
//! 5. rewrite roman numerals (1..=39, except a bare `x`) as digits
//! 6. collapse whitespace
//! 7. substitute through the [`TitleMappings`] synonym table
//!
//! Every step is idempotent and the table is normalized with the same
//! pipeline at load time, so canonicalizing a canonical key returns it
//! unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::error::TitleMapError;

const ARTICLES: &[&str] = &["the", "a", "an"];

/// Normalize a title without consulting the synonym table.
pub fn normalize_title(title: &str) -> String {
    let lower = title.to_lowercase();
    let reordered = strip_trailing_article(&lower);

    let mut spaced = String::with_capacity(reordered.len());
    for ch in reordered.chars() {
        match ch {
            '\'' | '\u{2019}' | '`' => {}
            '&' => spaced.push_str(" and "),
            c if c.is_alphanumeric() || c.is_whitespace() => spaced.push(c),
            _ => spaced.push(' '),
        }
    }

    let mut words: Vec<&str> = spaced.split_whitespace().collect();
    while words.len() > 1 && ARTICLES.contains(&words[0]) {
        words.remove(0);
    }

    words
        .into_iter()
        .map(|word| match roman_to_arabic(word) {
            Some(n) => n.to_string(),
            None => word.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `"legend of zelda, the"` → `"legend of zelda"`, also when a subtitle
/// follows (`"legend of zelda, the - a link to the past"`).
fn strip_trailing_article(lower: &str) -> String {
    for article in ARTICLES {
        let marker = format!(", {article}");
        let mut search_from = 0;
        while let Some(pos) = lower[search_from..].find(&marker) {
            let start = search_from + pos;
            let end = start + marker.len();
            let rest = &lower[end..];
            let at_boundary = rest
                .chars()
                .next()
                .is_none_or(|c| !c.is_alphanumeric());
            if at_boundary {
                return format!("{}{}", &lower[..start], rest);
            }
            search_from = end;
        }
    }
    lower.to_string()
}

/// Parse a lowercase roman numeral in 1..=39. A lone `x` is not a numeral.
fn roman_to_arabic(word: &str) -> Option<u32> {
    if word.is_empty() || word == "x" {
        return None;
    }
    let bytes = word.as_bytes();
    let tens = bytes.iter().take_while(|&&b| b == b'x').count();
    if tens > 3 {
        return None;
    }
    let ones = match &word[tens..] {
        "" => 0,
        "i" => 1,
        "ii" => 2,
        "iii" => 3,
        "iv" => 4,
        "v" => 5,
        "vi" => 6,
        "vii" => 7,
        "viii" => 8,
        "ix" => 9,
        _ => return None,
    };
    Some(tens as u32 * 10 + ones)
}

/// Curated `{normalized title → canonical title}` synonym table.
///
/// Loaded from a JSON object of franchise categories; keys starting with `_`
/// are metadata:
///
/// ```json
/// {
///   "_comment": "maintained by hand",
///   "mega_man": { "Rockman 2": "Mega Man 2" }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TitleMappings {
    map: HashMap<String, String>,
}

impl TitleMappings {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from raw pairs: normalize both sides and resolve
    /// substitution chains to their terminal value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, TitleMapError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut raw = HashMap::new();
        for (from, to) in pairs {
            let from = normalize_title(from.as_ref());
            let to = normalize_title(to.as_ref());
            if from.is_empty() || to.is_empty() || from == to {
                continue;
            }
            raw.insert(from, to);
        }

        let mut map = HashMap::with_capacity(raw.len());
        for key in raw.keys() {
            let mut seen = HashSet::new();
            seen.insert(key.as_str());
            let mut current = &raw[key];
            while let Some(next) = raw.get(current) {
                if !seen.insert(current.as_str()) {
                    return Err(TitleMapError::cycle(key.clone()));
                }
                current = next;
            }
            map.insert(key.clone(), current.clone());
        }
        Ok(Self { map })
    }

    /// Parse the categorized JSON document.
    pub fn from_json_str(contents: &str) -> Result<Self, TitleMapError> {
        let doc: BTreeMap<String, Value> = serde_json::from_str(contents)?;
        let mut pairs = Vec::new();
        for (category, entries) in &doc {
            if category.starts_with('_') {
                continue;
            }
            let Value::Object(entries) = entries else {
                log::debug!("Skipping title mapping category '{}': not an object", category);
                continue;
            };
            for (from, to) in entries {
                if from.starts_with('_') {
                    continue;
                }
                match to.as_str() {
                    Some(to) => pairs.push((from.clone(), to.to_string())),
                    None => log::debug!("Skipping non-string title mapping for '{}'", from),
                }
            }
        }
        Self::from_pairs(pairs)
    }

    /// Load a table from disk. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self, TitleMapError> {
        if !path.exists() {
            log::debug!("No title mappings at {}", path.display());
            return Ok(Self::empty());
        }
        let contents = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&contents)?;
        log::debug!(
            "Loaded {} title mappings from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Terminal canonical title for an already-normalized title.
    pub fn get(&self, normalized: &str) -> Option<&str> {
        self.map.get(normalized).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Full canonicalization against one table snapshot.
pub fn canonicalize(title: &str, mappings: &TitleMappings) -> String {
    let normalized = normalize_title(title);
    match mappings.get(&normalized) {
        Some(canonical) => canonical.to_string(),
        None => normalized,
    }
}

/// Hot-reloadable handle to the current synonym table.
///
/// Runs take a [`snapshot`](Self::snapshot) at start so every title in a run
/// sees the same table even if a reload happens mid-run.
#[derive(Debug)]
pub struct SharedTitleMappings {
    path: Option<PathBuf>,
    current: RwLock<Arc<TitleMappings>>,
}

impl SharedTitleMappings {
    /// Load the table at `path` (or start empty when `None`).
    pub fn open(path: Option<PathBuf>) -> Result<Self, TitleMapError> {
        let table = match &path {
            Some(p) => TitleMappings::load(p)?,
            None => TitleMappings::empty(),
        };
        Ok(Self {
            path,
            current: RwLock::new(Arc::new(table)),
        })
    }

    pub fn from_table(table: TitleMappings) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(table)),
        }
    }

    pub fn snapshot(&self) -> Arc<TitleMappings> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the backing file and swap the table in. On error the previous
    /// table stays current. Returns the new entry count.
    pub fn reload(&self) -> Result<usize, TitleMapError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot().len());
        };
        let table = TitleMappings::load(path)?;
        let len = table.len();
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(table);
        log::info!("Reloaded {} title mappings", len);
        Ok(len)
    }
}

/// Memoizing canonicalizer bound to one table snapshot.
#[derive(Debug)]
pub struct Canonicalizer {
    mappings: Arc<TitleMappings>,
    memo: HashMap<String, String>,
}

impl Canonicalizer {
    pub fn new(mappings: Arc<TitleMappings>) -> Self {
        Self {
            mappings,
            memo: HashMap::new(),
        }
    }

    pub fn canonicalize(&mut self, title: &str) -> String {
        if let Some(hit) = self.memo.get(title) {
            return hit.clone();
        }
        let canonical = canonicalize(title, &self.mappings);
        self.memo.insert(title.to_string(), canonical.clone());
        canonical
    }

    pub fn mappings(&self) -> &TitleMappings {
        &self.mappings
    }
}

#[cfg(test)]
#[path = "tests/title_tests.rs"]
mod tests;
