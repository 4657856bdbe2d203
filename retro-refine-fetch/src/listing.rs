//! Extract file and subdirectory links from HTML directory listings.
//!
//! Listings come in many shapes (Apache and nginx autoindex, table-based
//! mirrors, FTP-style `<pre>` dumps, script-driven pages), so several
//! independent [`Strategy`] passes run over the same page and their results
//! are merged by absolute URL.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use retro_refine_core::PlatformTable;

macro_rules! regex {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("invalid regex: ", $re)));
    };
}

macro_rules! selector {
    ($name:ident, $sel:expr) => {
        static $name: LazyLock<Selector> =
            LazyLock::new(|| Selector::parse($sel).expect(concat!("invalid selector: ", $sel)));
    };
}

regex!(SIZE_RE, r"(?i)^([\d.]+)\s*(?:([KMGT])I?)?B?$");
// -rw-r--r-- 1 user group 1536000 Jan  1 12:00 file.zip
regex!(
    LS_LINE_RE,
    r"^[-dlrwxsStT]{10}\s+\d+\s+\S+\s+\S+\s+(\d+)\s+\w+\s+\d+\s+[\d:]+\s+(.+)$"
);
// file.zip   1536000
regex!(NAME_SIZE_RE, r"^(\S.*?)\s{2,}([\d.]+\s?[A-Za-z]*)$");
// ...  01-Jan-2020 00:00   175.9 MiB
regex!(TRAILING_SIZE_RE, r"(?i)(?:^|\s)([\d.]+\s?(?:[KMGT]I?B?|B)?)$");

selector!(ROW_SEL, "tr");
selector!(CELL_SEL, "td");
selector!(ANCHOR_SEL, "a[href]");
selector!(PRE_SEL, "pre, code, listing");
selector!(
    DATA_SEL,
    "[data-url], [data-href], [data-src], [data-file], [data-link], [src]"
);

const DATA_ATTRS: [&str; 5] = ["data-url", "data-href", "data-src", "data-file", "data-link"];

/// A file link found in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub url: Url,
    /// Decoded last path segment
    pub name: String,
    pub size: Option<u64>,
    /// `size` came from a plain byte count rather than a rounded figure
    pub size_exact: bool,
}

/// Files a listing page links to, and the subdirectories below it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub files: Vec<RemoteFile>,
    /// Subdirectory URLs, each ending in `/`
    pub subdirs: Vec<Url>,
}

/// A raw link before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawLink {
    href: String,
    size: Option<SizeHint>,
}

/// A parsed size and whether it is an exact byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeHint {
    pub bytes: u64,
    pub exact: bool,
}

/// One independent way of finding links in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `<tr>` rows with an anchor and an optional size cell
    TableRows,
    /// Every `<a href>`
    Anchors,
    /// `<pre>`, `<code>` and `<listing>` blocks
    Preformatted,
    /// `data-*` link attributes and `src` pointing at a candidate file
    DataAttributes,
}

impl Strategy {
    /// Evaluation order. Earlier strategies win ties on size.
    pub const ORDERED: [Strategy; 4] = [
        Self::TableRows,
        Self::Anchors,
        Self::Preformatted,
        Self::DataAttributes,
    ];

    fn extract(&self, doc: &Html, table: &PlatformTable) -> Vec<RawLink> {
        match self {
            Self::TableRows => table_rows(doc),
            Self::Anchors => doc
                .select(&ANCHOR_SEL)
                .filter_map(|a| a.value().attr("href"))
                .map(|href| RawLink {
                    href: href.to_string(),
                    size: None,
                })
                .collect(),
            Self::Preformatted => doc.select(&PRE_SEL).flat_map(preformatted).collect(),
            Self::DataAttributes => data_attributes(doc, table),
        }
    }
}

/// Parse a listing page fetched from `base` (the post-redirect URL).
pub fn parse_listing(html: &str, base: &Url, table: &PlatformTable) -> Listing {
    let doc = Html::parse_document(html);
    let base_dir = directory_of(base);

    let mut listing = Listing::default();
    let mut file_index: HashMap<Url, usize> = HashMap::new();

    for strategy in Strategy::ORDERED {
        for link in strategy.extract(&doc, table) {
            let Some(url) = resolve_link(&link.href, &base_dir) else {
                continue;
            };
            if url.path().ends_with('/') {
                if !listing.subdirs.contains(&url) {
                    listing.subdirs.push(url);
                }
                continue;
            }
            let Some(name) = file_name_of(&url) else {
                continue;
            };
            if !table.is_candidate_file(&name) {
                continue;
            }
            let size = link.size.filter(|s| s.bytes > 0);
            match file_index.get(&url) {
                Some(&i) => {
                    let file = &mut listing.files[i];
                    if file.size.is_none()
                        && let Some(hint) = size
                    {
                        file.size = Some(hint.bytes);
                        file.size_exact = hint.exact;
                    }
                }
                None => {
                    file_index.insert(url.clone(), listing.files.len());
                    listing.files.push(RemoteFile {
                        url,
                        name,
                        size: size.map(|s| s.bytes),
                        size_exact: size.is_some_and(|s| s.exact),
                    });
                }
            }
        }
    }
    listing
}

/// Resolve `href` against the listing directory.
///
/// Other hosts, fragments, query-only links and non-HTTP schemes are dropped.
/// File links are kept wherever they land on the same host; directory links
/// (trailing `/`) must sit strictly below `base_dir`, so a crawl never climbs.
pub fn resolve_link(href: &str, base_dir: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with('?') {
        return None;
    }
    let mut url = base_dir.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if url.host_str() != base_dir.host_str() || url.port_or_known_default() != base_dir.port_or_known_default() {
        return None;
    }
    url.set_fragment(None);
    if url.query().is_some() && url.path() == base_dir.path() {
        return None;
    }
    url.set_query(None);
    if url.path().ends_with('/')
        && (!url.path().starts_with(base_dir.path()) || url.path() == base_dir.path())
    {
        return None;
    }
    Some(url)
}

/// The directory a page lives in: itself when it ends in `/`, else its parent.
pub fn directory_of(url: &Url) -> Url {
    let mut dir = url.clone();
    dir.set_query(None);
    dir.set_fragment(None);
    if !dir.path().ends_with('/') {
        if let Some(cut) = dir.path().rfind('/') {
            let parent = dir.path()[..=cut].to_string();
            dir.set_path(&parent);
        }
    }
    dir
}

/// Decoded last path segment of a file URL.
pub fn file_name_of(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}

/// Decoded last segment of a directory URL (`.../Super%20Nintendo/`).
pub fn dir_name_of(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment).ok()?;
    Some(decoded.into_owned())
}

/// Parse a human size string: `1536000`, `1.5M`, `100 KB`, `175.9 MiB`.
pub fn parse_size(text: &str) -> Option<u64> {
    size_hint(text).map(|s| s.bytes)
}

/// [`parse_size`], also reporting whether the figure is a plain byte count.
pub fn size_hint(text: &str) -> Option<SizeHint> {
    let text = text.trim();
    if let Ok(bytes) = text.parse::<u64>() {
        return Some(SizeHint { bytes, exact: true });
    }
    let caps = SIZE_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default();
    let multiplier: u64 = match unit.as_str() {
        "" => 1,
        "K" => 1 << 10,
        "M" => 1 << 20,
        "G" => 1 << 30,
        "T" => 1 << 40,
        _ => return None,
    };
    Some(SizeHint {
        bytes: (value * multiplier as f64) as u64,
        exact: multiplier == 1 && value.fract() == 0.0,
    })
}

fn table_rows(doc: &Html) -> Vec<RawLink> {
    let mut links = Vec::new();
    for row in doc.select(&ROW_SEL) {
        let Some(anchor) = row.select(&ANCHOR_SEL).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        links.push(RawLink {
            href: href.to_string(),
            size: row_size(row),
        });
    }
    links
}

/// Size from a row: a cell classed `size`, else the first other cell that
/// reads as a size.
fn row_size(row: ElementRef<'_>) -> Option<SizeHint> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SEL).collect();
    let text = |cell: &ElementRef<'_>| cell.text().collect::<String>();
    if let Some(cell) = cells
        .iter()
        .find(|c| c.value().classes().any(|class| class.eq_ignore_ascii_case("size")))
    {
        return size_hint(&text(cell));
    }
    cells
        .iter()
        .filter(|c| c.select(&ANCHOR_SEL).next().is_none())
        .find_map(|c| size_hint(&text(c)))
}

/// Links from one preformatted block. Blocks with anchors (autoindex) take
/// the size from the text after each anchor; plain-text blocks are read line
/// by line.
fn preformatted(block: ElementRef<'_>) -> Vec<RawLink> {
    let has_anchors = block.select(&ANCHOR_SEL).next().is_some();
    if has_anchors {
        let mut links = Vec::new();
        let mut pending: Option<String> = None;
        for node in block.children() {
            match node.value() {
                Node::Element(el) if el.name() == "a" => {
                    if let Some(href) = pending.take() {
                        links.push(RawLink { href, size: None });
                    }
                    pending = el.attr("href").map(str::to_string);
                }
                Node::Text(text) => {
                    if let Some(href) = pending.take() {
                        let size = text
                            .lines()
                            .find(|l| !l.trim().is_empty())
                            .and_then(trailing_size);
                        links.push(RawLink { href, size });
                    }
                }
                _ => {}
            }
        }
        if let Some(href) = pending {
            links.push(RawLink { href, size: None });
        }
        return links;
    }

    let text: String = block.text().collect();
    text.lines().filter_map(plain_text_line).collect()
}

fn plain_text_line(line: &str) -> Option<RawLink> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if let Some(caps) = LS_LINE_RE.captures(line) {
        return Some(RawLink {
            href: encode_name(caps[2].trim()),
            size: caps[1].parse().ok().map(|bytes| SizeHint { bytes, exact: true }),
        });
    }
    if let Some(caps) = NAME_SIZE_RE.captures(line)
        && let Some(size) = size_hint(&caps[2])
    {
        return Some(RawLink {
            href: encode_name(caps[1].trim()),
            size: Some(size),
        });
    }
    // A bare name; anything that is not a candidate file is dropped later
    if line.contains('.') {
        return Some(RawLink {
            href: encode_name(line),
            size: None,
        });
    }
    None
}

/// Size figure at the end of an autoindex line.
fn trailing_size(line: &str) -> Option<SizeHint> {
    let caps = TRAILING_SIZE_RE.captures(line.trim())?;
    size_hint(&caps[1])
}

/// Plain-text names are not URL-encoded. Escape what would change their
/// meaning in a URL; everything else the URL parser encodes itself.
fn encode_name(name: &str) -> String {
    name.replace('%', "%25")
        .replace('#', "%23")
        .replace('?', "%3F")
        .replace(' ', "%20")
}

fn data_attributes(doc: &Html, table: &PlatformTable) -> Vec<RawLink> {
    let mut links = Vec::new();
    for el in doc.select(&DATA_SEL) {
        let value = el.value();
        for attr in DATA_ATTRS {
            if let Some(href) = value.attr(attr) {
                links.push(RawLink {
                    href: href.to_string(),
                    size: None,
                });
            }
        }
        if let Some(src) = value.attr("src") {
            let path = src.split(['?', '#']).next().unwrap_or(src);
            if table.is_candidate_file(path) {
                links.push(RawLink {
                    href: src.to_string(),
                    size: None,
                });
            }
        }
    }
    links
}

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod tests;
