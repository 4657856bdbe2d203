//! Parser for archive release names.
//!
//! Release names follow the No-Intro style convention, extended by fan
//! translation groups with bracketed credits:
//! ```text
//! Game Name (Region1, Region2) (Rev X) (En,Fr,De) (1993) [T-En by Group].zip
//! ```
//!
//! [`parse_name`] splits the tag groups off the title and classifies each
//! parenthesized group; [`parse_candidate`] combines that with the flag rules
//! and the canonicalizer into a [`ReleaseCandidate`].

use retro_refine_core::{CandidateRef, OriginKind, ParseError, Region, ReleaseCandidate};

use crate::flags::detect_flags;
use crate::title::Canonicalizer;

/// Extensions stripped from a name before parsing (compared lowercase).
const KNOWN_EXTENSIONS: &[&str] = &[
    "zip", "7z", "rar", "chd", "iso", "cue", "bin", "rvz", "gcz", "wbfs", "cso", "pbp", "nes",
    "fds", "sfc", "smc", "n64", "z64", "v64", "gb", "gbc", "gba", "nds", "3ds", "cia", "vb",
    "sg", "sms", "md", "gen", "smd", "32x", "gg", "gdi", "cdi", "gcm", "pce", "a26", "a52",
    "a78", "lnx", "j64", "jag", "ngp", "ngc", "ws", "wsc", "col", "int", "st", "rom", "mx1",
    "mx2",
];

/// Two-letter language codes that appear in language tag groups.
const KNOWN_LANGUAGES: &[&str] = &[
    "En", "Fr", "De", "Es", "It", "Ja", "Nl", "Sv", "No", "Da", "Fi", "Pt", "Zh", "Ko", "Ru",
    "Pl", "El", "Ca", "Cs", "Hu", "Tr", "Ar", "He",
];

const YEAR_RANGE: std::ops::RangeInclusive<u16> = 1970..=2030;

/// Extra information a scanner knows about a name.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseContext {
    pub origin: OriginKind,
    /// First-seen scan order
    pub seq: usize,
}

/// Components of a release name, before flags and canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    /// Title text with every tag group removed and whitespace collapsed.
    pub title: String,
    /// Region tags in the order they appear.
    pub regions: Vec<Region>,
    /// Language codes in the order they appear.
    pub languages: Vec<String>,
    /// Ordinal of the highest revision marker; 0 when there is none.
    pub revision: u32,
    /// Label of the marker that produced `revision`.
    pub revision_label: Option<String>,
    pub year: Option<u16>,
    /// Tag groups no vocabulary claimed, bracketed ones with their brackets.
    pub other_tags: Vec<String>,
}

/// Remove one known extension from a file name, if present.
pub fn strip_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && KNOWN_EXTENSIONS
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            stem
        }
        _ => file_name,
    }
}

/// Parse a release name into its components.
///
/// # Examples
///
/// ```
/// use retro_refine_catalog::name_parser::parse_name;
/// use retro_refine_core::Region;
///
/// let parsed = parse_name("Zelda no Densetsu (Japan) (Rev A) (En,Fr).sfc").unwrap();
/// assert_eq!(parsed.title, "Zelda no Densetsu");
/// assert_eq!(parsed.regions, vec![Region::Japan]);
/// assert_eq!(parsed.revision, 1);
/// assert_eq!(parsed.languages, vec!["En", "Fr"]);
/// ```
pub fn parse_name(file_name: &str) -> Result<ParsedName, ParseError> {
    if file_name.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    if file_name.chars().any(char::is_control) {
        return Err(ParseError::control_characters(file_name));
    }

    let name = strip_extension(file_name.trim());
    let (title, tags) = extract_title_and_tags(name)?;
    if title.is_empty() {
        return Err(ParseError::no_title(file_name));
    }

    let mut result = ParsedName {
        title,
        ..Default::default()
    };
    for tag in &tags {
        match tag {
            Tag::Paren(content) => classify_paren_tag(content, &mut result),
            Tag::Bracket(content) => result.other_tags.push(format!("[{}]", content.trim())),
        }
    }
    Ok(result)
}

/// Build a [`ReleaseCandidate`] from a scanned file.
pub fn parse_candidate(
    candidate: &CandidateRef,
    ctx: ParseContext,
    canonicalizer: &mut Canonicalizer,
) -> Result<ReleaseCandidate, ParseError> {
    let parsed = parse_name(&candidate.file_name)?;
    let flags = detect_flags(&candidate.file_name, ctx.origin);
    let canonical_title = canonicalizer.canonicalize(&parsed.title);

    Ok(ReleaseCandidate {
        source_id: candidate.source_id.clone(),
        raw_name: candidate.file_name.clone(),
        platform: candidate.platform.clone(),
        title: parsed.title,
        canonical_title,
        regions: parsed.regions,
        languages: parsed.languages,
        revision: parsed.revision,
        revision_label: parsed.revision_label,
        flags,
        year: parsed.year,
        size: candidate.size_hint,
        size_exact: candidate.size_exact,
        checksum: None,
        origin: ctx.origin,
        location: candidate.location.clone(),
        seq: ctx.seq,
    })
}

// ── Internal parsing ────────────────────────────────────────────────────────

#[derive(Debug)]
enum Tag {
    Paren(String),
    Bracket(String),
}

/// Split a name into the title text outside any group and the sequence of
/// (parenthesized) and [bracketed] tags.
fn extract_title_and_tags(name: &str) -> Result<(String, Vec<Tag>), ParseError> {
    let mut tags = Vec::new();
    let mut title = String::new();
    let mut chars = name.char_indices();

    while let Some((i, ch)) = chars.next() {
        let (open, close, make_tag): (char, char, fn(String) -> Tag) = match ch {
            '(' => ('(', ')', Tag::Paren),
            '[' => ('[', ']', Tag::Bracket),
            ')' | ']' => return Err(ParseError::unbalanced(name)),
            _ => {
                title.push(ch);
                continue;
            }
        };

        let mut depth = 1u32;
        let start = i + open.len_utf8();
        let mut end = None;

        for (j, c) in chars.by_ref() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    end = Some(j);
                    break;
                }
            }
        }

        let end = end.ok_or_else(|| ParseError::unbalanced(name))?;
        let content = &name[start..end];
        if !content.trim().is_empty() {
            tags.push(make_tag(content.to_string()));
        }
        title.push(' ');
    }

    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok((title, tags))
}

/// Classify a parenthesized tag and update the result accordingly.
fn classify_paren_tag(content: &str, result: &mut ParsedName) {
    let trimmed = content.trim();

    // Region tag: "USA", "Japan", "USA, Europe", "Hong Kong"
    if let Some(regions) = parse_region_tag(trimmed) {
        for region in regions {
            if !result.regions.contains(&region) {
                result.regions.push(region);
            }
        }
        return;
    }

    // Language list: "En", "En,Fr,De", "En+Ja"
    if let Some(languages) = parse_language_tag(trimmed) {
        for lang in languages {
            if !result.languages.contains(&lang) {
                result.languages.push(lang);
            }
        }
        return;
    }

    if let Some(ordinal) = parse_revision_tag(trimmed) {
        if ordinal > result.revision {
            result.revision = ordinal;
            result.revision_label = Some(trimmed.to_string());
        }
        return;
    }

    if trimmed.len() == 4 {
        if let Ok(year) = trimmed.parse::<u16>() {
            if YEAR_RANGE.contains(&year) {
                result.year = Some(year);
                return;
            }
        }
    }

    result.other_tags.push(trimmed.to_string());
}

/// Every comma-separated part must be a whole region name. Matching is
/// exact per part, so a fragment such as `Kong` never claims `Hong Kong`.
fn parse_region_tag(s: &str) -> Option<Vec<Region>> {
    s.split(',').map(|part| part.trim().parse().ok()).collect()
}

fn parse_language_tag(s: &str) -> Option<Vec<String>> {
    s.split([',', '+'])
        .map(|part| {
            let part = part.trim();
            KNOWN_LANGUAGES
                .iter()
                .find(|lang| lang.eq_ignore_ascii_case(part))
                .map(|lang| lang.to_string())
        })
        .collect()
}

/// `Rev A` / `Rev 2` / `Rev 1.1` and `v1.2` style markers.
///
/// Letters map A=1, B=2, …; versions map to `major * 100 + minor`.
fn parse_revision_tag(s: &str) -> Option<u32> {
    if let Some(rev) = s.strip_prefix("Rev").or_else(|| s.strip_prefix("rev")) {
        let rev = rev.trim();
        if rev.len() == 1 && rev.as_bytes()[0].is_ascii_alphabetic() {
            return Some(u32::from(rev.as_bytes()[0].to_ascii_uppercase() - b'A') + 1);
        }
        return parse_dotted_number(rev, rev.contains('.'));
    }

    let version = s.strip_prefix('v').or_else(|| s.strip_prefix('V'))?;
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    parse_dotted_number(version, true)
}

/// `"2"` → 2 when `scaled` is false; `"1.2"` → 102, `"1"` → 100 when it is.
fn parse_dotted_number(s: &str, scaled: bool) -> Option<u32> {
    let (major, minor) = match s.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (s, None),
    };
    let major: u32 = major.parse().ok()?;
    let minor: u32 = match minor {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    if scaled {
        Some(major * 100 + minor)
    } else {
        Some(major)
    }
}
