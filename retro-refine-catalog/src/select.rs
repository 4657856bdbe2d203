//! Winner selection within a canonical group.
//!
//! Selection runs in two passes. The disqualification pass drops candidates
//! the configuration never wants (betas, demos, compilations, ...). The
//! ranking pass orders the survivors by a lexicographic key and keeps the
//! best one, or one per kept region in multi-region mode.
//!
//! Ranking keys, compared in order (lower is better):
//!
//! | # | key | active when |
//! |---|-----|-------------|
//! | 1 | official before fan translation (inverted by `prefer_translations`) | an official English-region release survives |
//! | 2 | English (incl. translations) before untranslated foreign releases | no official English-region release survives |
//! | 3 | best index of any region in `region_priority` | always |
//! | 4 | higher revision | always |
//! | 5 | non-prototype | always |
//! | 6 | clean translation before hacked translation | always |
//! | 7 | index of the source in `source_preference` | always |
//! | 8 | first-seen order | always |

use std::cmp::Ordering;
use std::fmt;

use regex::{Regex, RegexBuilder};
use retro_refine_core::{DEFAULT_REGION_PRIORITY, OriginKind, Region, ReleaseCandidate};

use crate::group::CanonicalGroup;

/// Include/exclude glob filter over file names (`*`, `?`, `[abc]`, `[!abc]`),
/// matched case-insensitively against the whole name.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[S]| -> Result<Vec<Regex>, regex::Error> {
            patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(&glob_to_regex(p.as_ref()))
                        .case_insensitive(true)
                        .build()
                })
                .collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// `None` when the name passes, otherwise the reason it does not.
    pub fn check(&self, file_name: &str) -> Option<Disqualification> {
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(file_name)) {
            return Some(Disqualification::NotIncluded);
        }
        if self.exclude.iter().any(|re| re.is_match(file_name)) {
            return Some(Disqualification::Excluded);
        }
        None
    }
}

/// Translate a shell glob into an anchored regex.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if chars.peek() == Some(&'!') {
                    chars.next();
                    class.push('^');
                }
                for inner in chars.by_ref() {
                    if inner == ']' {
                        closed = true;
                        break;
                    }
                    if inner == '\\' || inner == '[' || inner == '^' {
                        class.push('\\');
                    }
                    class.push(inner);
                }
                if closed && !class.is_empty() && class != "^" {
                    out.push('[');
                    out.push_str(&class);
                    out.push(']');
                } else {
                    // Unterminated or empty class: match the text literally.
                    out.push_str(&regex::escape("["));
                    out.push_str(&regex::escape(class.trim_start_matches('^')));
                    if closed {
                        out.push_str(&regex::escape("]"));
                    }
                }
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');
    out
}

/// Selection settings.
#[derive(Debug, Clone)]
pub struct SelectConfig {
    /// Preferred regions, best first
    pub region_priority: Vec<Region>,
    /// Multi-region mode: one winner per listed region
    pub keep_regions: Vec<Region>,
    pub prefer_translations: bool,
    /// Source ids, best first; unlisted sources rank after listed ones
    pub source_preference: Vec<String>,
    pub allow_beta: bool,
    pub allow_unlicensed: bool,
    pub exclude_protos: bool,
    pub year_from: Option<u16>,
    pub year_to: Option<u16>,
    pub filter: NameFilter,
}

impl Default for SelectConfig {
    fn default() -> Self {
        Self {
            region_priority: DEFAULT_REGION_PRIORITY.to_vec(),
            keep_regions: Vec::new(),
            prefer_translations: false,
            source_preference: Vec::new(),
            allow_beta: false,
            allow_unlicensed: false,
            exclude_protos: false,
            year_from: None,
            year_to: None,
            filter: NameFilter::default(),
        }
    }
}

/// Why the disqualification pass removed a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disqualification {
    Bios,
    Beta,
    Demo,
    Rerelease,
    Compilation,
    Hack,
    Unlicensed,
    Prototype,
    YearOutOfRange,
    NotIncluded,
    Excluded,
}

impl fmt::Display for Disqualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bios => "bios",
            Self::Beta => "beta",
            Self::Demo => "demo",
            Self::Rerelease => "rerelease",
            Self::Compilation => "compilation",
            Self::Hack => "hack",
            Self::Unlicensed => "unlicensed",
            Self::Prototype => "prototype",
            Self::YearOutOfRange => "year out of range",
            Self::NotIncluded => "not matched by include filter",
            Self::Excluded => "matched exclude filter",
        };
        f.write_str(s)
    }
}

/// Why a candidate was not chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Disqualified(Disqualification),
    OfficialPreferred,
    FanTranslationPreferred,
    TranslationPreferred,
    LowerRegionPriority,
    /// Carries the winner's revision label
    SupersededBy(String),
    PrototypeSuperseded,
    HackedTranslationSuperseded,
    LowerSourcePreference,
    DuplicateOfEarlier,
    NotInKeptRegion,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disqualified(d) => write!(f, "disqualified: {d}"),
            Self::OfficialPreferred => f.write_str("official release preferred"),
            Self::FanTranslationPreferred => f.write_str("fan translation preferred"),
            Self::TranslationPreferred => f.write_str("translation preferred over untranslated"),
            Self::LowerRegionPriority => f.write_str("lower region priority"),
            Self::SupersededBy(label) => write!(f, "superseded by {label}"),
            Self::PrototypeSuperseded => f.write_str("prototype superseded by release"),
            Self::HackedTranslationSuperseded => f.write_str("hacked translation superseded"),
            Self::LowerSourcePreference => f.write_str("lower source preference"),
            Self::DuplicateOfEarlier => f.write_str("duplicate of earlier entry"),
            Self::NotInKeptRegion => f.write_str("not in a kept region"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub candidate: ReleaseCandidate,
    pub reason: RejectReason,
}

/// Outcome for one canonical group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionResult {
    pub platform: String,
    pub canonical_title: String,
    /// Empty when every candidate was disqualified
    pub chosen: Vec<ReleaseCandidate>,
    pub rejected: Vec<Rejection>,
}

impl SelectionResult {
    /// True when the whole group was disqualified.
    pub fn is_skipped(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// First disqualification rule a candidate trips, if any.
pub fn disqualify(candidate: &ReleaseCandidate, config: &SelectConfig) -> Option<Disqualification> {
    let flags = &candidate.flags;
    if flags.bios {
        return Some(Disqualification::Bios);
    }
    if flags.beta && !config.allow_beta {
        return Some(Disqualification::Beta);
    }
    if flags.demo {
        return Some(Disqualification::Demo);
    }
    if flags.rerelease {
        return Some(Disqualification::Rerelease);
    }
    if flags.compilation {
        return Some(Disqualification::Compilation);
    }
    if flags.hack && !flags.translation {
        return Some(Disqualification::Hack);
    }
    if flags.unlicensed && !config.allow_unlicensed {
        return Some(Disqualification::Unlicensed);
    }
    if flags.proto && config.exclude_protos {
        return Some(Disqualification::Prototype);
    }
    if let Some(year) = candidate.year {
        let too_early = config.year_from.is_some_and(|from| year < from);
        let too_late = config.year_to.is_some_and(|to| year > to);
        if too_early || too_late {
            return Some(Disqualification::YearOutOfRange);
        }
    }
    config.filter.check(&candidate.raw_name)
}

// ── Ranking ─────────────────────────────────────────────────────────────────

/// Position of each ranking key; also the order they are compared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankKey {
    Origin,
    EnglishFallback,
    Region,
    Revision,
    Prototype,
    Clean,
    Source,
    Seq,
}

const RANK_KEYS: [RankKey; 8] = [
    RankKey::Origin,
    RankKey::EnglishFallback,
    RankKey::Region,
    RankKey::Revision,
    RankKey::Prototype,
    RankKey::Clean,
    RankKey::Source,
    RankKey::Seq,
];

/// Facts about a bucket that switch ranking keys on or off.
struct RankContext<'a> {
    config: &'a SelectConfig,
    official_english_exists: bool,
}

impl<'a> RankContext<'a> {
    fn new(config: &'a SelectConfig, bucket: &[&ReleaseCandidate]) -> Self {
        Self {
            config,
            official_english_exists: bucket.iter().any(|c| c.is_official_english()),
        }
    }

    /// Sort value of one key for one candidate; lower is better.
    fn value(&self, key: RankKey, c: &ReleaseCandidate) -> u64 {
        let is_fan = c.origin == OriginKind::FanTranslation || c.flags.translation;
        match key {
            RankKey::Origin => {
                if !self.official_english_exists {
                    0
                } else {
                    u64::from(is_fan != self.config.prefer_translations)
                }
            }
            RankKey::EnglishFallback => {
                if self.official_english_exists {
                    0
                } else {
                    u64::from(!c.is_english())
                }
            }
            RankKey::Region => region_rank(c, &self.config.region_priority) as u64,
            RankKey::Revision => u64::from(u32::MAX - c.revision),
            RankKey::Prototype => u64::from(c.flags.proto),
            RankKey::Clean => u64::from(c.flags.translation && c.flags.hack),
            RankKey::Source => self
                .config
                .source_preference
                .iter()
                .position(|s| *s == c.source_id)
                .unwrap_or(self.config.source_preference.len()) as u64,
            RankKey::Seq => c.seq as u64,
        }
    }

    fn compare(&self, a: &ReleaseCandidate, b: &ReleaseCandidate) -> Ordering {
        RANK_KEYS
            .iter()
            .map(|&key| self.value(key, a).cmp(&self.value(key, b)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Reason `loser` ranks below `winner`: the first key where they differ.
    fn reason(&self, winner: &ReleaseCandidate, loser: &ReleaseCandidate) -> RejectReason {
        let decisive = RANK_KEYS
            .iter()
            .copied()
            .find(|&key| self.value(key, winner) != self.value(key, loser))
            .unwrap_or(RankKey::Seq);
        match decisive {
            RankKey::Origin if self.config.prefer_translations => {
                RejectReason::FanTranslationPreferred
            }
            RankKey::Origin => RejectReason::OfficialPreferred,
            RankKey::EnglishFallback => RejectReason::TranslationPreferred,
            RankKey::Region => RejectReason::LowerRegionPriority,
            RankKey::Revision => RejectReason::SupersededBy(revision_display(winner)),
            RankKey::Prototype => RejectReason::PrototypeSuperseded,
            RankKey::Clean => RejectReason::HackedTranslationSuperseded,
            RankKey::Source => RejectReason::LowerSourcePreference,
            RankKey::Seq => RejectReason::DuplicateOfEarlier,
        }
    }

    fn best<'c>(&self, bucket: &[&'c ReleaseCandidate]) -> Option<&'c ReleaseCandidate> {
        bucket.iter().copied().min_by(|a, b| self.compare(a, b))
    }
}

/// Best (lowest) index of any of the candidate's regions in `priority`;
/// candidates with no listed region rank after every listed one.
pub fn region_rank(candidate: &ReleaseCandidate, priority: &[Region]) -> usize {
    candidate
        .regions
        .iter()
        .filter_map(|r| priority.iter().position(|p| p == r))
        .min()
        .unwrap_or(priority.len())
}

/// `"Rev B"` → `"rev B"`, `"v1.1"` stays, unlabeled → `"revision N"`.
fn revision_display(winner: &ReleaseCandidate) -> String {
    match &winner.revision_label {
        Some(label) => match label.strip_prefix("Rev") {
            Some(rest) => format!("rev{rest}"),
            None => label.clone(),
        },
        None => format!("revision {}", winner.revision),
    }
}

/// Pick the winner(s) of one group.
pub fn select(group: &CanonicalGroup, config: &SelectConfig) -> SelectionResult {
    let mut rejected = Vec::new();
    let mut survivors: Vec<&ReleaseCandidate> = Vec::new();

    for candidate in &group.candidates {
        match disqualify(candidate, config) {
            Some(d) => {
                log::debug!("{}: disqualified ({})", candidate.raw_name, d);
                rejected.push(Rejection {
                    candidate: candidate.clone(),
                    reason: RejectReason::Disqualified(d),
                });
            }
            None => survivors.push(candidate),
        }
    }

    let chosen: Vec<&ReleaseCandidate> = if survivors.is_empty() {
        log::warn!(
            "[{}] '{}': all {} candidates disqualified, skipping",
            group.platform,
            group.canonical_title,
            group.candidates.len()
        );
        Vec::new()
    } else if config.keep_regions.is_empty() {
        rank_single(&survivors, config, &mut rejected)
    } else {
        rank_per_region(&survivors, config, &mut rejected)
    };

    for winner in &chosen {
        log::debug!(
            "[{}] '{}': selected {}",
            group.platform,
            group.canonical_title,
            winner.raw_name
        );
    }

    SelectionResult {
        platform: group.platform.clone(),
        canonical_title: group.canonical_title.clone(),
        chosen: chosen.into_iter().cloned().collect(),
        rejected,
    }
}

fn rank_single<'c>(
    survivors: &[&'c ReleaseCandidate],
    config: &SelectConfig,
    rejected: &mut Vec<Rejection>,
) -> Vec<&'c ReleaseCandidate> {
    let ctx = RankContext::new(config, survivors);
    let Some(winner) = ctx.best(survivors) else {
        return Vec::new();
    };
    for &loser in survivors {
        if !std::ptr::eq(loser, winner) {
            rejected.push(Rejection {
                candidate: loser.clone(),
                reason: ctx.reason(winner, loser),
            });
        }
    }
    vec![winner]
}

fn rank_per_region<'c>(
    survivors: &[&'c ReleaseCandidate],
    config: &SelectConfig,
    rejected: &mut Vec<Rejection>,
) -> Vec<&'c ReleaseCandidate> {
    // (bucket winner, its bucket) in keep_regions order
    let mut buckets: Vec<(&ReleaseCandidate, Vec<&ReleaseCandidate>)> = Vec::new();
    for &region in &config.keep_regions {
        let bucket: Vec<&ReleaseCandidate> = survivors
            .iter()
            .copied()
            .filter(|c| c.has_region(region))
            .collect();
        let ctx = RankContext::new(config, &bucket);
        if let Some(winner) = ctx.best(&bucket) {
            buckets.push((winner, bucket));
        }
    }

    if buckets.is_empty() {
        return rank_single(survivors, config, rejected);
    }

    let mut chosen: Vec<&ReleaseCandidate> = Vec::new();
    for (winner, _) in &buckets {
        if !chosen.iter().any(|c| std::ptr::eq(*c, *winner)) {
            chosen.push(*winner);
        }
    }

    for &candidate in survivors {
        if chosen.iter().any(|c| std::ptr::eq(*c, candidate)) {
            continue;
        }
        let first_bucket = buckets
            .iter()
            .find(|(_, bucket)| bucket.iter().any(|c| std::ptr::eq(*c, candidate)));
        let reason = match first_bucket {
            Some((winner, bucket)) => RankContext::new(config, bucket).reason(winner, candidate),
            None => RejectReason::NotInKeptRegion,
        };
        rejected.push(Rejection {
            candidate: candidate.clone(),
            reason,
        });
    }

    chosen
}

/// Run [`select`] over every group.
pub fn select_all(groups: &[CanonicalGroup], config: &SelectConfig) -> Vec<SelectionResult> {
    groups.iter().map(|g| select(g, config)).collect()
}

#[cfg(test)]
#[path = "tests/select_tests.rs"]
mod tests;
