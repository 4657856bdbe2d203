//! Pure selection logic: release-name parsing, flag detection, title
//! canonicalization, grouping, winner selection and the decision log.
//!
//! Nothing here performs network I/O or suspends; every function is
//! synchronous and deterministic for a given input and title table.

pub mod error;
pub mod flags;
pub mod group;
pub mod log;
pub mod name_parser;
pub mod select;
pub mod title;

pub use error::TitleMapError;
pub use flags::{FlagRule, Status, detect_flags};
pub use group::{CanonicalGroup, group_candidates};
pub use log::{LogEntry, SelectionLog};
pub use name_parser::{ParseContext, ParsedName, parse_candidate, parse_name};
pub use select::{
    Disqualification, NameFilter, RejectReason, Rejection, SelectConfig, SelectionResult, select,
    select_all,
};
pub use title::{Canonicalizer, SharedTitleMappings, TitleMappings, canonicalize, normalize_title};
