//! Shared data model for the retro-refine workspace: release candidates,
//! the region vocabulary, and the platform/alias lookup table.

pub mod error;
pub mod platform;
pub mod region;
pub mod release;
pub mod util;

pub use error::{ParseError, PlatformTableError};
pub use platform::{Platform, PlatformParseError, PlatformTable};
pub use region::{DEFAULT_REGION_PRIORITY, Region, RegionParseError, parse_region_list};
pub use release::{CandidateRef, Location, OriginKind, ReleaseCandidate, ReleaseFlags};
