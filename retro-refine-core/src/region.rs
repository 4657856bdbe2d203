use serde::{Deserialize, Serialize};

/// Geographic regions that appear as release tags in archive names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    /// USA / North America
    Usa,
    /// World / Region-free
    World,
    /// Europe (PAL regions)
    Europe,
    Australia,
    UnitedKingdom,
    Canada,
    Japan,
    Korea,
    China,
    /// Taiwan
    Taiwan,
    HongKong,
    Asia,
    Brazil,
    France,
    Germany,
    Spain,
    Italy,
    Netherlands,
    Sweden,
    Norway,
    Denmark,
    Finland,
    Portugal,
    Russia,
    Poland,
    Greece,
    Scandinavia,
    LatinAmerica,
    Mexico,
    Argentina,
    India,
}

/// All region variants in declaration order.
const ALL_REGIONS: &[Region] = &[
    Region::Usa,
    Region::World,
    Region::Europe,
    Region::Australia,
    Region::UnitedKingdom,
    Region::Canada,
    Region::Japan,
    Region::Korea,
    Region::China,
    Region::Taiwan,
    Region::HongKong,
    Region::Asia,
    Region::Brazil,
    Region::France,
    Region::Germany,
    Region::Spain,
    Region::Italy,
    Region::Netherlands,
    Region::Sweden,
    Region::Norway,
    Region::Denmark,
    Region::Finland,
    Region::Portugal,
    Region::Russia,
    Region::Poland,
    Region::Greece,
    Region::Scandinavia,
    Region::LatinAmerica,
    Region::Mexico,
    Region::Argentina,
    Region::India,
];

/// Default preference order used when the user does not configure one.
pub const DEFAULT_REGION_PRIORITY: &[Region] = &[
    Region::Usa,
    Region::World,
    Region::Europe,
    Region::Australia,
    Region::UnitedKingdom,
    Region::Spain,
    Region::France,
    Region::Germany,
    Region::Italy,
    Region::Netherlands,
    Region::Sweden,
    Region::Asia,
    Region::Japan,
    Region::Korea,
    Region::China,
    Region::Taiwan,
    Region::Brazil,
];

impl Region {
    /// The tag as it is written inside release names (e.g. `"Hong Kong"`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Usa => "USA",
            Self::World => "World",
            Self::Europe => "Europe",
            Self::Australia => "Australia",
            Self::UnitedKingdom => "United Kingdom",
            Self::Canada => "Canada",
            Self::Japan => "Japan",
            Self::Korea => "Korea",
            Self::China => "China",
            Self::Taiwan => "Taiwan",
            Self::HongKong => "Hong Kong",
            Self::Asia => "Asia",
            Self::Brazil => "Brazil",
            Self::France => "France",
            Self::Germany => "Germany",
            Self::Spain => "Spain",
            Self::Italy => "Italy",
            Self::Netherlands => "Netherlands",
            Self::Sweden => "Sweden",
            Self::Norway => "Norway",
            Self::Denmark => "Denmark",
            Self::Finland => "Finland",
            Self::Portugal => "Portugal",
            Self::Russia => "Russia",
            Self::Poland => "Poland",
            Self::Greece => "Greece",
            Self::Scandinavia => "Scandinavia",
            Self::LatinAmerica => "Latin America",
            Self::Mexico => "Mexico",
            Self::Argentina => "Argentina",
            Self::India => "India",
        }
    }

    /// Alternative spellings accepted in names and in user configuration.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Usa => &["US", "United States"],
            Self::UnitedKingdom => &["UK", "England"],
            Self::HongKong => &["HK"],
            Self::Netherlands => &["Holland"],
            _ => &[],
        }
    }

    /// Regions whose releases are assumed to be in English.
    pub fn is_english(&self) -> bool {
        matches!(
            self,
            Self::Usa
                | Self::World
                | Self::Europe
                | Self::Australia
                | Self::UnitedKingdom
                | Self::Canada
        )
    }

    pub fn all() -> &'static [Region] {
        ALL_REGIONS
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string is not a known region tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown region: '{0}'")]
pub struct RegionParseError(pub String);

impl std::str::FromStr for Region {
    type Err = RegionParseError;

    /// Parse a region from its tag name or an alias (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        ALL_REGIONS
            .iter()
            .copied()
            .find(|r| {
                r.name().eq_ignore_ascii_case(trimmed)
                    || r.aliases().iter().any(|a| a.eq_ignore_ascii_case(trimmed))
            })
            .ok_or_else(|| RegionParseError(trimmed.to_string()))
    }
}

/// Parse a comma-separated region list such as `"USA,World,Europe"`.
pub fn parse_region_list(list: &str) -> Result<Vec<Region>, RegionParseError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
#[path = "tests/region_tests.rs"]
mod tests;
