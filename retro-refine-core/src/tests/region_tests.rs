use super::*;

#[test]
fn names_round_trip() {
    for &region in Region::all() {
        let parsed: Region = region.name().parse().unwrap();
        assert_eq!(parsed, region, "round-trip failed for {:?}", region);
    }
}

#[test]
fn aliases_and_case_are_accepted() {
    assert_eq!("usa".parse::<Region>().unwrap(), Region::Usa);
    assert_eq!("England".parse::<Region>().unwrap(), Region::UnitedKingdom);
    assert_eq!("hong kong".parse::<Region>().unwrap(), Region::HongKong);
    assert_eq!(" Japan ".parse::<Region>().unwrap(), Region::Japan);
}

#[test]
fn unknown_region_is_an_error() {
    assert!("Atlantis".parse::<Region>().is_err());
    // A fragment of a multi-word region is not a region on its own.
    assert!("Kong".parse::<Region>().is_err());
}

#[test]
fn english_regions() {
    assert!(Region::Usa.is_english());
    assert!(Region::Europe.is_english());
    assert!(!Region::Japan.is_english());
    assert!(!Region::Brazil.is_english());
}

#[test]
fn region_list_parsing() {
    let list = parse_region_list("USA, World,Europe,,Japan").unwrap();
    assert_eq!(
        list,
        vec![Region::Usa, Region::World, Region::Europe, Region::Japan]
    );
    assert!(parse_region_list("USA,Mars").is_err());
}

#[test]
fn default_priority_starts_with_english_regions() {
    assert_eq!(
        &DEFAULT_REGION_PRIORITY[..4],
        &[Region::Usa, Region::World, Region::Europe, Region::Australia]
    );
}
