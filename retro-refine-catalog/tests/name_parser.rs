use retro_refine_catalog::name_parser::{ParseContext, parse_candidate, parse_name};
use retro_refine_catalog::title::{Canonicalizer, TitleMappings};
use retro_refine_core::{CandidateRef, Location, OriginKind, ParseError, Region};
use std::sync::Arc;

#[test]
fn simple_usa_game() {
    let p = parse_name("Super Mario Bros. (USA).nes").unwrap();
    assert_eq!(p.title, "Super Mario Bros.");
    assert_eq!(p.regions, vec![Region::Usa]);
    assert_eq!(p.revision, 0);
    assert!(p.revision_label.is_none());
    assert!(p.languages.is_empty());
    assert!(p.other_tags.is_empty());
}

#[test]
fn multi_region() {
    let p = parse_name("Tetris (USA, Europe).zip").unwrap();
    assert_eq!(p.title, "Tetris");
    assert_eq!(p.regions, vec![Region::Usa, Region::Europe]);
}

#[test]
fn multi_word_regions_are_whole_matches() {
    let p = parse_name("Game (Hong Kong).zip").unwrap();
    assert_eq!(p.regions, vec![Region::HongKong]);

    // "Kong" alone is not a region; the group is left unclassified.
    let p = parse_name("Donkey (Kong).zip").unwrap();
    assert!(p.regions.is_empty());
    assert_eq!(p.other_tags, vec!["Kong"]);
}

#[test]
fn letter_revision() {
    let p = parse_name("The Legend of Zelda (USA) (Rev A).zip").unwrap();
    assert_eq!(p.title, "The Legend of Zelda");
    assert_eq!(p.revision, 1);
    assert_eq!(p.revision_label.as_deref(), Some("Rev A"));
}

#[test]
fn numeric_revision() {
    let p = parse_name("Some Game (Europe) (Rev 2).zip").unwrap();
    assert_eq!(p.revision, 2);
}

#[test]
fn higher_of_revision_and_version_wins() {
    let p = parse_name("Game (USA) (Rev A) (v1.2).zip").unwrap();
    assert_eq!(p.revision, 102);
    assert_eq!(p.revision_label.as_deref(), Some("v1.2"));

    let p = parse_name("Game (USA) (Rev C) (v0.1).zip").unwrap();
    assert_eq!(p.revision, 3);
    assert_eq!(p.revision_label.as_deref(), Some("Rev C"));
}

#[test]
fn languages() {
    let p = parse_name("Game Title (Europe) (En,Fr,De).zip").unwrap();
    assert_eq!(p.regions, vec![Region::Europe]);
    assert_eq!(p.languages, vec!["En", "Fr", "De"]);

    // A single code is accepted too.
    let p = parse_name("Game Title (Japan) (En).zip").unwrap();
    assert_eq!(p.languages, vec!["En"]);
}

#[test]
fn year_tag() {
    let p = parse_name("Game (USA) (1993).zip").unwrap();
    assert_eq!(p.year, Some(1993));

    let p = parse_name("Game (USA) (1850).zip").unwrap();
    assert_eq!(p.year, None);
    assert_eq!(p.other_tags, vec!["1850"]);
}

#[test]
fn complex_name() {
    let p = parse_name(
        "Legend of Zelda, The - Ocarina of Time (USA) (Rev B) (En,Fr) [!] [T-En by Nobody].z64",
    )
    .unwrap();
    assert_eq!(p.title, "Legend of Zelda, The - Ocarina of Time");
    assert_eq!(p.regions, vec![Region::Usa]);
    assert_eq!(p.revision, 2);
    assert_eq!(p.languages, vec!["En", "Fr"]);
    assert_eq!(p.other_tags, vec!["[!]", "[T-En by Nobody]"]);
}

#[test]
fn title_text_between_groups_is_kept() {
    let p = parse_name("Game (Japan) Special Edition (Rev 1).zip").unwrap();
    assert_eq!(p.title, "Game Special Edition");
}

#[test]
fn no_tags() {
    let p = parse_name("Just a Name").unwrap();
    assert_eq!(p.title, "Just a Name");
    assert!(p.regions.is_empty());
}

#[test]
fn unknown_extension_is_kept() {
    let p = parse_name("Dr. Mario (USA)").unwrap();
    assert_eq!(p.title, "Dr. Mario");
}

#[test]
fn malformed_names_are_errors() {
    assert_eq!(parse_name("").unwrap_err(), ParseError::Empty);
    assert_eq!(parse_name("   ").unwrap_err(), ParseError::Empty);
    assert!(matches!(
        parse_name("Game\u{7}(USA).zip"),
        Err(ParseError::ControlCharacters(_))
    ));
    assert!(matches!(
        parse_name("Game (USA.zip"),
        Err(ParseError::Unbalanced(_))
    ));
    assert!(matches!(
        parse_name("Game USA).zip"),
        Err(ParseError::Unbalanced(_))
    ));
    assert!(matches!(
        parse_name("(USA) [!].zip"),
        Err(ParseError::NoTitle(_))
    ));
}

#[test]
fn candidate_carries_scan_context() {
    let mappings = Arc::new(
        TitleMappings::from_pairs([("Rockman 2", "Mega Man 2")]).unwrap(),
    );
    let mut canon = Canonicalizer::new(mappings);
    let cref = CandidateRef {
        source_id: "translations".into(),
        platform: "nes".into(),
        file_name: "Rockman 2 - Dr. Wily no Nazo (Japan).zip".into(),
        location: Location::Remote("https://example.com/nes/r2.zip".into()),
        size_hint: Some(131_088),
        size_exact: true,
    };
    let ctx = ParseContext {
        origin: OriginKind::FanTranslation,
        seq: 7,
    };

    let c = parse_candidate(&cref, ctx, &mut canon).unwrap();
    assert_eq!(c.source_id, "translations");
    assert_eq!(c.platform, "nes");
    assert_eq!(c.title, "Rockman 2 - Dr. Wily no Nazo");
    assert_eq!(c.canonical_title, "rockman 2 dr wily no nazo");
    assert!(c.flags.translation);
    assert_eq!(c.origin, OriginKind::FanTranslation);
    assert_eq!(c.size, Some(131_088));
    assert_eq!(c.seq, 7);
}
