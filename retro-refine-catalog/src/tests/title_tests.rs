use super::*;

fn table(pairs: &[(&str, &str)]) -> TitleMappings {
    TitleMappings::from_pairs(pairs.iter().copied()).unwrap()
}

#[test]
fn lowercases_and_strips_punctuation() {
    assert_eq!(normalize_title("Super Mario Bros."), "super mario bros");
    assert_eq!(normalize_title("Street Fighter II: Turbo"), "street fighter 2 turbo");
    assert_eq!(normalize_title("Ghosts 'n Goblins"), "ghosts n goblins");
    assert_eq!(normalize_title("Kirby's Dream Land"), "kirbys dream land");
    assert_eq!(normalize_title("Tom & Jerry"), "tom and jerry");
    assert_eq!(normalize_title("Mega Man X - Command Mission"), "mega man x command mission");
}

#[test]
fn articles_are_dropped() {
    assert_eq!(normalize_title("The Legend of Zelda"), "legend of zelda");
    assert_eq!(normalize_title("Legend of Zelda, The"), "legend of zelda");
    assert_eq!(
        normalize_title("Legend of Zelda, The - A Link to the Past"),
        "legend of zelda a link to the past"
    );
    assert_eq!(normalize_title("A Boy and His Blob"), "boy and his blob");
    // A title that is only an article keeps it.
    assert_eq!(normalize_title("The"), "the");
}

#[test]
fn roman_numerals_become_digits() {
    assert_eq!(normalize_title("Final Fantasy VII"), "final fantasy 7");
    assert_eq!(normalize_title("Final Fantasy IV"), "final fantasy 4");
    assert_eq!(normalize_title("Romancing SaGa III"), "romancing saga 3");
    assert_eq!(normalize_title("Dragon Quest XI"), "dragon quest 11");
    assert_eq!(normalize_title("Final Fantasy XIV"), "final fantasy 14");
    // A lone X stays a letter.
    assert_eq!(normalize_title("Mega Man X"), "mega man x");
    // Words that merely contain numeral letters are untouched.
    assert_eq!(normalize_title("Vixen Civil Mix"), "vixen civil mix");
}

#[test]
fn roman_numeral_bounds() {
    assert_eq!(roman_to_arabic("xxxix"), Some(39));
    assert_eq!(roman_to_arabic("xl"), None);
    assert_eq!(roman_to_arabic("xxxx"), None);
    assert_eq!(roman_to_arabic("iiii"), None);
}

#[test]
fn mappings_substitute_exact_matches_only() {
    let mappings = table(&[("Rockman 2", "Mega Man 2")]);
    assert_eq!(canonicalize("Rockman 2", &mappings), "mega man 2");
    assert_eq!(canonicalize("ROCKMAN II", &mappings), "mega man 2");
    assert_eq!(canonicalize("Rockman 2 Special", &mappings), "rockman 2 special");
}

#[test]
fn mapping_chains_resolve_to_terminal() {
    let mappings = table(&[
        ("Akumajou Dracula", "Castlevania"),
        ("Vampire Killer", "Akumajou Dracula"),
    ]);
    assert_eq!(mappings.get("vampire killer"), Some("castlevania"));
    assert_eq!(mappings.get("akumajou dracula"), Some("castlevania"));
}

#[test]
fn mapping_cycles_are_rejected() {
    let err = TitleMappings::from_pairs([("A Game", "B Game"), ("B Game", "A Game")]).unwrap_err();
    assert!(matches!(err, TitleMapError::Cycle(_)));
}

#[test]
fn self_mappings_are_ignored() {
    let mappings = table(&[("The Game", "Game")]);
    assert!(mappings.is_empty());
}

#[test]
fn canonicalization_is_idempotent() {
    let mappings = table(&[
        ("Rockman 2", "Mega Man 2"),
        ("Mega Man II", "Mega Man 2"),
        ("Legend of Zelda, The", "Zelda"),
        ("Akumajou Dracula", "Castlevania"),
        ("Dracula", "Akumajou Dracula"),
    ]);
    let inputs = [
        "Rockman 2",
        "The Legend of Zelda",
        "Legend of Zelda, The",
        "Dracula",
        "Street Fighter II': Champion Edition",
        "The The Game",
        "A & B",
        "Final Fantasy VI",
        "  spaced   out  ",
    ];
    for input in inputs {
        let once = canonicalize(input, &mappings);
        let twice = canonicalize(&once, &mappings);
        assert_eq!(once, twice, "not idempotent for {input:?}");
    }
}

#[test]
fn json_categories_are_flattened() {
    let json = r#"{
        "_comment": "metadata is skipped",
        "_version": 3,
        "mega_man": { "Rockman 2": "Mega Man 2", "_note": "skipped too" },
        "castlevania": { "Akumajou Dracula": "Castlevania" },
        "broken": "not an object"
    }"#;
    let mappings = TitleMappings::from_json_str(json).unwrap();
    assert_eq!(mappings.len(), 2);
    assert_eq!(mappings.get("rockman 2"), Some("mega man 2"));
    assert_eq!(mappings.get("akumajou dracula"), Some("castlevania"));
}

#[test]
fn missing_file_is_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let mappings = TitleMappings::load(&dir.path().join("nope.json")).unwrap();
    assert!(mappings.is_empty());
}

#[test]
fn shared_mappings_reload_and_keep_old_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("title_mappings.json");
    std::fs::write(&path, r#"{"mm": {"Rockman 2": "Mega Man 2"}}"#).unwrap();

    let shared = SharedTitleMappings::open(Some(path.clone())).unwrap();
    let before = shared.snapshot();
    assert_eq!(before.len(), 1);

    std::fs::write(
        &path,
        r#"{"mm": {"Rockman 2": "Mega Man 2", "Rockman 3": "Mega Man 3"}}"#,
    )
    .unwrap();
    assert_eq!(shared.reload().unwrap(), 2);
    assert_eq!(shared.snapshot().len(), 2);
    // An earlier snapshot is unaffected by the reload.
    assert_eq!(before.len(), 1);

    std::fs::write(&path, "{ not json").unwrap();
    assert!(shared.reload().is_err());
    assert_eq!(shared.snapshot().len(), 2);
}

#[test]
fn canonicalizer_memoizes() {
    let mappings = Arc::new(table(&[("Rockman 2", "Mega Man 2")]));
    let mut canon = Canonicalizer::new(mappings);
    assert_eq!(canon.canonicalize("Rockman 2"), "mega man 2");
    assert_eq!(canon.canonicalize("Rockman 2"), "mega man 2");
    assert_eq!(canon.memo.len(), 1);
}
