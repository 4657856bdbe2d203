use super::*;

#[test]
fn canonical_names_round_trip() {
    for &platform in Platform::all() {
        let parsed: Platform = platform.short_name().parse().unwrap();
        assert_eq!(parsed, platform, "round-trip failed for {:?}", platform);
    }
}

#[test]
fn aliases_resolve_correctly() {
    let cases = [
        ("gc", Platform::GameCube),
        ("ds", Platform::Ds),
        ("gg", Platform::GameGear),
        ("psx", Platform::Ps1),
        ("sfc", Platform::Snes),
        ("super-famicom", Platform::Snes),
        ("mega_drive", Platform::Genesis),
        ("gbc", Platform::GameBoyColor),
        ("dc", Platform::Dreamcast),
        ("tg16", Platform::PcEngine),
        ("mark iii", Platform::MasterSystem),
    ];
    for (input, expected) in cases {
        let parsed: Platform = input.parse().unwrap();
        assert_eq!(
            parsed, expected,
            "alias '{}' should parse to {:?}",
            input, expected
        );
    }
}

#[test]
fn unknown_platform_is_an_error() {
    let err = "dreamblaster".parse::<Platform>().unwrap_err();
    assert_eq!(err.to_string(), "unknown platform: 'dreamblaster'");
}

#[test]
fn builtin_table_resolves_folders() {
    let table = PlatformTable::builtin();
    assert_eq!(table.platform_for_folder("SNES"), Some("snes"));
    assert_eq!(table.platform_for_folder("Super_Famicom"), Some("snes"));
    assert_eq!(table.platform_for_folder("Game Boy Advance"), Some("gba"));
    assert_eq!(
        table.platform_for_folder("Nintendo - Super Nintendo Entertainment System"),
        Some("snes")
    );
    assert_eq!(table.platform_for_folder("Screenshots"), None);
}

#[test]
fn folders_containing_an_alias_resolve_to_the_longest_one() {
    let table = PlatformTable::builtin();
    assert_eq!(
        table.platform_for_folder("Nintendo - Super Famicom [T-En]"),
        Some("snes")
    );
    assert_eq!(
        table.platform_for_folder("Game Boy Color (Translated)"),
        Some("gbc")
    );
    assert_eq!(table.platform_for_folder("Famicom Hacks"), Some("nes"));
    // Two-letter aliases never match inside longer words.
    assert_eq!(table.platform_for_folder("Music"), None);
}

#[test]
fn builtin_table_resolves_extensions() {
    let table = PlatformTable::builtin();
    assert_eq!(table.platform_for_extension("Zelda (USA).SFC"), Some("snes"));
    assert_eq!(table.platform_for_extension("Sonic (World).md"), Some("genesis"));
    // Containers carry no platform information.
    assert_eq!(table.platform_for_extension("Sonic (World).zip"), None);
    assert_eq!(table.platform_for_extension("README"), None);
}

#[test]
fn candidate_files_include_containers() {
    let table = PlatformTable::builtin();
    assert!(table.is_candidate_file("Game (USA).zip"));
    assert!(table.is_candidate_file("Game (USA).7Z"));
    assert!(table.is_candidate_file("Game (USA).nes"));
    assert!(!table.is_candidate_file("Game (USA).txt"));
    assert!(!table.is_candidate_file(".zip"));
}

#[test]
fn toml_overlay_extends_builtin() {
    let table = PlatformTable::from_toml_str(
        r#"
[aliases]
"My Dumps" = "snes"
"arcade stuff" = "arcade"

[extensions]
".rom" = "msx"
"#,
    )
    .unwrap();

    assert_eq!(table.platform_for_folder("my-dumps"), Some("snes"));
    assert_eq!(table.platform_for_folder("Arcade Stuff"), Some("arcade"));
    assert_eq!(table.platform_for_extension("Knightmare.ROM"), Some("msx"));
    assert!(table.is_candidate_file("Knightmare.rom"));
    assert!(table.is_known_platform("msx"));
    // Built-in entries survive.
    assert_eq!(table.platform_for_folder("gba"), Some("gba"));
}

#[test]
fn toml_overlay_rejects_bad_documents() {
    assert!(PlatformTable::from_toml_str("[aliases]\nfoo = 3").is_err());
}

#[test]
fn folder_name_normalization() {
    assert_eq!(normalize_folder_name("  Mega__Drive - JP "), "mega drive jp");
}
