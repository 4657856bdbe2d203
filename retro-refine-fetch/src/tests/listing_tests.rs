use super::*;

fn base() -> Url {
    Url::parse("http://mirror.test/roms/snes/").unwrap()
}

fn parse(html: &str) -> Listing {
    parse_listing(html, &base(), &PlatformTable::builtin())
}

fn file_names(listing: &Listing) -> Vec<&str> {
    listing.files.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn test_parse_size() {
    assert_eq!(parse_size("1536000"), Some(1_536_000));
    assert_eq!(parse_size("1.5M"), Some(1_572_864));
    assert_eq!(parse_size("100 KB"), Some(102_400));
    assert_eq!(parse_size("175.9 MiB"), Some((175.9 * 1_048_576.0) as u64));
    assert_eq!(parse_size("2G"), Some(2 * 1024 * 1024 * 1024));
    assert_eq!(parse_size("512 B"), Some(512));
    assert_eq!(parse_size("-"), None);
    assert_eq!(parse_size("01-Jan-2020"), None);
    assert_eq!(parse_size(""), None);
}

#[test]
fn test_size_hint_exactness() {
    assert!(size_hint("1536000").unwrap().exact);
    assert!(size_hint("512 B").unwrap().exact);
    assert!(!size_hint("1.5M").unwrap().exact);
    assert!(!size_hint("2 KiB").unwrap().exact);
}

#[test]
fn test_resolve_link_rules() {
    let dir = base();
    let resolve = |href: &str| resolve_link(href, &dir).map(|u| u.to_string());

    assert_eq!(
        resolve("Game.zip").as_deref(),
        Some("http://mirror.test/roms/snes/Game.zip")
    );
    assert_eq!(
        resolve("/roms/snes/Hacks/").as_deref(),
        Some("http://mirror.test/roms/snes/Hacks/")
    );
    assert_eq!(
        resolve("Game.zip#top").as_deref(),
        Some("http://mirror.test/roms/snes/Game.zip")
    );
    assert_eq!(resolve("../"), None);
    assert_eq!(resolve("../nes/"), None);
    assert_eq!(
        resolve("../files/Game%20(USA).sfc").as_deref(),
        Some("http://mirror.test/roms/files/Game%20(USA).sfc")
    );
    assert_eq!(
        resolve("/elsewhere/Game.zip").as_deref(),
        Some("http://mirror.test/elsewhere/Game.zip")
    );
    assert_eq!(resolve("#top"), None);
    assert_eq!(resolve("?C=M;O=A"), None);
    assert_eq!(resolve("./"), None);
    assert_eq!(resolve("javascript:void(0)"), None);
    assert_eq!(resolve("mailto:admin@mirror.test"), None);
    assert_eq!(resolve("http://elsewhere.test/roms/snes/Game.zip"), None);
}

#[test]
fn test_directory_of_page_url() {
    let page = Url::parse("http://mirror.test/roms/snes/index.html?x=1").unwrap();
    assert_eq!(directory_of(&page).as_str(), "http://mirror.test/roms/snes/");
    assert_eq!(directory_of(&base()), base());
}

#[test]
fn test_table_rows_with_size_cells() {
    let html = r#"<table>
        <tr><td><a href="Game%20A%20(USA).zip">Game A (USA).zip</a></td><td>2020-01-01</td><td class="size">1.0 MiB</td></tr>
        <tr><td><a href="Game%20B%20(Japan).zip">Game B (Japan).zip</a></td><td>2048</td></tr>
        <tr><td><a href="Hacks/">Hacks/</a></td><td>-</td></tr>
        <tr><td><a href="readme.txt">readme.txt</a></td><td>12</td></tr>
    </table>"#;
    let listing = parse(html);

    assert_eq!(file_names(&listing), vec!["Game A (USA).zip", "Game B (Japan).zip"]);
    assert_eq!(listing.files[0].size, Some(1_048_576));
    assert!(!listing.files[0].size_exact);
    assert_eq!(listing.files[1].size, Some(2048));
    assert!(listing.files[1].size_exact);
    assert_eq!(
        listing.subdirs,
        vec![Url::parse("http://mirror.test/roms/snes/Hacks/").unwrap()]
    );
}

#[test]
fn test_autoindex_pre_block() {
    let html = r#"<pre><a href="?C=N;O=D">Name</a>
<hr><a href="../">../</a>
<a href="Alpha%20(USA).7z">Alpha (USA).7z</a>          12-Mar-2021 10:00    175.9 MiB
<a href="Beta%20(Europe).7z">Beta (Europe).7z</a>       12-Mar-2021 10:00    -
</pre>"#;
    let listing = parse(html);

    assert_eq!(file_names(&listing), vec!["Alpha (USA).7z", "Beta (Europe).7z"]);
    assert_eq!(listing.files[0].size, parse_size("175.9 MiB"));
    assert_eq!(listing.files[1].size, None);
    assert!(listing.subdirs.is_empty());
}

#[test]
fn test_plain_text_pre_block() {
    let html = "<pre>
-rw-r--r-- 1 ftp ftp 1536000 Jan  1 12:00 Listed Game (USA).zip
Other Game (Japan).zip    2.5M
Bare Name (Europe).sfc
not a file
</pre>";
    let listing = parse(html);

    assert_eq!(
        file_names(&listing),
        vec![
            "Listed Game (USA).zip",
            "Other Game (Japan).zip",
            "Bare Name (Europe).sfc"
        ]
    );
    assert_eq!(listing.files[0].size, Some(1_536_000));
    assert!(listing.files[0].size_exact);
    assert_eq!(listing.files[1].size, Some(2_621_440));
    assert_eq!(listing.files[2].size, None);
    assert_eq!(
        listing.files[0].url.as_str(),
        "http://mirror.test/roms/snes/Listed%20Game%20(USA).zip"
    );
}

#[test]
fn test_data_attributes() {
    let html = r#"<div class="file" data-url="Script%20Game%20(USA).zip"></div>
<button data-href="Another%20(USA).sfc">Get</button>
<img src="banner.png">
<embed src="Embedded%20(Japan).zip?dl=1">"#;
    let listing = parse(html);

    assert_eq!(
        file_names(&listing),
        vec!["Script Game (USA).zip", "Another (USA).sfc", "Embedded (Japan).zip"]
    );
}

#[test]
fn test_union_dedupes_and_keeps_first_size() {
    // The same file appears as a table row, an anchor and a pre line
    let html = r#"<table><tr><td><a href="Dup%20(USA).zip">Dup (USA).zip</a></td><td>-</td></tr></table>
<pre><a href="Dup%20(USA).zip">Dup (USA).zip</a>   01-Jan-2020 00:00   4096
<a href="/roms/snes/Dup%20(USA).zip">again</a>   01-Jan-2020 00:00   8192
</pre>"#;
    let listing = parse(html);

    assert_eq!(listing.files.len(), 1);
    assert_eq!(listing.files[0].size, Some(4096));
}

#[test]
fn test_non_candidate_files_ignored() {
    let html = r#"<a href="index.html">index</a><a href="notes.txt">notes</a><a href="Game (USA).nes">g</a>"#;
    assert_eq!(file_names(&parse(html)), vec!["Game (USA).nes"]);
}

#[test]
fn test_parent_relative_file_links_are_kept() {
    let listing = parse(r#"<a href="../files/Game%20(USA).sfc">Game (USA).sfc</a>"#);
    assert_eq!(file_names(&listing), vec!["Game (USA).sfc"]);
    assert_eq!(
        listing.files[0].url.as_str(),
        "http://mirror.test/roms/files/Game%20(USA).sfc"
    );
    assert!(listing.subdirs.is_empty());
}
