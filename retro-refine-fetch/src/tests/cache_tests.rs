use super::*;

fn cache() -> (tempfile::TempDir, AcquisitionCache) {
    let dir = tempfile::tempdir().unwrap();
    let cache = AcquisitionCache::open(dir.path().join("cache")).unwrap();
    (dir, cache)
}

fn put(cache: &AcquisitionCache, platform: &str, name: &str, data: &[u8]) -> PathBuf {
    let path = cache.path_for(platform, name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, data).unwrap();
    path
}

#[test]
fn test_layout_and_sanitized_names() {
    let (_dir, cache) = cache();
    let path = cache.path_for("snes", "What? (USA).zip");
    assert_eq!(path, cache.root().join("snes").join("What_ (USA).zip"));
    assert_eq!(
        cache.part_path_for("snes", "Game (USA).zip"),
        cache.root().join("snes").join("Game (USA).zip.part")
    );
}

#[test]
fn test_complete_file_is_a_hit() {
    let (_dir, cache) = cache();
    assert_eq!(cache.lookup("snes", "Game (USA).zip", None).unwrap(), None);

    let path = put(&cache, "snes", "Game (USA).zip", b"12345678");
    assert_eq!(
        cache.lookup("snes", "Game (USA).zip", None).unwrap(),
        Some(path.clone())
    );
    assert_eq!(
        cache.lookup("snes", "Game (USA).zip", Some(8)).unwrap(),
        Some(path)
    );
}

#[test]
fn test_size_mismatch_invalidates() {
    let (_dir, cache) = cache();
    let path = put(&cache, "snes", "Game (USA).zip", b"1234");
    cache.record("snes", "Game (USA).zip", 4, None).unwrap();

    assert_eq!(cache.lookup("snes", "Game (USA).zip", Some(4096)).unwrap(), None);
    assert!(!path.exists());
    assert!(cache.entry("snes", "Game (USA).zip").is_none());
}

#[test]
fn test_part_file_is_never_a_hit() {
    let (_dir, cache) = cache();
    let part = cache.part_path_for("snes", "Game (USA).zip");
    fs::create_dir_all(part.parent().unwrap()).unwrap();
    fs::write(&part, b"half").unwrap();

    assert_eq!(cache.lookup("snes", "Game (USA).zip", None).unwrap(), None);
    assert!(cache.list().unwrap().is_empty());

    assert_eq!(cache.sweep_partials().unwrap(), 1);
    assert!(!part.exists());
}

#[test]
fn test_index_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("cache");
    {
        let cache = AcquisitionCache::open(&root).unwrap();
        put(&cache, "nes", "Game (USA).nes", b"abc");
        cache
            .record("nes", "Game (USA).nes", 3, Some("352441c2".into()))
            .unwrap();
    }
    let cache = AcquisitionCache::open(&root).unwrap();
    let entry = cache.entry("nes", "Game (USA).nes").unwrap();
    assert_eq!(entry.size, 3);
    assert!(entry.verified);
    assert_eq!(entry.crc32.as_deref(), Some("352441c2"));
}

#[test]
fn test_corrupt_index_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("cache");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("index.json"), "{ not json").unwrap();
    fs::create_dir_all(root.join("snes")).unwrap();
    fs::write(root.join("snes").join("Game (USA).sfc"), b"data").unwrap();

    let cache = AcquisitionCache::open(&root).unwrap();
    assert!(cache.lookup("snes", "Game (USA).sfc", Some(4)).unwrap().is_some());
}

#[test]
fn test_list_merges_index_with_files() {
    let (_dir, cache) = cache();
    put(&cache, "snes", "B (USA).sfc", b"bb");
    put(&cache, "nes", "A (USA).nes", b"a");
    cache
        .record("nes", "A (USA).nes", 1, Some("e8b7be43".into()))
        .unwrap();

    let entries = cache.list().unwrap();
    let keys: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.platform.as_str(), e.file_name.as_str()))
        .collect();
    assert_eq!(keys, vec![("nes", "A (USA).nes"), ("snes", "B (USA).sfc")]);
    assert!(entries[0].verified);
    assert!(!entries[1].verified);
    assert_eq!(cache.total_size().unwrap(), 3);
}

#[test]
fn test_clear_removes_everything() {
    let (_dir, cache) = cache();
    put(&cache, "snes", "A (USA).sfc", b"1234");
    put(&cache, "nes", "B (USA).nes", b"12");
    cache.record("snes", "A (USA).sfc", 4, None).unwrap();

    assert_eq!(cache.clear().unwrap(), 6);
    assert!(cache.list().unwrap().is_empty());
    assert!(!cache.root().join("index.json").exists());
    assert!(cache.entry("snes", "A (USA).sfc").is_none());
}
