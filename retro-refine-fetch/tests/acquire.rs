mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use common::{FakeTransport, url};
use retro_refine_fetch::{
    AbortReason, AcquireConfig, AcquireRequest, AcquisitionCache, Crc32Verifier, Downloader,
    Manifest, VerifyStatus, acquire,
};
use retro_refine_lib::AcquireEvent;

const BASE: &str = "http://mirror.test/snes/";

fn request(file: &str, size: Option<u64>) -> AcquireRequest {
    AcquireRequest {
        url: url(&format!("{BASE}{file}")),
        platform: "snes".into(),
        file_name: file.into(),
        size_hint: size,
        size_exact: size.is_some(),
        expected_crc32: None,
    }
}

fn config() -> AcquireConfig {
    AcquireConfig {
        parallel: Some(2),
        connections: Some(1),
        retry_backoff: Duration::from_millis(1),
        ..Default::default()
    }
}

fn open_cache(dir: &tempfile::TempDir) -> Arc<AcquisitionCache> {
    Arc::new(AcquisitionCache::open(dir.path().join("cache")).unwrap())
}

async fn run(
    transport: &Arc<FakeTransport>,
    cache: &Arc<AcquisitionCache>,
    config: &AcquireConfig,
    requests: Vec<AcquireRequest>,
) -> Manifest {
    acquire(
        requests,
        cache.clone(),
        transport.clone(),
        config,
        None,
        CancellationToken::new(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_downloads_into_cache_layout() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .file(&format!("{BASE}Alpha.sfc"), b"alpha rom data")
            .file(&format!("{BASE}Beta.sfc"), b"beta"),
    );

    let manifest = run(
        &transport,
        &cache,
        &config(),
        vec![request("Alpha.sfc", Some(14)), request("Beta.sfc", None)],
    )
    .await;

    assert_eq!(manifest.succeeded.len(), 2);
    assert!(manifest.failed.is_empty());
    assert!(manifest.aborted.is_none());
    let alpha = cache.path_for("snes", "Alpha.sfc");
    assert_eq!(std::fs::read(&alpha).unwrap(), b"alpha rom data");
    assert_eq!(manifest.succeeded[0].path.as_deref(), Some(alpha.as_path()));
    assert_eq!(manifest.succeeded[0].attempts, 1);
    assert!(!cache.part_path_for("snes", "Alpha.sfc").exists());
}

#[tokio::test]
async fn test_second_run_makes_no_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .file(&format!("{BASE}Alpha.sfc"), b"alpha")
            .file(&format!("{BASE}Beta.sfc"), b"beta"),
    );
    let requests = vec![request("Alpha.sfc", Some(5)), request("Beta.sfc", Some(4))];

    run(&transport, &cache, &config(), requests.clone()).await;
    let calls = transport.network_calls();
    assert_eq!(calls, 2);

    let manifest = run(&transport, &cache, &config(), requests).await;
    assert_eq!(transport.network_calls(), calls);
    assert_eq!(manifest.skipped.len(), 2);
    assert!(manifest.succeeded.is_empty());
}

#[tokio::test]
async fn test_duplicate_requests_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Alpha.sfc"), b"alpha"));

    let manifest = run(
        &transport,
        &cache,
        &config(),
        vec![request("Alpha.sfc", None), request("Alpha.sfc", None)],
    )
    .await;
    assert_eq!(manifest.total(), 1);
    assert_eq!(transport.file_opens.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_file_with_wrong_size_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let stale = cache.path_for("snes", "Alpha.sfc");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, b"old").unwrap();

    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Alpha.sfc"), b"new data"));
    let manifest = run(&transport, &cache, &config(), vec![request("Alpha.sfc", Some(8))]).await;

    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(std::fs::read(&stale).unwrap(), b"new data");
}

#[tokio::test]
async fn test_wrong_listing_size_does_not_fail_the_download() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let data = vec![7u8; 4096];
    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}X.sfc"), &data));

    let manifest = run(&transport, &cache, &config(), vec![request("X.sfc", Some(1536))]).await;

    assert!(manifest.failed.is_empty());
    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(manifest.succeeded[0].attempts, 1);
    assert_eq!(std::fs::read(cache.path_for("snes", "X.sfc")).unwrap(), data);
}

#[tokio::test]
async fn test_leftover_part_file_is_not_a_hit() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let part = cache.part_path_for("snes", "Alpha.sfc");
    std::fs::create_dir_all(part.parent().unwrap()).unwrap();
    std::fs::write(&part, b"alp").unwrap();

    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Alpha.sfc"), b"alpha"));
    let manifest = run(&transport, &cache, &config(), vec![request("Alpha.sfc", None)]).await;

    assert_eq!(manifest.succeeded.len(), 1);
    assert!(manifest.skipped.is_empty());
    assert_eq!(std::fs::read(cache.path_for("snes", "Alpha.sfc")).unwrap(), b"alpha");
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .file(&format!("{BASE}Alpha.sfc"), b"alpha")
            .failing_file(&format!("{BASE}Alpha.sfc"), 3),
    );

    let manifest = run(&transport, &cache, &config(), vec![request("Alpha.sfc", None)]).await;
    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(manifest.succeeded[0].attempts, 4);
}

#[tokio::test]
async fn test_failures_are_reported_without_stopping_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .file(&format!("{BASE}Alpha.sfc"), b"alpha")
            .file(&format!("{BASE}Flaky.sfc"), b"flaky")
            .failing_file(&format!("{BASE}Flaky.sfc"), 10),
    );

    let manifest = run(
        &transport,
        &cache,
        &config(),
        vec![
            request("Missing.sfc", None),
            request("Flaky.sfc", None),
            request("Alpha.sfc", None),
        ],
    )
    .await;

    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(manifest.failed.len(), 2);
    assert!(manifest.aborted.is_none());
    let missing = manifest
        .failed
        .iter()
        .find(|i| i.file_name == "Missing.sfc")
        .unwrap();
    assert_eq!(missing.attempts, 1);
    assert!(missing.error.as_deref().unwrap().contains("404"));
    let flaky = manifest
        .failed
        .iter()
        .find(|i| i.file_name == "Flaky.sfc")
        .unwrap();
    assert_eq!(flaky.attempts, 4);
}

#[tokio::test]
async fn test_segmented_download_with_ranges() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let data: Vec<u8> = (0..100u8).collect();
    let transport = Arc::new(FakeTransport::new().ranged_file(&format!("{BASE}Big.sfc"), &data));
    let config = AcquireConfig {
        connections: Some(4),
        ..config()
    };

    let manifest = run(&transport, &cache, &config, vec![request("Big.sfc", None)]).await;

    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(transport.ranged_opens.load(Ordering::SeqCst), 4);
    assert_eq!(std::fs::read(cache.path_for("snes", "Big.sfc")).unwrap(), data);
}

#[tokio::test]
async fn test_single_stream_without_range_support() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Big.sfc"), &[7u8; 64]));
    let config = AcquireConfig {
        connections: Some(4),
        ..config()
    };

    let manifest = run(&transport, &cache, &config, vec![request("Big.sfc", None)]).await;

    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(transport.probes.load(Ordering::SeqCst), 1);
    assert_eq!(transport.ranged_opens.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stall_aborts_and_fails_everything_pending() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .hanging_file(&format!("{BASE}Stuck.sfc"), 16)
            .file(&format!("{BASE}Alpha.sfc"), b"alpha")
            .file(&format!("{BASE}Beta.sfc"), b"beta"),
    );
    let config = AcquireConfig {
        parallel: Some(1),
        ..config()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();

    let manifest = acquire(
        vec![
            request("Stuck.sfc", None),
            request("Alpha.sfc", None),
            request("Beta.sfc", None),
        ],
        cache.clone(),
        transport,
        &config,
        Some(tx),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(manifest.aborted, Some(AbortReason::Stalled));
    assert!(manifest.succeeded.is_empty());
    let mut failed: Vec<&str> = manifest.failed.iter().map(|i| i.file_name.as_str()).collect();
    failed.sort();
    assert_eq!(failed, vec!["Alpha.sfc", "Beta.sfc", "Stuck.sfc"]);

    let mut stalled = None;
    while let Ok(event) = rx.try_recv() {
        if let AcquireEvent::Stalled { pending } = event {
            stalled = Some(pending);
        }
    }
    assert_eq!(stalled, Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_slow_but_steady_download_completes() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    // Three 4-byte chunks, 50 s apart: well past the window in total
    let transport = Arc::new(FakeTransport::new().slow_file(
        &format!("{BASE}Slow.sfc"),
        b"slowslowslow",
        Duration::from_secs(50),
    ));

    let manifest = run(&transport, &cache, &config(), vec![request("Slow.sfc", Some(12))]).await;

    assert!(manifest.aborted.is_none());
    assert_eq!(manifest.succeeded.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_yields_partial_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(
        FakeTransport::new()
            .file(&format!("{BASE}Alpha.sfc"), b"alpha")
            .hanging_file(&format!("{BASE}Stuck.sfc"), 16),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let manifest = acquire(
        vec![request("Alpha.sfc", None), request("Stuck.sfc", None)],
        cache.clone(),
        transport,
        &config(),
        None,
        cancel,
    )
    .await
    .unwrap();

    assert_eq!(manifest.aborted, Some(AbortReason::Interrupted));
    assert_eq!(manifest.succeeded.len(), 1);
    assert_eq!(manifest.failed.len(), 1);
    assert_eq!(manifest.failed[0].file_name, "Stuck.sfc");
}

#[tokio::test]
async fn test_verifier_attaches_checksums() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Check.sfc"), b"123456789"));
    let mut req = request("Check.sfc", None);
    req.expected_crc32 = Some("CBF43926".into());

    let manifest = Downloader::new(transport, cache.clone(), config())
        .with_verifier(Arc::new(Crc32Verifier::new()))
        .acquire(vec![req], None, CancellationToken::new())
        .await
        .unwrap();

    let verification = manifest.succeeded[0].verification.clone().unwrap();
    assert_eq!(verification.crc32, "cbf43926");
    assert_eq!(verification.status, VerifyStatus::Matched);
    assert!(cache.entry("snes", "Check.sfc").unwrap().verified);
}

#[tokio::test]
async fn test_manifest_written_next_to_destination() {
    let dir = tempfile::tempdir().unwrap();
    let cache = open_cache(&dir);
    let transport = Arc::new(FakeTransport::new().file(&format!("{BASE}Alpha.sfc"), b"alpha"));
    let manifest = run(&transport, &cache, &config(), vec![request("Alpha.sfc", None)]).await;

    let dest = dir.path().join("library");
    let path = manifest.write(&dest).unwrap();
    assert_eq!(path, dest.join("manifest.json"));
    assert_eq!(Manifest::load(&path).unwrap(), manifest);
}
