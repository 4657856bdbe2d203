//! `refine`: scan every source, pick one release per game, then fetch and
//! place the winners. Without `--commit` it stops after reporting the
//! selection.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use retro_refine_catalog::{
    Canonicalizer, ParseContext, SelectionLog, SelectionResult, group_candidates,
    parse_candidate, select_all,
};
use retro_refine_core::util::format_bytes_approx;
use retro_refine_core::{CandidateRef, Location, OriginKind, ReleaseCandidate};
use retro_refine_fetch::{
    AbortReason, AcquireConfig, AcquireRequest, AcquisitionCache, CrawlOptions, Crawler,
    Crc32Verifier, Downloader, HttpTransport, Manifest, VerifyStatus,
};
use retro_refine_lib::{
    AcquireEvent, LocalScan, ResolvedConfig, ScanEvent, ScanOptions, SourceLocation, SourceSpec,
    TransferMode, TransferOutcome, run_with_events, transfer,
};

use super::config::load_config;
use crate::cli_types::RefineArgs;
use crate::error::CliError;
use crate::spinner::SpinnerPool;

pub(crate) async fn run_refine(
    args: RefineArgs,
    config: Option<&Path>,
    quiet: bool,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let mut settings = load_config(config)?;
    settings.apply(args.overrides());
    let resolved = settings.resolve()?;
    let transport = Arc::new(HttpTransport::new()?);

    print_header(&resolved);

    // Scan
    let found = scan_sources(&resolved, &transport, quiet, &cancel).await?;
    if cancel.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    if found.is_empty() {
        log::warn!("No candidate files found");
        return Ok(());
    }

    // Parse, group, select
    let mut decisions = SelectionLog::new();
    let parsed = parse_all(&resolved, found, &mut decisions);
    let groups = group_candidates(parsed);
    let results = select_all(&groups, &resolved.select);
    report_selection(&results, &mut decisions);

    let chosen: Vec<ReleaseCandidate> = results.into_iter().flat_map(|r| r.chosen).collect();
    let known_size: u64 = chosen.iter().filter_map(|c| c.size).sum();
    log::info!("");
    log::info!(
        "{} {} releases selected ({})",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        chosen.len(),
        format_bytes_approx(known_size),
    );

    if !resolved.raw.commit {
        log::info!(
            "{}",
            "Dry run: nothing was downloaded or placed. Pass --commit to apply."
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
        return Ok(());
    }
    let Some(dest) = resolved.raw.dest.clone() else {
        return Err(CliError::other("no destination configured"));
    };

    for path in decisions.write_to_dir(&dest)? {
        log::debug!("Wrote {}", path.display());
    }

    // Acquire remote winners; local winners are placed straight from their source
    let mut placements = Vec::new();
    let mut requests = Vec::new();
    for candidate in &chosen {
        match &candidate.location {
            Location::Local(path) => placements.push(Placement {
                source: path.clone(),
                platform: candidate.platform.clone(),
                file_name: candidate.raw_name.clone(),
                from_cache: false,
            }),
            Location::Remote(_) => {
                if let Some(request) = acquire_request(candidate) {
                    requests.push(request);
                }
            }
        }
    }

    if !requests.is_empty() {
        let manifest = acquire_remote(&resolved, transport, requests, quiet, &cancel).await?;
        let path = manifest.write(&dest)?;
        report_manifest(&manifest, &path);
        if manifest.aborted == Some(AbortReason::Interrupted) {
            return Err(CliError::Interrupted);
        }
        placements.extend(manifest.available().filter_map(|item| {
            item.path.as_ref().map(|path| Placement {
                source: path.clone(),
                platform: item.platform.clone(),
                file_name: item.file_name.clone(),
                from_cache: true,
            })
        }));
    }

    // Place
    let mode = resolved.raw.transfer_mode;
    let flat = resolved.raw.flat;
    let place_cancel = cancel.clone();
    let tally = tokio::task::spawn_blocking(move || {
        place_all(placements, &dest, mode, flat, &place_cancel)
    })
    .await
    .map_err(|e| CliError::runtime(format!("transfer task failed: {}", e)))?;

    log::info!(
        "{} {} placed, {} already present{}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        tally.placed,
        tally.present,
        if tally.failed > 0 {
            format!(
                ", {}",
                format!("{} failed", tally.failed).if_supports_color(Stdout, |t| t.red())
            )
        } else {
            String::new()
        },
    );

    if cancel.is_cancelled() {
        return Err(CliError::Interrupted);
    }
    Ok(())
}

fn print_header(resolved: &ResolvedConfig) {
    log::info!(
        "{}",
        "retro-refine".if_supports_color(Stdout, |t| t.bold()),
    );
    for source in &resolved.sources {
        let kind = match source.origin {
            OriginKind::Official => "",
            OriginKind::FanTranslation => " (translations)",
        };
        let location = match &source.location {
            SourceLocation::Local(path) => path.display().to_string(),
            SourceLocation::Remote(url) => url.to_string(),
        };
        log::info!(
            "  Source {}: {}{}",
            source.id.if_supports_color(Stdout, |t| t.bold()),
            location.if_supports_color(Stdout, |t| t.cyan()),
            kind.if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
    if !resolved.platforms.is_empty() {
        log::info!("  Platforms: {}", resolved.platforms.join(", "));
    }
    if let Some(dest) = &resolved.raw.dest {
        log::info!(
            "  Destination: {} ({})",
            dest.display().if_supports_color(Stdout, |t| t.cyan()),
            resolved.raw.transfer_mode,
        );
    }
    log::info!("");
}

// -- Scanning --

#[derive(Default)]
struct ScanCounts {
    directories: usize,
    files: usize,
    failed: usize,
}

async fn scan_sources(
    resolved: &ResolvedConfig,
    transport: &Arc<HttpTransport>,
    quiet: bool,
    cancel: &CancellationToken,
) -> Result<Vec<(CandidateRef, OriginKind)>, CliError> {
    let options = ScanOptions {
        flat: resolved.raw.flat,
        max_depth: resolved.raw.recursive_depth,
        platforms: resolved.platforms.clone(),
    };

    let mut all = Vec::new();
    for source in &resolved.sources {
        if cancel.is_cancelled() {
            break;
        }
        let mut pool: SpinnerPool<usize> = SpinnerPool::new(1, quiet);
        let mut counts = ScanCounts::default();
        let (tx, rx) = mpsc::unbounded_channel();
        pool.claim(0, format!("Scanning {}...", source.id));

        let found = match &source.location {
            SourceLocation::Local(root) => {
                let scan = LocalScan::new(
                    source.id.clone(),
                    root.clone(),
                    resolved.platform_table.clone(),
                    options.clone(),
                )
                .with_events(tx);
                let task = tokio::task::spawn_blocking(move || scan.collect::<Vec<_>>());
                run_with_events(task, rx, |e| on_scan_event(&pool, &mut counts, source, e))
                    .await
                    .map_err(|e| CliError::runtime(format!("scan task failed: {}", e)))?
            }
            SourceLocation::Remote(url) => {
                let crawler = Crawler::new(
                    transport.clone(),
                    resolved.platform_table.clone(),
                    CrawlOptions {
                        workers: resolved.raw.crawl_workers,
                        scan: options.clone(),
                        ..Default::default()
                    },
                );
                let stream = crawler.crawl(source.id.clone(), url.clone(), cancel.clone(), Some(tx));
                run_with_events(stream.collect_all(), rx, |e| {
                    on_scan_event(&pool, &mut counts, source, e)
                })
                .await
            }
        };
        pool.clear_all();

        let mark = if counts.failed > 0 {
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()).to_string()
        } else {
            "\u{2714}".if_supports_color(Stdout, |t| t.green()).to_string()
        };
        log::info!(
            "{} {}: {} files in {} directories{}",
            mark,
            source.id.if_supports_color(Stdout, |t| t.bold()),
            found.len(),
            counts.directories,
            if counts.failed > 0 {
                format!(", {} unreadable", counts.failed)
            } else {
                String::new()
            },
        );
        all.extend(found.into_iter().map(|c| (c, source.origin)));
    }
    Ok(all)
}

fn on_scan_event(
    pool: &SpinnerPool<usize>,
    counts: &mut ScanCounts,
    source: &SourceSpec,
    event: ScanEvent,
) {
    match event {
        ScanEvent::DirectoryListed { files, .. } => {
            counts.directories += 1;
            counts.files += files;
            pool.update(
                &0,
                format!(
                    "Scanning {}: {} directories, {} files",
                    source.id, counts.directories, counts.files
                ),
            );
        }
        ScanEvent::Retrying {
            location,
            attempt,
            message,
        } => {
            log::debug!("Retrying {} (attempt {}): {}", location, attempt, message);
        }
        ScanEvent::DirectoryFailed { location, message } => {
            counts.failed += 1;
            pool.println(|| {
                log::warn!(
                    "  {} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    location,
                    message,
                )
            });
        }
        ScanEvent::Unclassified { location } => {
            log::debug!("No platform for {}", location);
        }
    }
}

// -- Selection --

fn parse_all(
    resolved: &ResolvedConfig,
    found: Vec<(CandidateRef, OriginKind)>,
    decisions: &mut SelectionLog,
) -> Vec<ReleaseCandidate> {
    let mut canonicalizer = Canonicalizer::new(resolved.title_mappings.snapshot());
    let mut parsed = Vec::with_capacity(found.len());
    for (seq, (candidate, origin)) in found.into_iter().enumerate() {
        match parse_candidate(&candidate, ParseContext { origin, seq }, &mut canonicalizer) {
            Ok(release) => parsed.push(release),
            Err(e) => {
                log::warn!(
                    "  {} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    candidate.file_name,
                    e,
                );
                decisions.parse_failed(&candidate.platform, &candidate.file_name, e.to_string());
            }
        }
    }
    parsed
}

fn report_selection(results: &[SelectionResult], decisions: &mut SelectionLog) {
    for result in results {
        decisions.record(result);
        if result.is_skipped() {
            log::warn!(
                "  {} Skipped \"{}\" ({}): all {} candidates disqualified",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                result.canonical_title,
                result.platform,
                result.rejected.len(),
            );
            continue;
        }
        for chosen in &result.chosen {
            log::debug!("[{}] selected {}", result.platform, chosen.raw_name);
        }
        for rejection in &result.rejected {
            log::debug!(
                "[{}]   rejected {}: {}",
                result.platform,
                rejection.candidate.raw_name,
                rejection.reason
            );
        }
    }

    log::info!("");
    for platform in decisions.platforms() {
        let summary = decisions.summary(platform);
        log::info!(
            "  {} {} selected, {} rejected, {} skipped{}",
            format!("{platform}:").if_supports_color(Stdout, |t| t.bold()),
            summary.selected,
            summary.rejected,
            summary.skipped,
            if summary.parse_failed > 0 {
                format!(", {} unparseable", summary.parse_failed)
            } else {
                String::new()
            },
        );
    }
}

// -- Acquisition --

fn acquire_request(candidate: &ReleaseCandidate) -> Option<AcquireRequest> {
    let Location::Remote(url) = &candidate.location else {
        return None;
    };
    match Url::parse(url) {
        Ok(url) => Some(AcquireRequest {
            url,
            platform: candidate.platform.clone(),
            file_name: candidate.raw_name.clone(),
            size_hint: candidate.size,
            size_exact: candidate.size_exact,
            expected_crc32: candidate.checksum.clone(),
        }),
        Err(e) => {
            log::warn!("Skipping {}: bad URL {}: {}", candidate.raw_name, url, e);
            None
        }
    }
}

/// Terminal state of a running download batch.
struct DownloadView {
    quiet: bool,
    pool: Option<SpinnerPool<String>>,
    /// Bytes received per file in the current attempt
    received: HashMap<String, u64>,
    /// Files whose size was not known when the bar was sized
    r#unsized: HashSet<String>,
}

impl DownloadView {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            pool: None,
            received: HashMap::new(),
            r#unsized: HashSet::new(),
        }
    }

    fn println(&self, line: impl FnOnce()) {
        match &self.pool {
            Some(pool) => pool.println(line),
            None => line(),
        }
    }

    fn on_event(&mut self, event: AcquireEvent) {
        match event {
            AcquireEvent::BatchStarted {
                total,
                cached,
                parallel,
                connections,
                total_bytes,
            } => {
                log::info!("");
                log::info!(
                    "Downloading {} files ({} cached) with {} in parallel, {} connections each",
                    total - cached,
                    cached,
                    parallel,
                    connections,
                );
                self.pool = Some(SpinnerPool::new(parallel, self.quiet).with_total_bar(total_bytes));
            }
            AcquireEvent::CacheHit { file } => log::debug!("Cached: {}", file),
            AcquireEvent::Started { file, size } => {
                if size.is_none() {
                    self.r#unsized.insert(file.clone());
                }
                self.received.insert(file.clone(), 0);
                if let Some(pool) = &mut self.pool {
                    pool.claim(file.clone(), file);
                }
            }
            AcquireEvent::Bytes { file, bytes } => {
                *self.received.entry(file).or_default() += bytes;
                if let Some(pool) = &self.pool {
                    pool.add_bytes(bytes);
                }
            }
            AcquireEvent::Retrying {
                file,
                attempt,
                message,
            } => {
                log::debug!("Retrying {} (attempt {}): {}", file, attempt, message);
                // The next attempt starts over; keep the bar honest
                let partial = self.received.insert(file.clone(), 0).unwrap_or(0);
                if let Some(pool) = &self.pool {
                    pool.add_length(partial);
                    pool.update(&file, format!("{} (retry {})", file, attempt));
                }
            }
            AcquireEvent::Finished { file, bytes } => {
                if let Some(pool) = &mut self.pool {
                    if self.r#unsized.remove(&file) {
                        pool.add_length(bytes);
                    }
                    pool.release(&file);
                }
                self.println(|| {
                    log::info!(
                        "  {} {} ({})",
                        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
                        file,
                        format_bytes_approx(bytes),
                    )
                });
            }
            AcquireEvent::Failed { file, message } => {
                if let Some(pool) = &mut self.pool {
                    pool.release(&file);
                }
                self.println(|| {
                    log::warn!(
                        "  {} {}: {}",
                        "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                        file,
                        message,
                    )
                });
            }
            AcquireEvent::Stalled { pending } => {
                if let Some(pool) = &self.pool {
                    pool.set_total_message("stalled".to_string());
                }
                self.println(|| {
                    log::warn!(
                        "  {} No progress for 60s; aborting {} unfinished downloads",
                        "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                        pending,
                    )
                });
            }
        }
    }

    fn finish(&mut self) {
        if let Some(pool) = &mut self.pool {
            pool.clear_all();
        }
    }
}

async fn acquire_remote(
    resolved: &ResolvedConfig,
    transport: Arc<HttpTransport>,
    requests: Vec<AcquireRequest>,
    quiet: bool,
    cancel: &CancellationToken,
) -> Result<Manifest, CliError> {
    let cache = Arc::new(AcquisitionCache::open(&resolved.cache_dir)?);
    log::debug!("Cache: {}", cache.root().display());
    let config = AcquireConfig {
        parallel: resolved.raw.parallel,
        connections: resolved.raw.connections,
        ..Default::default()
    };
    let downloader =
        Downloader::new(transport, cache, config).with_verifier(Arc::new(Crc32Verifier::new()));

    let (tx, rx) = mpsc::unbounded_channel();
    let mut view = DownloadView::new(quiet);
    let manifest = run_with_events(
        downloader.acquire(requests, Some(tx), cancel.clone()),
        rx,
        |e| view.on_event(e),
    )
    .await;
    view.finish();
    Ok(manifest?)
}

fn report_manifest(manifest: &Manifest, path: &Path) {
    log::info!(
        "{} {} downloaded, {} already cached{}",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        manifest.succeeded.len(),
        manifest.skipped.len(),
        if manifest.failed.is_empty() {
            String::new()
        } else {
            format!(
                ", {}",
                format!("{} failed", manifest.failed.len()).if_supports_color(Stdout, |t| t.red())
            )
        },
    );
    for item in &manifest.succeeded {
        if let Some(verification) = &item.verification
            && let VerifyStatus::Mismatched { expected } = &verification.status
        {
            log::warn!(
                "  {} {}: crc32 {} does not match catalog {}",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                item.file_name,
                verification.crc32,
                expected,
            );
        }
    }
    if let Some(reason) = manifest.aborted {
        log::warn!(
            "  {} Batch {}; {} items did not finish",
            "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
            reason,
            manifest.failed.len(),
        );
    }
    log::info!(
        "  Manifest: {}",
        path.display().if_supports_color(Stdout, |t| t.dimmed()),
    );
}

// -- Placement --

struct Placement {
    source: PathBuf,
    platform: String,
    file_name: String,
    /// Lives in the acquisition cache, which must keep its copy
    from_cache: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct PlaceTally {
    placed: usize,
    present: usize,
    failed: usize,
}

fn place_all(
    placements: Vec<Placement>,
    dest: &Path,
    mode: TransferMode,
    flat: bool,
    cancel: &CancellationToken,
) -> PlaceTally {
    let mut tally = PlaceTally::default();
    for p in placements {
        if cancel.is_cancelled() {
            break;
        }
        let mode = match mode {
            TransferMode::Move if p.from_cache => TransferMode::Copy,
            m => m,
        };
        match transfer(&p.source, dest, &p.platform, &p.file_name, mode, flat) {
            Ok(TransferOutcome::Placed(path)) => {
                log::debug!("Placed {}", path.display());
                tally.placed += 1;
            }
            Ok(TransferOutcome::AlreadyPresent(_)) => tally.present += 1,
            Err(e) => {
                log::warn!(
                    "  {} {}: {}",
                    "\u{2718}".if_supports_color(Stdout, |t| t.red()),
                    p.file_name,
                    e,
                );
                tally.failed += 1;
            }
        }
    }
    tally
}

#[cfg(test)]
#[path = "../tests/refine_tests.rs"]
mod tests;
