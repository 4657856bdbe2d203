//! Bounded-concurrency acquisition of selected files into the cache.
//!
//! [`Downloader::acquire`] is the coordinator. It settles cache hits up
//! front, hands the misses to a [`WorkerPool`], collects one report per
//! task and assembles the [`Manifest`]. A separate watchdog task aborts the
//! batch by cancelling its token when progress stops.

use std::collections::HashSet;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use retro_refine_lib::{AcquireEvent, WorkerPool};

use crate::cache::AcquisitionCache;
use crate::error::{CacheError, FetchError};
use crate::manifest::{AbortReason, Manifest, ManifestItem};
use crate::transport::{ByteRange, RemoteMeta, Transport};
use crate::util::timestamp_now;
use crate::verify::{Verification, Verifier};
use crate::watchdog::{self, Progress};

const MIB: u64 = 1024 * 1024;

/// One file to acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub url: Url,
    pub platform: String,
    pub file_name: String,
    /// Size from the listing, used for tuning and progress
    pub size_hint: Option<u64>,
    /// `size_hint` is a byte count a cached copy must match
    pub size_exact: bool,
    pub expected_crc32: Option<String>,
}

impl AcquireRequest {
    /// Size a cached copy is checked against.
    fn remote_size(&self) -> Option<u64> {
        self.size_hint.filter(|_| self.size_exact)
    }
}

#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Files downloaded at once; `None` tunes from the batch
    pub parallel: Option<usize>,
    /// Connections per file; `None` tunes from the batch
    pub connections: Option<usize>,
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry, doubled for each further one
    pub retry_backoff: Duration,
    /// How long the batch may go without progress before it is aborted
    pub stall_window: Duration,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            parallel: None,
            connections: None,
            retries: 3,
            retry_backoff: Duration::from_secs(1),
            stall_window: Duration::from_secs(60),
        }
    }
}

/// Pick (files in parallel, connections per file) from the median known
/// size of the batch.
pub fn tune(sizes: &[Option<u64>]) -> (usize, usize) {
    let mut known: Vec<u64> = sizes.iter().flatten().copied().collect();
    if known.is_empty() {
        return (4, 2);
    }
    known.sort_unstable();
    let median = known[known.len() / 2];
    if median < 8 * MIB {
        (8, 1)
    } else if median < 128 * MIB {
        (4, 4)
    } else {
        (2, 8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Active,
    Done,
    Failed,
}

/// Downloader-side state of one cache miss.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub id: usize,
    pub request: AcquireRequest,
    pub dest_path: PathBuf,
    pub attempts: u32,
    pub status: TaskStatus,
    pub error: Option<String>,
}

impl DownloadTask {
    fn manifest_item(&self, bytes: u64, verification: Option<Verification>) -> ManifestItem {
        let done = self.status == TaskStatus::Done;
        ManifestItem {
            platform: self.request.platform.clone(),
            file_name: self.request.file_name.clone(),
            url: self.request.url.to_string(),
            path: done.then(|| self.dest_path.clone()),
            bytes,
            attempts: self.attempts,
            error: self.error.clone(),
            verification,
        }
    }
}

struct Job {
    id: usize,
    request: AcquireRequest,
    dest_path: PathBuf,
}

enum Report {
    Started(usize),
    Finished {
        id: usize,
        attempts: u32,
        outcome: Result<(u64, Option<Verification>), FetchError>,
    },
}

/// Shared by every worker of one batch.
struct WorkerContext<T: Transport + ?Sized> {
    transport: Arc<T>,
    cache: Arc<AcquisitionCache>,
    verifier: Option<Arc<dyn Verifier>>,
    progress: Arc<Progress>,
    events: Option<mpsc::UnboundedSender<AcquireEvent>>,
    started: mpsc::UnboundedSender<usize>,
    connections: usize,
    retries: u32,
    backoff: Duration,
}

impl<T: Transport + ?Sized> WorkerContext<T> {
    fn emit(&self, event: AcquireEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn add_bytes(&self, file: &str, n: u64) {
        self.progress.add_bytes(n);
        self.emit(AcquireEvent::Bytes {
            file: file.to_string(),
            bytes: n,
        });
    }
}

pub struct Downloader<T: Transport + ?Sized + 'static> {
    transport: Arc<T>,
    cache: Arc<AcquisitionCache>,
    config: AcquireConfig,
    verifier: Option<Arc<dyn Verifier>>,
}

impl<T: Transport + ?Sized + 'static> Downloader<T> {
    pub fn new(transport: Arc<T>, cache: Arc<AcquisitionCache>, config: AcquireConfig) -> Self {
        Self {
            transport,
            cache,
            config,
            verifier: None,
        }
    }

    /// Checksum every finished download. Results are advisory.
    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Acquire `requests` into the cache.
    ///
    /// Only cache errors are returned; per-file failures, a watchdog stall
    /// and cancellation all end up in the manifest.
    pub async fn acquire(
        &self,
        requests: Vec<AcquireRequest>,
        events: Option<mpsc::UnboundedSender<AcquireEvent>>,
        cancel: CancellationToken,
    ) -> Result<Manifest, CacheError> {
        let emit = |event: AcquireEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };
        let mut manifest = Manifest {
            started: timestamp_now(),
            ..Default::default()
        };

        let swept = self.cache.sweep_partials()?;
        if swept > 0 {
            log::info!("Removed {} partial download(s) from an earlier run", swept);
        }

        let mut tasks: Vec<DownloadTask> = Vec::new();
        let mut seen = HashSet::new();
        for request in requests {
            let dest_path = self.cache.path_for(&request.platform, &request.file_name);
            if !seen.insert(dest_path.clone()) {
                log::debug!("Ignoring duplicate request for {}", dest_path.display());
                continue;
            }
            let hit = self.cache.lookup(
                &request.platform,
                &request.file_name,
                request.remote_size(),
            )?;
            match hit {
                Some(path) => {
                    log::debug!("Cache hit: {}", path.display());
                    emit(AcquireEvent::CacheHit {
                        file: request.file_name.clone(),
                    });
                    let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                    manifest.skipped.push(ManifestItem {
                        platform: request.platform,
                        file_name: request.file_name,
                        url: request.url.to_string(),
                        path: Some(path),
                        bytes,
                        attempts: 0,
                        error: None,
                        verification: None,
                    });
                }
                None => tasks.push(DownloadTask {
                    id: tasks.len(),
                    request,
                    dest_path,
                    attempts: 0,
                    status: TaskStatus::Queued,
                    error: None,
                }),
            }
        }

        let sizes: Vec<Option<u64>> = tasks.iter().map(|t| t.request.size_hint).collect();
        let (auto_parallel, auto_connections) = tune(&sizes);
        let parallel = self.config.parallel.unwrap_or(auto_parallel).max(1);
        let connections = self.config.connections.unwrap_or(auto_connections).max(1);
        emit(AcquireEvent::BatchStarted {
            total: tasks.len() + manifest.skipped.len(),
            cached: manifest.skipped.len(),
            parallel,
            connections,
            total_bytes: sizes.iter().flatten().sum(),
        });

        if tasks.is_empty() {
            manifest.finished = timestamp_now();
            return Ok(manifest);
        }
        log::info!(
            "Downloading {} file(s), {} at a time, {} connection(s) each",
            tasks.len(),
            parallel,
            connections
        );

        let batch = cancel.child_token();
        let progress = Arc::new(Progress::default());
        let watchdog_done = CancellationToken::new();
        let watchdog = tokio::spawn(watchdog::watch(
            progress.clone(),
            self.config.stall_window,
            batch.clone(),
            watchdog_done.clone(),
        ));

        let (started_tx, mut started_rx) = mpsc::unbounded_channel();
        let ctx = Arc::new(WorkerContext {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            verifier: self.verifier.clone(),
            progress: progress.clone(),
            events: events.clone(),
            started: started_tx,
            connections,
            retries: self.config.retries,
            backoff: self.config.retry_backoff,
        });
        let jobs = tasks
            .iter()
            .map(|t| Job {
                id: t.id,
                request: t.request.clone(),
                dest_path: t.dest_path.clone(),
            })
            .collect();
        let mut pool = WorkerPool::start(parallel, jobs, batch.clone(), move |job: Job| {
            let ctx = ctx.clone();
            async move { run_job(&ctx, job).await }
        });

        let mut bytes_done = vec![0u64; tasks.len()];
        let mut verifications: Vec<Option<Verification>> = vec![None; tasks.len()];
        loop {
            let report = tokio::select! {
                Some(id) = started_rx.recv() => Report::Started(id),
                next = pool.recv() => match next {
                    Some(report) => report,
                    None => break,
                },
            };
            match report {
                Report::Started(id) => {
                    if tasks[id].status == TaskStatus::Queued {
                        tasks[id].status = TaskStatus::Active;
                    }
                }
                Report::Finished {
                    id,
                    attempts,
                    outcome,
                } => {
                    let task = &mut tasks[id];
                    task.attempts = attempts;
                    match outcome {
                        Ok((bytes, verification)) => {
                            task.status = TaskStatus::Done;
                            bytes_done[id] = bytes;
                            verifications[id] = verification;
                        }
                        Err(e) => {
                            task.status = TaskStatus::Failed;
                            task.error = Some(e.to_string());
                        }
                    }
                }
            }
        }

        while let Ok(id) = started_rx.try_recv() {
            if tasks[id].status == TaskStatus::Queued {
                tasks[id].status = TaskStatus::Active;
            }
        }
        watchdog_done.cancel();
        let stalled = watchdog.await.unwrap_or(false);

        let incomplete = tasks
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Queued | TaskStatus::Active))
            .count();
        if incomplete > 0 {
            let reason = if stalled {
                AbortReason::Stalled
            } else {
                AbortReason::Interrupted
            };
            log::warn!("Download batch {}: {} item(s) unfinished", reason, incomplete);
            if stalled {
                emit(AcquireEvent::Stalled {
                    pending: incomplete,
                });
            }
            manifest.aborted = Some(reason);
            for task in &mut tasks {
                let message = match task.status {
                    TaskStatus::Queued => format!("{reason} before starting"),
                    TaskStatus::Active => format!("{reason} while downloading"),
                    _ => continue,
                };
                task.status = TaskStatus::Failed;
                emit(AcquireEvent::failed(&task.request.file_name, &message));
                task.error = Some(message);
            }
        }

        for (task, verification) in tasks.iter().zip(verifications) {
            let item = task.manifest_item(bytes_done[task.id], verification);
            match task.status {
                TaskStatus::Done => manifest.succeeded.push(item),
                _ => manifest.failed.push(item),
            }
        }
        manifest.finished = timestamp_now();
        log::info!(
            "Acquired {} file(s), {} cached, {} failed",
            manifest.succeeded.len(),
            manifest.skipped.len(),
            manifest.failed.len()
        );
        Ok(manifest)
    }
}

/// Shorthand for a one-off batch without a verifier.
pub async fn acquire<T: Transport + ?Sized + 'static>(
    requests: Vec<AcquireRequest>,
    cache: Arc<AcquisitionCache>,
    transport: Arc<T>,
    config: &AcquireConfig,
    events: Option<mpsc::UnboundedSender<AcquireEvent>>,
    cancel: CancellationToken,
) -> Result<Manifest, CacheError> {
    Downloader::new(transport, cache, config.clone())
        .acquire(requests, events, cancel)
        .await
}

async fn run_job<T: Transport + ?Sized>(ctx: &WorkerContext<T>, job: Job) -> Report {
    let _ = ctx.started.send(job.id);
    let file = job.request.file_name.clone();
    ctx.emit(AcquireEvent::Started {
        file: file.clone(),
        size: job.request.size_hint,
    });

    let (attempts, result) = download_with_retries(ctx, &job).await;
    let outcome = match result {
        Ok(bytes) => finish(ctx, &job, bytes).await,
        Err(e) => Err(e),
    };

    match &outcome {
        Ok((bytes, _)) => {
            log::debug!("Downloaded {} ({} bytes)", file, bytes);
            ctx.emit(AcquireEvent::Finished {
                file,
                bytes: *bytes,
            });
        }
        Err(e) => {
            log::warn!("Failed to download {}: {}", job.request.url, e);
            ctx.emit(AcquireEvent::failed(file, e.to_string()));
        }
    }
    ctx.progress.complete();
    Report::Finished {
        id: job.id,
        attempts,
        outcome,
    }
}

/// Download to the `.part` path, retrying transient failures.
async fn download_with_retries<T: Transport + ?Sized>(
    ctx: &WorkerContext<T>,
    job: &Job,
) -> (u32, Result<u64, FetchError>) {
    let request = &job.request;
    let part = ctx.cache.part_path_for(&request.platform, &request.file_name);
    if let Some(parent) = part.parent()
        && let Err(e) = tokio::fs::create_dir_all(parent).await
    {
        return (0, Err(e.into()));
    }

    let meta = if ctx.connections > 1 {
        match ctx.transport.probe(&request.url).await {
            Ok(meta) => meta,
            Err(e) => {
                log::debug!("Probe of {} failed: {}", request.url, e);
                RemoteMeta::default()
            }
        }
    } else {
        RemoteMeta::default()
    };
    // Only a server-reported length is binding; listing sizes are advisory
    let expected = meta.len;
    let mut segmented = ctx.connections > 1 && meta.accepts_ranges && meta.len.is_some();

    let max_attempts = ctx.retries + 1;
    let mut attempt = 1;
    loop {
        let result = match (segmented, meta.len) {
            (true, Some(len)) => download_segments(ctx, request, &part, len).await,
            _ => download_single(ctx, request, &part).await,
        };
        let result = result.and_then(|written| match expected {
            Some(expected) if expected != written => Err(FetchError::SizeMismatch {
                expected,
                actual: written,
            }),
            _ => Ok(written),
        });

        match result {
            Ok(written) => {
                if let Some(listed) = request.remote_size()
                    && listed != written
                {
                    log::warn!(
                        "{}: listing reported {} bytes, received {}",
                        request.file_name,
                        listed,
                        written
                    );
                }
                return (attempt, Ok(written));
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                if matches!(e, FetchError::RangeIgnored(_)) {
                    log::debug!("{}; falling back to a single stream", e);
                    segmented = false;
                }
                if attempt >= max_attempts || !e.is_transient() {
                    return (attempt, Err(e));
                }
                log::debug!(
                    "Attempt {} for {} failed: {}",
                    attempt,
                    request.file_name,
                    e
                );
                ctx.emit(AcquireEvent::Retrying {
                    file: request.file_name.clone(),
                    attempt,
                    message: e.to_string(),
                });
                tokio::time::sleep(ctx.backoff * 2u32.pow(attempt - 1)).await;
                attempt += 1;
            }
        }
    }
}

async fn download_single<T: Transport + ?Sized>(
    ctx: &WorkerContext<T>,
    request: &AcquireRequest,
    part: &Path,
) -> Result<u64, FetchError> {
    let mut stream = ctx.transport.open(&request.url, None).await?;
    let mut file = tokio::fs::File::create(part).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        ctx.add_bytes(&request.file_name, chunk.len() as u64);
    }
    file.flush().await?;
    Ok(written)
}

async fn download_segments<T: Transport + ?Sized>(
    ctx: &WorkerContext<T>,
    request: &AcquireRequest,
    part: &Path,
    len: u64,
) -> Result<u64, FetchError> {
    let file = tokio::fs::File::create(part).await?;
    file.set_len(len).await?;
    drop(file);

    let segments = ByteRange::split(len, ctx.connections)
        .into_iter()
        .map(|range| download_segment(ctx, request, part, range));
    let written = futures::future::try_join_all(segments).await?;
    Ok(written.into_iter().sum())
}

async fn download_segment<T: Transport + ?Sized>(
    ctx: &WorkerContext<T>,
    request: &AcquireRequest,
    part: &Path,
    range: ByteRange,
) -> Result<u64, FetchError> {
    let mut stream = ctx.transport.open(&request.url, Some(range)).await?;
    let mut file = tokio::fs::OpenOptions::new().write(true).open(part).await?;
    file.seek(SeekFrom::Start(range.start)).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if written + chunk.len() as u64 > range.len() {
            return Err(FetchError::SizeMismatch {
                expected: range.len(),
                actual: written + chunk.len() as u64,
            });
        }
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
        ctx.add_bytes(&request.file_name, chunk.len() as u64);
    }
    file.flush().await?;
    if written != range.len() {
        return Err(FetchError::SizeMismatch {
            expected: range.len(),
            actual: written,
        });
    }
    Ok(written)
}

/// Move the finished `.part` into place, verify it and record it.
async fn finish<T: Transport + ?Sized>(
    ctx: &WorkerContext<T>,
    job: &Job,
    bytes: u64,
) -> Result<(u64, Option<Verification>), FetchError> {
    let request = &job.request;
    let part = ctx.cache.part_path_for(&request.platform, &request.file_name);
    tokio::fs::rename(&part, &job.dest_path).await?;

    let verification = match &ctx.verifier {
        Some(verifier) => {
            let verifier = verifier.clone();
            let path = job.dest_path.clone();
            let name = request.file_name.clone();
            let expected = request.expected_crc32.clone();
            let result = tokio::task::spawn_blocking(move || {
                verifier.verify(&path, &name, expected.as_deref())
            })
            .await;
            match result {
                Ok(Ok(v)) => {
                    log::debug!("{}: crc32 {} ({:?})", request.file_name, v.crc32, v.status);
                    Some(v)
                }
                Ok(Err(e)) => {
                    log::warn!("Could not verify {}: {}", job.dest_path.display(), e);
                    None
                }
                Err(e) => {
                    log::warn!("Verification of {} panicked: {}", request.file_name, e);
                    None
                }
            }
        }
        None => None,
    };

    let crc32 = verification.as_ref().map(|v| v.crc32.clone());
    ctx.cache
        .record(&request.platform, &request.file_name, bytes, crc32)
        .map_err(|e| FetchError::other(format!("cache index: {e}")))?;
    Ok((bytes, verification))
}
