//! Concurrent crawl of a remote directory tree.
//!
//! The [`CrawlStream`] is the coordinator: it owns the visited set and
//! hands directory URLs to a [`WorkerPool`] of listing fetchers, turning
//! their results into [`CandidateRef`]s as each directory completes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use retro_refine_core::{CandidateRef, Location, PlatformTable};
use retro_refine_lib::{ScanEvent, ScanOptions, WorkerPool};

use crate::error::FetchError;
use crate::listing::{Listing, dir_name_of, parse_listing};
use crate::transport::Transport;

/// Crawl tuning.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Listing fetches in flight at once
    pub workers: usize,
    /// Tries per listing page before the directory is skipped
    pub attempts: u32,
    /// Delay before the first retry, doubled for each further one
    pub retry_backoff: Duration,
    pub scan: ScanOptions,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            workers: retro_refine_lib::config::DEFAULT_CRAWL_WORKERS,
            attempts: 3,
            retry_backoff: Duration::from_millis(500),
            scan: ScanOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct DirJob {
    url: Url,
    is_root: bool,
    depth: usize,
    platform: Option<String>,
}

struct DirResult {
    job: DirJob,
    outcome: Result<Listing, FetchError>,
}

/// Crawls HTTP directory listings through a [`Transport`].
pub struct Crawler<T: Transport + ?Sized + 'static> {
    transport: Arc<T>,
    table: Arc<PlatformTable>,
    options: CrawlOptions,
}

impl<T: Transport + ?Sized + 'static> Crawler<T> {
    pub fn new(transport: Arc<T>, table: Arc<PlatformTable>, options: CrawlOptions) -> Self {
        Self {
            transport,
            table,
            options,
        }
    }

    /// Start crawling `root`. Nothing is fetched until the stream is polled.
    pub fn crawl(
        &self,
        source_id: impl Into<String>,
        root: Url,
        cancel: CancellationToken,
        events: Option<mpsc::UnboundedSender<ScanEvent>>,
    ) -> CrawlStream {
        let transport = self.transport.clone();
        let table = self.table.clone();
        let attempts = self.options.attempts.max(1);
        let backoff = self.options.retry_backoff;
        let worker_events = events.clone();

        let pool = WorkerPool::spawn(self.options.workers, cancel.child_token(), move |job: DirJob| {
            let transport = transport.clone();
            let table = table.clone();
            let events = worker_events.clone();
            async move {
                let outcome =
                    fetch_listing(&*transport, &table, &job.url, attempts, backoff, events.as_ref())
                        .await;
                DirResult { job, outcome }
            }
        });

        let mut visited = HashSet::new();
        visited.insert(root.clone());
        CrawlStream {
            pool,
            source_id: source_id.into(),
            table: self.table.clone(),
            scan: self.options.scan.clone(),
            pending: 0,
            queued: vec![DirJob {
                url: root,
                is_root: true,
                depth: 0,
                platform: None,
            }],
            visited,
            ready: VecDeque::new(),
            events,
            cancel,
        }
    }
}

async fn fetch_listing<T: Transport + ?Sized>(
    transport: &T,
    table: &PlatformTable,
    url: &Url,
    attempts: u32,
    backoff: Duration,
    events: Option<&mpsc::UnboundedSender<ScanEvent>>,
) -> Result<Listing, FetchError> {
    let mut attempt = 1;
    loop {
        match transport.get_page(url).await {
            Ok(page) => return Ok(parse_listing(&page.body, &page.final_url, table)),
            Err(e) if attempt < attempts && e.is_transient() => {
                log::debug!("Listing {} failed (attempt {}): {}", url, attempt, e);
                if let Some(tx) = events {
                    let _ = tx.send(ScanEvent::Retrying {
                        location: url.to_string(),
                        attempt,
                        message: e.to_string(),
                    });
                }
                tokio::time::sleep(backoff * 2u32.pow(attempt - 1)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Candidates from a running crawl, yielded as directories complete.
///
/// ```ignore
/// let mut stream = crawler.crawl("mirror", root, cancel, None);
/// while let Some(candidate) = stream.next().await {
///     candidates.push(candidate);
/// }
/// ```
pub struct CrawlStream {
    pool: WorkerPool<DirJob, DirResult>,
    source_id: String,
    table: Arc<PlatformTable>,
    scan: ScanOptions,
    /// Directories submitted whose result has not come back
    pending: usize,
    /// Directories found but not yet handed to the pool
    queued: Vec<DirJob>,
    /// Directory and file URLs already seen
    visited: HashSet<Url>,
    ready: VecDeque<CandidateRef>,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
    cancel: CancellationToken,
}

impl CrawlStream {
    pub async fn next(&mut self) -> Option<CandidateRef> {
        loop {
            if let Some(candidate) = self.ready.pop_front() {
                return Some(candidate);
            }
            for job in std::mem::take(&mut self.queued) {
                if self.pool.submit(job).await {
                    self.pending += 1;
                }
            }
            if self.pending == 0 {
                self.pool.close();
                return None;
            }

            let cancel = self.cancel.clone();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::debug!("Crawl of {} cancelled", self.source_id);
                    self.pending = 0;
                    self.pool.close();
                    return None;
                }
                result = self.pool.recv() => result?,
            };
            self.pending -= 1;
            self.absorb(result);
        }
    }

    /// Drain the whole crawl.
    pub async fn collect_all(mut self) -> Vec<CandidateRef> {
        let mut all = Vec::new();
        while let Some(candidate) = self.next().await {
            all.push(candidate);
        }
        all
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn absorb(&mut self, result: DirResult) {
        let DirResult { job, outcome } = result;
        let listing = match outcome {
            Ok(listing) => listing,
            Err(e) => {
                log::warn!("Skipping unreadable listing {}: {}", job.url, e);
                self.emit(ScanEvent::failed(job.url.as_str(), e.to_string()));
                return;
            }
        };

        let mut files = 0;
        for file in listing.files {
            // Files may live outside the listing that links them
            if !self.visited.insert(file.url.clone()) {
                continue;
            }
            let platform = job.platform.clone().or_else(|| {
                self.table
                    .platform_for_extension(&file.name)
                    .map(str::to_string)
            });
            let Some(platform) = platform else {
                log::debug!("No platform for {}, skipping", file.url);
                self.emit(ScanEvent::Unclassified {
                    location: file.url.to_string(),
                });
                continue;
            };
            if !self.scan.wants(&platform) {
                continue;
            }
            files += 1;
            self.ready.push_back(CandidateRef {
                source_id: self.source_id.clone(),
                platform,
                file_name: file.name,
                location: Location::Remote(file.url.to_string()),
                size_hint: file.size,
                size_exact: file.size_exact,
            });
        }

        let mut subdirs = 0;
        for url in listing.subdirs {
            if let Some(child) = self.child_job(&job, url) {
                subdirs += 1;
                self.queued.push(child);
            }
        }

        self.emit(ScanEvent::DirectoryListed {
            location: job.url.to_string(),
            files,
            subdirs,
        });
    }

    fn child_job(&mut self, parent: &DirJob, url: Url) -> Option<DirJob> {
        let depth = if parent.is_root && !self.scan.flat {
            0
        } else {
            parent.depth + 1
        };
        if depth > self.scan.max_depth {
            return None;
        }
        let name = dir_name_of(&url)?;
        if name.starts_with('_') || name.starts_with('.') {
            return None;
        }

        let platform = if self.scan.flat {
            None
        } else {
            match self.table.platform_for_folder(&name) {
                Some(p) => Some(p.to_string()),
                None => parent.platform.clone(),
            }
        };
        if let Some(p) = &platform
            && !self.scan.wants(p)
        {
            log::debug!("Skipping platform folder '{}' ({})", name, p);
            return None;
        }

        if !self.visited.insert(url.clone()) {
            return None;
        }
        Some(DirJob {
            url,
            is_root: false,
            depth,
            platform,
        })
    }
}
