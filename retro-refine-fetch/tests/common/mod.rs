//! In-memory [`Transport`] for crawler and downloader tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use url::Url;

use retro_refine_fetch::transport::ByteStream;
use retro_refine_fetch::{ByteRange, FetchError, Page, RemoteMeta, Transport};

struct FakePage {
    final_url: Url,
    body: String,
}

#[derive(Clone)]
struct FakeFile {
    data: Vec<u8>,
    ranges: bool,
    /// Every open yields nothing and never ends
    hang: bool,
    /// Pause before each chunk
    chunk_delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeTransport {
    pages: HashMap<String, FakePage>,
    files: HashMap<String, FakeFile>,
    /// Page URL → number of 503s still to serve before succeeding
    page_failures: Mutex<HashMap<String, u32>>,
    /// File URL → number of 503s still to serve before succeeding
    file_failures: Mutex<HashMap<String, u32>>,
    pub page_fetches: AtomicUsize,
    pub file_opens: AtomicUsize,
    pub ranged_opens: AtomicUsize,
    pub probes: AtomicUsize,
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, at: &str, body: &str) -> Self {
        self.redirected_page(at, at, body)
    }

    /// A page requested at `at` but served from `final_url`.
    pub fn redirected_page(mut self, at: &str, final_url: &str, body: &str) -> Self {
        self.pages.insert(
            at.to_string(),
            FakePage {
                final_url: url(final_url),
                body: body.to_string(),
            },
        );
        self
    }

    pub fn file(mut self, at: &str, data: &[u8]) -> Self {
        self.files.insert(
            at.to_string(),
            FakeFile {
                data: data.to_vec(),
                ranges: false,
                hang: false,
                chunk_delay: None,
            },
        );
        self
    }

    pub fn ranged_file(mut self, at: &str, data: &[u8]) -> Self {
        self = self.file(at, data);
        if let Some(f) = self.files.get_mut(at) {
            f.ranges = true;
        }
        self
    }

    pub fn hanging_file(mut self, at: &str, size: usize) -> Self {
        self = self.file(at, &vec![0u8; size]);
        if let Some(f) = self.files.get_mut(at) {
            f.hang = true;
        }
        self
    }

    pub fn slow_file(mut self, at: &str, data: &[u8], chunk_delay: Duration) -> Self {
        self = self.file(at, data);
        if let Some(f) = self.files.get_mut(at) {
            f.chunk_delay = Some(chunk_delay);
        }
        self
    }

    pub fn failing_page(self, at: &str, times: u32) -> Self {
        self.page_failures
            .lock()
            .unwrap()
            .insert(at.to_string(), times);
        self
    }

    pub fn failing_file(self, at: &str, times: u32) -> Self {
        self.file_failures
            .lock()
            .unwrap()
            .insert(at.to_string(), times);
        self
    }

    pub fn network_calls(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
            + self.file_opens.load(Ordering::SeqCst)
            + self.probes.load(Ordering::SeqCst)
    }

    fn take_failure(map: &Mutex<HashMap<String, u32>>, key: &str) -> bool {
        let mut map = map.lock().unwrap();
        match map.get_mut(key) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get_page(&self, url: &Url) -> Result<Page, FetchError> {
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.page_failures, url.as_str()) {
            return Err(FetchError::status(url.as_str(), 503));
        }
        match self.pages.get(url.as_str()) {
            Some(page) => Ok(Page {
                final_url: page.final_url.clone(),
                body: page.body.clone(),
            }),
            None => Err(FetchError::status(url.as_str(), 404)),
        }
    }

    async fn probe(&self, url: &Url) -> Result<RemoteMeta, FetchError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.files.get(url.as_str()) {
            Some(f) => Ok(RemoteMeta {
                len: Some(f.data.len() as u64),
                accepts_ranges: f.ranges,
            }),
            None => Err(FetchError::status(url.as_str(), 404)),
        }
    }

    async fn open(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteStream, FetchError> {
        self.file_opens.fetch_add(1, Ordering::SeqCst);
        if range.is_some() {
            self.ranged_opens.fetch_add(1, Ordering::SeqCst);
        }
        if Self::take_failure(&self.file_failures, url.as_str()) {
            return Err(FetchError::status(url.as_str(), 503));
        }
        let Some(file) = self.files.get(url.as_str()).cloned() else {
            return Err(FetchError::status(url.as_str(), 404));
        };
        if file.hang {
            return Ok(futures::stream::pending().boxed());
        }
        let data = match range {
            Some(_) if !file.ranges => return Err(FetchError::RangeIgnored(url.to_string())),
            Some(r) => file.data[r.start as usize..=r.end as usize].to_vec(),
            None => file.data,
        };
        let chunks: Vec<Bytes> = data.chunks(4).map(Bytes::copy_from_slice).collect();
        Ok(match file.chunk_delay {
            Some(delay) => futures::stream::iter(chunks)
                .then(move |chunk| async move {
                    tokio::time::sleep(delay).await;
                    Ok(chunk)
                })
                .boxed(),
            None => futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
        })
    }
}
