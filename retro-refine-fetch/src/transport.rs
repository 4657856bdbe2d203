//! HTTP seam used by the crawler and the downloader.
//!
//! [`Transport`] is the only place network I/O happens, so tests can swap in
//! an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, RANGE};
use url::Url;

use crate::error::FetchError;

/// A fetched listing page.
#[derive(Debug, Clone)]
pub struct Page {
    /// URL after redirects; relative links resolve against this
    pub final_url: Url,
    pub body: String,
}

/// What a server reports about a file without sending it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteMeta {
    pub len: Option<u64>,
    pub accepts_ranges: bool,
}

/// Inclusive byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Split `0..total` into at most `parts` contiguous ranges.
    pub fn split(total: u64, parts: usize) -> Vec<ByteRange> {
        if total == 0 {
            return Vec::new();
        }
        let parts = (parts.max(1) as u64).min(total);
        let base = total / parts;
        let extra = total % parts;
        let mut start = 0;
        (0..parts)
            .map(|i| {
                let len = base + u64::from(i < extra);
                let range = ByteRange {
                    start,
                    end: start + len - 1,
                };
                start += len;
                range
            })
            .collect()
    }
}

pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch an HTML listing page.
    async fn get_page(&self, url: &Url) -> Result<Page, FetchError>;

    /// Ask for a file's size and range support.
    async fn probe(&self, url: &Url) -> Result<RemoteMeta, FetchError>;

    /// Stream a file, or one byte range of it.
    async fn open(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteStream, FetchError>;
}

/// [`Transport`] over reqwest.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("retro-refine/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http })
    }
}

fn check_status(resp: &reqwest::Response) -> Result<(), FetchError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::status(resp.url().as_str(), status.as_u16()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_page(&self, url: &Url) -> Result<Page, FetchError> {
        let resp = self.http.get(url.clone()).send().await?;
        check_status(&resp)?;
        let final_url = resp.url().clone();
        let body = resp.text().await?;
        Ok(Page { final_url, body })
    }

    async fn probe(&self, url: &Url) -> Result<RemoteMeta, FetchError> {
        let resp = self.http.head(url.clone()).send().await?;
        check_status(&resp)?;
        // Read the header directly; the body size hint of a HEAD response is 0
        let len = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let accepts_ranges = resp
            .headers()
            .get(ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("bytes"));
        Ok(RemoteMeta {
            len,
            accepts_ranges,
        })
    }

    async fn open(&self, url: &Url, range: Option<ByteRange>) -> Result<ByteStream, FetchError> {
        let mut request = self.http.get(url.clone());
        if let Some(r) = range {
            request = request.header(RANGE, format!("bytes={}-{}", r.start, r.end));
        }
        let resp = request.send().await?;
        check_status(&resp)?;
        if range.is_some() && resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
            return Err(FetchError::RangeIgnored(url.to_string()));
        }
        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(FetchError::from))
            .boxed())
    }
}
