//! Network half of retro-refine: HTTP listing crawl, the acquisition cache
//! and the downloader that fills it.

pub mod cache;
pub mod crawl;
pub mod download;
pub mod error;
pub mod listing;
pub mod manifest;
pub mod transport;
pub mod verify;
pub mod watchdog;

mod util;

pub use cache::{AcquisitionCache, CacheEntry};
pub use crawl::{CrawlOptions, CrawlStream, Crawler};
pub use download::{
    AcquireConfig, AcquireRequest, DownloadTask, Downloader, TaskStatus, acquire, tune,
};
pub use error::{CacheError, FetchError};
pub use listing::{Listing, RemoteFile, parse_listing, parse_size};
pub use manifest::{AbortReason, Manifest, ManifestItem};
pub use transport::{ByteRange, HttpTransport, Page, RemoteMeta, Transport};
pub use verify::{Crc32Verifier, Verification, Verifier, VerifyStatus};
