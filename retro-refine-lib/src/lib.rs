//! Local I/O and async plumbing shared by the retro-refine frontends:
//! configuration, the local scanner, the worker pool and the transfer
//! backend.

pub mod async_util;
pub mod config;
pub mod error;
pub mod progress;
pub mod scanner;
pub mod transfer;
pub mod worker_pool;

pub use async_util::run_with_events;
pub use config::{
    ConfigOverrides, RefineConfig, ResolvedConfig, SourceLocation, SourceSpec, config_path,
    default_cache_dir, write_default_config,
};
pub use error::ConfigError;
pub use progress::{AcquireEvent, ScanEvent};
pub use scanner::{LocalScan, ScanOptions};
pub use transfer::{TransferMode, TransferOutcome, destination_path, transfer};
pub use worker_pool::WorkerPool;
