//! Stall detection for a download batch.
//!
//! The watchdog only reads the shared [`Progress`] counters and only acts by
//! cancelling the batch token; workers never look at it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Counters shared between download workers and the watchdog.
#[derive(Debug, Default)]
pub struct Progress {
    bytes: AtomicU64,
    completed: AtomicUsize,
}

impl Progress {
    pub fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Count a finished item, successful or not.
    pub fn complete(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> (u64, usize) {
        (self.bytes(), self.completed())
    }
}

/// Watch `progress` until `done` fires. If neither a byte nor a completion
/// arrives for a full `window`, cancel `batch` and return `true`.
pub async fn watch(
    progress: Arc<Progress>,
    window: Duration,
    batch: CancellationToken,
    done: CancellationToken,
) -> bool {
    let mut interval = tokio::time::interval(TICK.min(window));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = progress.snapshot();
    let mut last_progress = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = done.cancelled() => return false,
            _ = batch.cancelled() => return false,
            _ = interval.tick() => {}
        }
        let now = progress.snapshot();
        if now != last {
            last = now;
            last_progress = Instant::now();
            continue;
        }
        if last_progress.elapsed() >= window {
            log::warn!(
                "No download progress for {}s; aborting batch",
                window.as_secs()
            );
            batch.cancel();
            return true;
        }
    }
}
