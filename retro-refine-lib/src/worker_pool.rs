//! Fixed-size worker pool with backpressure and cancellation.
//!
//! N persistent tokio tasks pull work items from an `async-channel` queue;
//! its `Receiver` is `Clone`, so every worker holds its own handle and no
//! worker can starve the others by holding a lock across `recv()`. Results
//! go to an unbounded tokio channel drained by the caller.
//!
//! Two ways to feed it:
//! - [`WorkerPool::start`] takes a fixed batch (downloads).
//! - [`WorkerPool::spawn`] + [`WorkerPool::submit`] lets the caller add work
//!   as results come in (the directory crawl discovers subdirectories while
//!   it runs).

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A pool of worker tasks that process items concurrently.
///
/// ```ignore
/// let mut pool = WorkerPool::start(4, items, cancel.clone(), |item| async move {
///     process(item).await
/// });
/// while let Some(result) = pool.recv().await {
///     handle(result);
/// }
/// ```
pub struct WorkerPool<W: Send + 'static, R: Send + 'static> {
    work_tx: Option<async_channel::Sender<W>>,
    result_rx: mpsc::UnboundedReceiver<R>,
    cancel: CancellationToken,
    _handles: Vec<JoinHandle<()>>,
}

impl<W: Send + 'static, R: Send + 'static> WorkerPool<W, R> {
    /// Spawn `n` idle workers. Feed them with [`submit`](Self::submit) and
    /// call [`close`](Self::close) once no more work will come.
    ///
    /// When `cancel` fires, workers stop taking new items and drop the item
    /// in progress.
    pub fn spawn<F, Fut>(n: usize, cancel: CancellationToken, process_fn: F) -> Self
    where
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self::with_queue(n, async_channel::unbounded(), cancel, process_fn)
    }

    /// Spawn `n` workers and submit every item in `items`.
    ///
    /// Items go through a queue of capacity `n` from a background task, so
    /// the caller can start receiving right away.
    pub fn start<F, Fut>(
        n: usize,
        items: Vec<W>,
        cancel: CancellationToken,
        process_fn: F,
    ) -> Self
    where
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let mut pool = Self::with_queue(n, async_channel::bounded(n.max(1)), cancel, process_fn);
        if let Some(work_tx) = pool.work_tx.take() {
            tokio::spawn(async move {
                for item in items {
                    if work_tx.send(item).await.is_err() {
                        break;
                    }
                }
                // work_tx dropped: workers drain what is queued, then exit
            });
        }
        pool
    }

    fn with_queue<F, Fut>(
        n: usize,
        (work_tx, work_rx): (async_channel::Sender<W>, async_channel::Receiver<W>),
        cancel: CancellationToken,
        process_fn: F,
    ) -> Self
    where
        F: Fn(W) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::unbounded_channel::<R>();
        let process_fn = Arc::new(process_fn);

        let handles = (0..n.max(1))
            .map(|id| {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let process_fn = process_fn.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    loop {
                        let item = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            item = work_rx.recv() => match item {
                                Ok(item) => item,
                                Err(_) => break,
                            },
                        };
                        let result = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            r = process_fn(item) => r,
                        };
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                    log::trace!("worker {} exiting", id);
                })
            })
            .collect();

        Self {
            work_tx: Some(work_tx),
            result_rx,
            cancel,
            _handles: handles,
        }
    }

    /// Queue one more item. Returns `false` once the pool is closed or
    /// cancelled.
    pub async fn submit(&self, item: W) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match &self.work_tx {
            Some(tx) => tx.send(item).await.is_ok(),
            None => false,
        }
    }

    /// Stop accepting work. Queued items are still processed.
    pub fn close(&mut self) {
        self.work_tx = None;
    }

    /// Next result, or `None` once the pool is closed and every worker has
    /// exited.
    pub async fn recv(&mut self) -> Option<R> {
        self.result_rx.recv().await
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
