//! Drive an async operation while consuming its event channel.
//!
//! Frontends hand library operations (crawl, acquire) a sender and render
//! the events as they arrive; [`run_with_events`] owns that loop.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// How long to keep draining events after the task has finished. Senders
/// held by detached tasks would otherwise keep the channel open forever.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Common interface of bounded and unbounded tokio receivers.
#[allow(async_fn_in_trait)]
pub trait EventReceiver<E> {
    async fn recv(&mut self) -> Option<E>;
}

impl<E> EventReceiver<E> for mpsc::Receiver<E> {
    async fn recv(&mut self) -> Option<E> {
        mpsc::Receiver::recv(self).await
    }
}

impl<E> EventReceiver<E> for mpsc::UnboundedReceiver<E> {
    async fn recv(&mut self) -> Option<E> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Run `task` to completion, passing every event from `event_rx` to
/// `on_event`, then drain whatever is still queued.
pub async fn run_with_events<F, E, R, Rx>(
    task: F,
    mut event_rx: Rx,
    mut on_event: impl FnMut(E),
) -> R
where
    F: Future<Output = R>,
    Rx: EventReceiver<E> + Unpin,
{
    tokio::pin!(task);
    let mut handled: u64 = 0;

    let result = loop {
        tokio::select! {
            r = &mut task => break Some(r),
            event = event_rx.recv() => match event {
                Some(e) => {
                    handled += 1;
                    on_event(e);
                }
                None => break None,
            }
        }
    };

    let Some(result) = result else {
        log::debug!("event channel closed after {} events; awaiting task", handled);
        return task.await;
    };

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, event_rx.recv()).await {
            Ok(Some(e)) => {
                handled += 1;
                on_event(e);
            }
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "Stopped draining events after {}s; a sender was never dropped",
                    DRAIN_TIMEOUT.as_secs()
                );
                break;
            }
        }
    }
    log::debug!("task finished, {} events handled", handled);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_sent_before_completion_are_all_seen() {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = async move {
            for i in 0..5 {
                tx.send(i).unwrap();
            }
            "done"
        };
        let mut seen = Vec::new();
        let result = run_with_events(task, rx, |e| seen.push(e)).await;
        assert_eq!(result, "done");
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaked_sender_does_not_hang() {
        let (tx, rx) = mpsc::channel::<u32>(4);
        let _leaked = tx.clone();
        let task = async move {
            tx.send(1).await.unwrap();
            7
        };
        let mut count = 0;
        assert_eq!(run_with_events(task, rx, |_| count += 1).await, 7);
        assert_eq!(count, 1);
    }
}
