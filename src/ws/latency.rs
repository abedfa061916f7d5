//! Simulated network latency as a timer-scheduled delivery queue
//!
//! Each item is stamped with its delivery deadline at enqueue time and a
//! relay task sleeps until that deadline before forwarding it. The delay is
//! fixed, so FIFO channel order is preserved. One relay per direction per
//! connection keeps a slow or idle connection from delaying any other.
//! Dropping either end of the line cancels everything still in flight.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// Sending half of a delay line. Stamps the delivery deadline when the
/// item is enqueued, not when the relay picks it up.
#[derive(Clone)]
pub struct DelayedSender<T> {
    delay: Duration,
    tx: mpsc::Sender<(Instant, T)>,
}

impl<T> DelayedSender<T> {
    /// Enqueue an item for delivery after the configured delay.
    /// Fails when the receiving side of the line is gone.
    pub async fn send(&self, item: T) -> Result<(), mpsc::error::SendError<T>> {
        let deliver_at = Instant::now() + self.delay;
        self.tx
            .send((deliver_at, item))
            .await
            .map_err(|e| mpsc::error::SendError(e.0 .1))
    }
}

/// Create a delay line: items sent on the returned sender appear on the
/// returned receiver after `delay`.
pub fn delay_line<T: Send + 'static>(
    delay: Duration,
    capacity: usize,
) -> (DelayedSender<T>, mpsc::Receiver<T>) {
    let (in_tx, mut in_rx) = mpsc::channel::<(Instant, T)>(capacity);
    let (out_tx, out_rx) = mpsc::channel::<T>(capacity);

    tokio::spawn(async move {
        while let Some((deliver_at, item)) = in_rx.recv().await {
            sleep_until(deliver_at).await;
            if out_tx.send(item).await.is_err() {
                break;
            }
        }
    });

    (DelayedSender { delay, tx: in_tx }, out_rx)
}
