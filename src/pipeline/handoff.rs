//! Zero-buffer, single-producer / single-consumer handoff channel.
//!
//! `send` completes only once the receiver has taken the item, so at most
//! one item is in flight between two stages. Both ends race every wait
//! against the pipeline's cancellation token.

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    #[error("pipeline cancelled")]
    Cancelled,
    #[error("receiver dropped")]
    Closed,
}

struct Envelope<T> {
    item: T,
    ack: oneshot::Sender<()>,
}

pub struct HandoffSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
    cancel: CancellationToken,
}

pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
    cancel: CancellationToken,
}

/// Create a handoff channel bound to `cancel`.
pub fn channel<T>(cancel: CancellationToken) -> (HandoffSender<T>, HandoffReceiver<T>) {
    // Capacity 1 holds the envelope; the ack makes the handoff a rendezvous.
    let (tx, rx) = mpsc::channel(1);
    (
        HandoffSender {
            tx,
            cancel: cancel.clone(),
        },
        HandoffReceiver { rx, cancel },
    )
}

impl<T> HandoffSender<T> {
    /// Hand `item` to the receiver and wait until it has been taken.
    pub async fn send(&self, item: T) -> Result<(), HandoffError> {
        let (ack, taken) = oneshot::channel();
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(HandoffError::Cancelled),
            sent = self.tx.send(Envelope { item, ack }) => {
                sent.map_err(|_| HandoffError::Closed)?;
            }
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandoffError::Cancelled),
            acked = taken => acked.map_err(|_| HandoffError::Closed),
        }
    }
}

impl<T> HandoffReceiver<T> {
    /// Take the next item. `None` once every sender is dropped or the
    /// pipeline is cancelled.
    pub async fn recv(&mut self) -> Option<T> {
        let envelope = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            envelope = self.rx.recv() => envelope?,
        };
        let _ = envelope.ack.send(());
        Some(envelope.item)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> std::fmt::Debug for HandoffSender<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffSender")
            .field("closed", &self.tx.is_closed())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl<T> std::fmt::Debug for HandoffReceiver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffReceiver")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
