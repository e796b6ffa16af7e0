//! Update notifier: per-ticker change-event sequences
//!
//! A change event carries no payload; it means "re-read this ticker now".
//! Each subscription is backed by a forwarding task that owns the store-side
//! subscription and exits when either end goes away, so releasing the
//! subscription is a matter of dropping the [`ChangeEvents`] handle.

use tokio::sync::mpsc;

/// Per-subscription event buffer. Events are payloadless, so the buffer only
/// bounds how far the forwarder can run ahead of a slow reconciler; the
/// forwarder blocks rather than drops when it fills.
pub(crate) const EVENT_BUFFER: usize = 16;

/// A lazy, unbounded sequence of change events for one ticker.
///
/// The sequence ends ([`recv`](Self::recv) returns `None`) when the store
/// closes the underlying channel. Dropping the handle releases the
/// subscription; the release is idempotent and safe after the store side has
/// already closed.
#[derive(Debug)]
pub struct ChangeEvents {
    rx: mpsc::Receiver<()>,
}

impl ChangeEvents {
    /// Create a sequence plus the sender its forwarding task feeds.
    pub(crate) fn channel() -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (tx, Self { rx })
    }

    /// Next change event; `None` once the subscription has closed.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_ends_when_sender_drops() {
        let (tx, mut events) = ChangeEvents::channel();
        tx.send(()).await.unwrap();
        drop(tx);

        assert_eq!(events.recv().await, Some(()));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_handle_closes_sender() {
        let (tx, events) = ChangeEvents::channel();
        drop(events);
        tx.closed().await;
        assert!(tx.is_closed());
    }
}
