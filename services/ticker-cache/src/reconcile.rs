//! Get-stream reconciler: snapshot plus live change-event reconciliation
//!
//! Serves the point-in-time read immediately, then keeps the client current
//! by re-reading on every change event. The subscription is opened before
//! the first read, so an update racing the snapshot is delivered again as a
//! duplicate rather than lost.

use crate::notify::ChangeEvents;
use crate::store::TickerStore;
use services_common::cache::v1 as proto;
use tokio::sync::mpsc;
use tonic::Status;
use tracing::debug;

/// Outbound half of a get-stream session.
pub type RecordSender = mpsc::Sender<Result<proto::TickerRecord, Status>>;

/// Drive one get-stream session until the client goes away, the event
/// sequence ends, or a read/send fails.
///
/// Every exit path drops `events`, which releases the store subscription.
pub async fn run<S>(store: &S, ticker: &str, mut events: ChangeEvents, tx: RecordSender)
where
    S: TickerStore + ?Sized,
{
    // Initial snapshot, through the same path as every event-driven reread.
    if !get_and_send(store, ticker, &tx).await {
        return;
    }

    loop {
        tokio::select! {
            // Client disconnected, cancelled, or hit its deadline. Expected,
            // not an error.
            _ = tx.closed() => {
                debug!("get-stream for {ticker} cancelled by client");
                return;
            }
            event = events.recv() => match event {
                Some(()) => {
                    if !get_and_send(store, ticker, &tx).await {
                        return;
                    }
                }
                // Store closed the subscription: clean end of stream.
                None => {
                    debug!("change-event sequence for {ticker} closed");
                    return;
                }
            },
        }
    }
}

/// One read+send cycle. Returns `false` when the stream is finished, any
/// error having already been forwarded as the final status.
async fn get_and_send<S>(store: &S, ticker: &str, tx: &RecordSender) -> bool
where
    S: TickerStore + ?Sized,
{
    match store.read(ticker).await {
        Ok(record) => tx.send(Ok(record.into())).await.is_ok(),
        Err(err) => {
            let _ = tx.send(Err(err.into())).await;
            false
        }
    }
}
