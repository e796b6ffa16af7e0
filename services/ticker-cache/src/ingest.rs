//! Set-stream ingestor: lockstep write-then-ack
//!
//! For every inbound record, exactly one write then exactly one ack, in
//! receive order. No buffering or batching: a cycle must fully complete
//! before the next record is read, which is the stream's backpressure.

use crate::store::TickerStore;
use futures::{Stream, StreamExt};
use services_common::cache::v1::{Ack, TickerRecord};
use services_common::errors::CacheError;
use tokio::sync::mpsc;
use tonic::Status;
use tracing::debug;

/// Outbound half of a set-stream session.
pub type AckSender = mpsc::Sender<Result<Ack, Status>>;

/// Ack channel capacity. A single slot keeps the stream strictly lockstep:
/// an ack must be handed off before the next record is read.
pub const ACK_CHANNEL_CAPACITY: usize = 1;

/// Drive one set-stream session until end-of-input, a receive error, a
/// failed write, or a failed ack send.
pub async fn run<S, I>(store: &S, mut inbound: I, acks: AckSender)
where
    S: TickerStore + ?Sized,
    I: Stream<Item = Result<TickerRecord, Status>> + Unpin,
{
    loop {
        let record = match inbound.next().await {
            // Clean end of input.
            None => {
                debug!("set-stream closed by client");
                return;
            }
            Some(Err(status)) => {
                let _ = acks.send(Err(status)).await;
                return;
            }
            Some(Ok(record)) => record,
        };

        if record.ticker.is_empty() {
            let _ = acks.send(Err(CacheError::InvalidTicker.into())).await;
            return;
        }

        // A failed write terminates the stream with no partial ack.
        if let Err(err) = store.write(&record.into()).await {
            let _ = acks.send(Err(err.into())).await;
            return;
        }

        if acks.send(Ok(Ack { success: true })).await.is_err() {
            return;
        }
    }
}
