//! gRPC service implementation for the ticker cache
//!
//! Session and lifecycle management: each streaming call runs as one spawned
//! task that owns the call's subscription and outbound channel. Client
//! disconnect or deadline closes the outbound `ReceiverStream`, the task
//! observes `tx.closed()` and exits, and dropping its `ChangeEvents` handle
//! releases the store subscription — no orphaned subscriptions survive a
//! stream's termination.

use crate::store::TickerStore;
use crate::{ingest, reconcile};
use services_common::cache::v1::{Ack, TickerRecord, Tkr, cache_server::Cache};
use services_common::errors::CacheError;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use tracing::{debug, info};

/// Outbound channel capacity for get-streams. Bounds bursts only; the
/// reconciler blocks rather than drops when the consumer is slow.
const RECORD_CHANNEL_CAPACITY: usize = 16;

/// Cache gRPC service
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn TickerStore>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("store", &"Arc<dyn TickerStore>")
            .finish()
    }
}

impl CacheService {
    /// Create a service over a store backend.
    pub fn new(store: Arc<dyn TickerStore>) -> Self {
        Self { store }
    }
}

#[tonic::async_trait]
impl Cache for CacheService {
    async fn get(&self, request: Request<Tkr>) -> Result<Response<TickerRecord>, Status> {
        let ticker = request.into_inner().tkr;
        if ticker.is_empty() {
            return Err(CacheError::InvalidTicker.into());
        }

        let record = self.store.read(&ticker).await?;
        Ok(Response::new(record.into()))
    }

    type GetStreamStream = Pin<Box<dyn Stream<Item = Result<TickerRecord, Status>> + Send>>;

    async fn get_stream(
        &self,
        request: Request<Tkr>,
    ) -> Result<Response<Self::GetStreamStream>, Status> {
        let ticker = request.into_inner().tkr;
        if ticker.is_empty() {
            return Err(CacheError::InvalidTicker.into());
        }
        info!("get-stream opened for {ticker}");

        // Subscribe before the first read so an update racing the snapshot
        // is re-delivered, never dropped.
        let events = self.store.subscribe(&ticker).await?;

        // A never-written ticker fails the call immediately; it does not
        // wait for a future write. The early return drops `events`,
        // releasing the subscription.
        self.store.read(&ticker).await?;

        let (tx, rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            reconcile::run(store.as_ref(), &ticker, events, tx).await;
            debug!("get-stream for {ticker} finished");
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::GetStreamStream
        ))
    }

    async fn set(&self, request: Request<TickerRecord>) -> Result<Response<Ack>, Status> {
        let record = request.into_inner();
        if record.ticker.is_empty() {
            return Err(CacheError::InvalidTicker.into());
        }

        self.store.write(&record.into()).await?;
        Ok(Response::new(Ack { success: true }))
    }

    type SetStreamStream = Pin<Box<dyn Stream<Item = Result<Ack, Status>> + Send>>;

    async fn set_stream(
        &self,
        request: Request<Streaming<TickerRecord>>,
    ) -> Result<Response<Self::SetStreamStream>, Status> {
        let inbound = request.into_inner();
        info!("set-stream opened");

        let (tx, rx) = mpsc::channel(ingest::ACK_CHANNEL_CAPACITY);
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            ingest::run(store.as_ref(), inbound, tx).await;
            debug!("set-stream finished");
        });

        Ok(Response::new(
            Box::pin(ReceiverStream::new(rx)) as Self::SetStreamStream
        ))
    }
}
