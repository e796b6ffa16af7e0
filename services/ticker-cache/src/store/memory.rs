//! In-memory ticker store
//!
//! Substitutable backend for tests and local development. Mirrors the redis
//! backend's semantics: full-record overwrite, notify-on-write as one unit
//! (both under the same write lock), per-ticker broadcast of payloadless
//! change events.

use super::{TickerRecord, TickerStore};
use crate::notify::ChangeEvents;
use async_trait::async_trait;
use services_common::errors::CacheError;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Per-ticker broadcast capacity. Lagged receivers coalesce to a single
/// pending reread, which still observes the latest state.
const CHANNEL_CAPACITY: usize = 16;

/// In-memory ticker store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, TickerRecord>,
    channels: HashMap<String, broadcast::Sender<()>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions on a ticker. Test instrumentation for
    /// verifying that sessions release their subscriptions.
    pub async fn subscriber_count(&self, ticker: &str) -> usize {
        let inner = self.inner.read().await;
        inner
            .channels
            .get(ticker)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[async_trait]
impl TickerStore for MemoryStore {
    async fn write(&self, record: &TickerRecord) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        inner
            .records
            .insert(record.ticker.clone(), record.clone());
        if let Some(tx) = inner.channels.get(&record.ticker) {
            // No subscribers is not an error.
            let _ = tx.send(());
        }
        Ok(())
    }

    async fn read(&self, ticker: &str) -> Result<TickerRecord, CacheError> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(ticker)
            .cloned()
            .ok_or_else(|| CacheError::NotFound(ticker.to_string()))
    }

    async fn subscribe(&self, ticker: &str) -> Result<ChangeEvents, CacheError> {
        let mut rx = {
            let mut inner = self.inner.write().await;
            inner
                .channels
                .entry(ticker.to_string())
                .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
                .subscribe()
        };

        let (tx, events) = ChangeEvents::channel();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    result = rx.recv() => match result {
                        Ok(()) => {
                            if tx.send(()).await.is_err() {
                                break;
                            }
                        }
                        // Missed events coalesce into one pending reread.
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            if tx.send(()).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(events)
    }
}
