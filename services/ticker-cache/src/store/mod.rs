//! Record store adapter
//!
//! The store is the single owner of authoritative record state: every read
//! goes to the backend, nothing is cached proxy-side beyond one
//! reconciliation cycle. Backends are constructor-injected behind
//! [`TickerStore`] so the streaming protocol can be exercised against the
//! in-memory store in tests.

pub mod memory;
pub mod redis;

use crate::notify::ChangeEvents;
use async_trait::async_trait;
use services_common::cache::v1 as proto;
use services_common::errors::CacheError;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// A ticker's stored record. A write fully overwrites the prior record;
/// there is no field-level merge. The timestamp is producer-supplied and not
/// validated for monotonicity.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerRecord {
    /// Instrument key, non-empty
    pub ticker: String,
    /// Seconds since epoch
    pub timestamp: i64,
    /// Last price
    pub price: f64,
    /// Traded volume
    pub volume: i64,
}

impl From<proto::TickerRecord> for TickerRecord {
    fn from(record: proto::TickerRecord) -> Self {
        Self {
            ticker: record.ticker,
            timestamp: record.timestamp,
            price: record.price,
            volume: record.volume,
        }
    }
}

impl From<TickerRecord> for proto::TickerRecord {
    fn from(record: TickerRecord) -> Self {
        Self {
            ticker: record.ticker,
            timestamp: record.timestamp,
            price: record.price,
            volume: record.volume,
        }
    }
}

/// Storage backend with publish/subscribe change notification
///
/// The backend serializes per-key writes; the proxy adds no locking of its
/// own on top of that.
#[async_trait]
pub trait TickerStore: Send + Sync {
    /// Atomically store all fields of `record` under its ticker key and
    /// publish a change notification on the same key. Both effects become
    /// visible together or not at all.
    async fn write(&self, record: &TickerRecord) -> Result<(), CacheError>;

    /// Read all fields for `ticker`. `NotFound` if the key does not exist;
    /// an empty record is not a valid state.
    async fn read(&self, ticker: &str) -> Result<TickerRecord, CacheError>;

    /// Open a change-event subscription for exactly one ticker.
    async fn subscribe(&self, ticker: &str) -> Result<ChangeEvents, CacheError>;
}
