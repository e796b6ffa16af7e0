//! Ticker Cache Service
//!
//! Real-time cache proxy over a key/value store with pub/sub notification.
//! Producers push timestamped price/volume records over a lockstep
//! bidirectional stream; consumers follow a ticker over a server stream that
//! reconciles a point-in-time read with the store's change-event feed, so a
//! subscriber sees the current record immediately and every update after it.

pub mod config;
pub mod grpc_service;
pub mod ingest;
pub mod notify;
pub mod reconcile;
pub mod store;

pub use config::CacheConfig;
pub use grpc_service::CacheService;
pub use notify::ChangeEvents;
pub use store::{TickerRecord, TickerStore};
