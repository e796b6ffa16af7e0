//! gRPC client wrappers

pub mod cache_client;

pub use cache_client::{CacheClient, CacheClientConfig};
