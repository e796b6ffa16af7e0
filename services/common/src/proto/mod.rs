//! Protocol Buffer definitions for the ticker-cache service.

// Include the generated proto code
/// Cache service protobuf definitions
pub mod cache {
    /// Version 1 of the cache service API
    #[allow(missing_docs)]
    #[allow(missing_debug_implementations)]
    pub mod v1 {
        tonic::include_proto!("tickercache.cache.v1");
    }
}
