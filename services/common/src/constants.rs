//! Shared constants

/// Network defaults
pub mod network {
    /// Default gRPC listen/connect port
    pub const DEFAULT_GRPC_PORT: u16 = 50051;

    /// Default connection timeout in seconds
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

    /// Default per-request timeout in seconds
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Buffer size for client-side record channels
    pub const RECORD_BUFFER_SIZE: usize = 64;
}
