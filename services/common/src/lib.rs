//! Common protocol definitions, error taxonomy, and client wrappers shared
//! between the ticker-cache service and its callers.

pub mod clients;
pub mod constants;
pub mod errors;
pub mod proto;

pub use clients::*;
pub use errors::*;
pub use proto::cache;
