//! Cache service gRPC client wrapper with streaming support

use crate::constants::network::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, RECORD_BUFFER_SIZE,
};
use crate::errors::CacheError;
use crate::proto::cache::v1::{
    Ack, Tkr, TickerRecord, cache_client::CacheClient as GrpcClient,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Streaming;
use tonic::transport::{Channel, Endpoint};
use tracing::info;

/// Cache client configuration
#[derive(Clone, Debug)]
pub struct CacheClientConfig {
    /// Service endpoint
    pub endpoint: String,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Request timeout in seconds (unary calls only; streams are open-ended)
    pub request_timeout: u64,
    /// Buffer size for the outbound record channel on `SetStream`
    pub record_buffer_size: usize,
}

impl Default for CacheClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:50051".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            record_buffer_size: RECORD_BUFFER_SIZE,
        }
    }
}

/// Cache service client
///
/// Thin wrapper over the generated client: connection setup with timeouts,
/// status-to-error mapping, and channel plumbing for the bidirectional
/// `SetStream` call. Retry and backoff are deliberately left to the caller.
#[derive(Debug)]
pub struct CacheClient {
    client: GrpcClient<Channel>,
    config: CacheClientConfig,
}

impl CacheClient {
    /// Connect to the cache service.
    pub async fn connect(config: CacheClientConfig) -> Result<Self, CacheError> {
        info!("Connecting to cache service at {}", config.endpoint);

        let channel = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| CacheError::Transport(e.to_string()))?
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.request_timeout))
            .connect()
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;

        Ok(Self {
            client: GrpcClient::new(channel),
            config,
        })
    }

    /// Single point read of a ticker's current record.
    pub async fn get(&mut self, ticker: &str) -> Result<TickerRecord, CacheError> {
        let response = self
            .client
            .get(Tkr {
                tkr: ticker.to_string(),
            })
            .await?;
        Ok(response.into_inner())
    }

    /// Single write.
    pub async fn set(&mut self, record: TickerRecord) -> Result<bool, CacheError> {
        let response = self.client.set(record).await?;
        Ok(response.into_inner().success)
    }

    /// Follow a ticker: current record first, then one record per update.
    ///
    /// The stream stays open until the server closes it or the returned
    /// `Streaming` is dropped (which cancels the call).
    pub async fn get_stream(&mut self, ticker: &str) -> Result<Streaming<TickerRecord>, CacheError> {
        let response = self
            .client
            .get_stream(Tkr {
                tkr: ticker.to_string(),
            })
            .await?;
        Ok(response.into_inner())
    }

    /// Open a lockstep ingest stream.
    ///
    /// Returns the sender for outbound records and the inbound ack stream.
    /// The server acks each record in order; dropping the sender ends the
    /// stream cleanly.
    pub async fn set_stream(
        &mut self,
    ) -> Result<(mpsc::Sender<TickerRecord>, Streaming<Ack>), CacheError> {
        let (tx, rx) = mpsc::channel(self.config.record_buffer_size);
        let response = self.client.set_stream(ReceiverStream::new(rx)).await?;
        Ok((tx, response.into_inner()))
    }
}
