//! Ticker Cache Service - gRPC streaming cache proxy over Redis

use anyhow::Result;
use clap::Parser;
use services_common::cache::v1::cache_server::CacheServer;
use std::net::SocketAddr;
use std::sync::Arc;
use ticker_cache::config::CacheConfig;
use ticker_cache::grpc_service::CacheService;
use ticker_cache::store::RedisStore;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SERVICE_NAME: &str = "ticker-cache";

/// Ticker cache service CLI
#[derive(Parser)]
#[clap(name = "ticker-cache")]
#[clap(about = "Streaming ticker-data cache proxy over Redis")]
struct Cli {
    /// Port to bind the gRPC server
    #[clap(long, short = 'p', default_value = "50051")]
    port: u16,

    /// Host to bind the gRPC server
    #[clap(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = CacheConfig::from_env();
    config.port = cli.port;
    config.host = cli.host;

    info!("Starting Ticker Cache Service v{}", env!("CARGO_PKG_VERSION"));

    let store = RedisStore::connect(&config.redis_url()).await.map_err(|e| {
        anyhow::anyhow!("failed to connect to redis at {}: {}", config.redis_addr, e)
    })?;
    info!("Connected to redis at {}", config.redis_addr);

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen address: {e}"))?;

    let service = CacheService::new(Arc::new(store));

    info!("Ticker cache gRPC server listening on {addr}");

    Server::builder()
        .add_service(CacheServer::new(service))
        .serve(addr)
        .await
        .map_err(|e| {
            error!("gRPC server error: {e}");
            anyhow::anyhow!("failed to run gRPC server: {e}")
        })?;

    Ok(())
}

/// Initialize tracing with environment filter
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}=info,tower=info,tonic=info,h2=info",
                    SERVICE_NAME.replace('-', "_")
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
