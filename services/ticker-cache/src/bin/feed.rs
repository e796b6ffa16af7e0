//! Demo feed client: push random records for a ticker over a lockstep
//! set-stream, or follow a ticker and print every update.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rand::Rng;
use services_common::cache::v1::TickerRecord;
use services_common::clients::{CacheClient, CacheClientConfig};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_stream::StreamExt;
use tracing::info;

/// Demo producer/consumer for the ticker cache
#[derive(Parser)]
#[clap(name = "feed")]
#[clap(about = "Demo producer/consumer for the ticker cache")]
struct Cli {
    /// Cache service endpoint
    #[clap(long, default_value = "http://localhost:50051")]
    endpoint: String,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a ticker and print every update
    Watch {
        #[clap(default_value = "GOOGL")]
        ticker: String,

        /// Stop after this many seconds
        #[clap(long, default_value = "40")]
        timeout_secs: u64,
    },
    /// Push random records for a ticker, one ack per record
    Publish {
        #[clap(default_value = "GOOGL")]
        ticker: String,

        /// Number of records to push
        #[clap(long, default_value = "10")]
        count: u32,

        /// Maximum pause between pushes in seconds
        #[clap(long, default_value = "10")]
        max_interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = CacheClientConfig {
        endpoint: cli.endpoint,
        ..CacheClientConfig::default()
    };
    let mut client = CacheClient::connect(config).await?;

    match cli.command {
        Commands::Watch {
            ticker,
            timeout_secs,
        } => watch(&mut client, &ticker, timeout_secs).await,
        Commands::Publish {
            ticker,
            count,
            max_interval_secs,
        } => publish(&mut client, &ticker, count, max_interval_secs).await,
    }
}

async fn watch(client: &mut CacheClient, ticker: &str, timeout_secs: u64) -> Result<()> {
    let mut stream = client.get_stream(ticker).await?;

    let deadline = tokio::time::sleep(Duration::from_secs(timeout_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                info!("watch deadline reached");
                return Ok(());
            }
            item = stream.next() => match item {
                Some(Ok(record)) => {
                    info!(
                        "{} @ {}: price={} volume={}",
                        record.ticker, record.timestamp, record.price, record.volume
                    );
                }
                Some(Err(status)) => bail!("stream error: {status}"),
                None => {
                    info!("stream closed by server");
                    return Ok(());
                }
            },
        }
    }
}

async fn publish(
    client: &mut CacheClient,
    ticker: &str,
    count: u32,
    max_interval_secs: u64,
) -> Result<()> {
    let (records, mut acks) = client.set_stream().await?;

    for _ in 0..count {
        let record = TickerRecord {
            ticker: ticker.to_string(),
            timestamp: epoch_secs()?,
            price: rand::thread_rng().r#gen::<f64>() * 100.0,
            volume: rand::thread_rng().gen_range(0..100_000_000),
        };
        info!("pushing {} @ {}: price={}", record.ticker, record.timestamp, record.price);

        if records.send(record).await.is_err() {
            bail!("server closed the ingest stream");
        }
        match acks.next().await {
            Some(Ok(ack)) => info!("ack: {}", ack.success),
            Some(Err(status)) => bail!("ingest failed: {status}"),
            None => bail!("ack stream ended early"),
        }

        let pause = rand::thread_rng().gen_range(0..=max_interval_secs);
        tokio::time::sleep(Duration::from_secs(pause)).await;
    }

    Ok(())
}

fn epoch_secs() -> Result<i64> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(i64::try_from(secs).unwrap_or(i64::MAX))
}
