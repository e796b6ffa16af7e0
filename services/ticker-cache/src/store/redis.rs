//! Redis storage backend
//!
//! Records live in a hash at the ticker key with all fields stored as text;
//! each write publishes on a channel named after the same key. The manager
//! connection is shared across all sessions; pub/sub requires a dedicated
//! connection per subscription, owned by that subscription's forwarding task.

use super::{TickerRecord, TickerStore};
use crate::notify::ChangeEvents;
use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use services_common::errors::CacheError;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, warn};

const FIELD_TICKER: &str = "ticker";
const FIELD_TIMESTAMP: &str = "timestamp";
const FIELD_PRICE: &str = "price";
const FIELD_VOLUME: &str = "volume";

/// Redis-backed ticker store
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("conn", &"redis::aio::ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    /// Connect to redis and establish the shared manager connection.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::store)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(CacheError::store)?;
        Ok(Self { client, conn })
    }
}

/// Parse one stored text field back to its numeric type.
///
/// A corrupt or missing field yields the type's zero value instead of
/// failing the read; the fallback is logged so corruption is visible.
fn parse_field<T>(fields: &HashMap<String, String>, ticker: &str, name: &str) -> T
where
    T: FromStr + Default,
{
    match fields.get(name).map(|raw| raw.parse::<T>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            warn!("unparseable field {name} for ticker {ticker}, substituting zero value");
            T::default()
        }
        None => {
            warn!("missing field {name} for ticker {ticker}, substituting zero value");
            T::default()
        }
    }
}

#[async_trait]
impl TickerStore for RedisStore {
    async fn write(&self, record: &TickerRecord) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let fields = [
            (FIELD_TICKER, record.ticker.clone()),
            (FIELD_TIMESTAMP, record.timestamp.to_string()),
            (FIELD_PRICE, record.price.to_string()),
            (FIELD_VOLUME, record.volume.to_string()),
        ];

        // HSET + PUBLISH in one MULTI/EXEC so no reader can observe the
        // write without its notification, or the notification without the
        // write.
        let mut pipe = redis::pipe();
        pipe.atomic()
            .hset_multiple(&record.ticker, &fields)
            .ignore()
            .publish(&record.ticker, 1)
            .ignore();
        let (): () = pipe
            .query_async(&mut conn)
            .await
            .map_err(CacheError::store)?;
        Ok(())
    }

    async fn read(&self, ticker: &str) -> Result<TickerRecord, CacheError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(ticker).await.map_err(CacheError::store)?;

        // HGETALL on a missing key returns an empty map.
        if fields.is_empty() {
            return Err(CacheError::NotFound(ticker.to_string()));
        }

        Ok(TickerRecord {
            ticker: ticker.to_string(),
            timestamp: parse_field(&fields, ticker, FIELD_TIMESTAMP),
            price: parse_field(&fields, ticker, FIELD_PRICE),
            volume: parse_field(&fields, ticker, FIELD_VOLUME),
        })
    }

    async fn subscribe(&self, ticker: &str) -> Result<ChangeEvents, CacheError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(CacheError::store)?;
        pubsub.subscribe(ticker).await.map_err(CacheError::store)?;

        let (tx, events) = ChangeEvents::channel();
        let ticker = ticker.to_string();
        tokio::spawn(async move {
            let mut messages = pubsub.into_on_message();
            loop {
                tokio::select! {
                    // Consumer dropped its handle: stop and release the
                    // pub/sub connection.
                    _ = tx.closed() => break,
                    msg = messages.next() => match msg {
                        Some(_) => {
                            if tx.send(()).await.is_err() {
                                break;
                            }
                        }
                        // Store closed the channel (connection loss): the
                        // sequence ends without error.
                        None => break,
                    },
                }
            }
            debug!("released subscription for ticker {ticker}");
        });

        Ok(events)
    }
}
