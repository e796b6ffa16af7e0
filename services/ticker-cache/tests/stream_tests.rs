//! Integration tests for the streaming synchronization protocol, driven
//! against the in-memory store backend.

use async_trait::async_trait;
use futures::StreamExt;
use services_common::cache::v1::{Tkr, TickerRecord as ProtoRecord, cache_server::Cache};
use services_common::errors::CacheError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use ticker_cache::grpc_service::CacheService;
use ticker_cache::ingest;
use ticker_cache::notify::ChangeEvents;
use ticker_cache::store::{MemoryStore, TickerRecord, TickerStore};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Status};

fn proto_record(ticker: &str, timestamp: i64) -> ProtoRecord {
    ProtoRecord {
        ticker: ticker.to_string(),
        timestamp,
        price: 101.5,
        volume: 99_999_000,
    }
}

fn service(store: &MemoryStore) -> CacheService {
    CacheService::new(Arc::new(store.clone()))
}

/// Store whose writes fail once the flag is raised, for exercising backend
/// failure on the ingest path.
#[derive(Clone)]
struct FlakyStore {
    inner: MemoryStore,
    fail_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl TickerStore for FlakyStore {
    async fn write(&self, record: &TickerRecord) -> Result<(), CacheError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Store("backend unavailable".to_string()));
        }
        self.inner.write(record).await
    }

    async fn read(&self, ticker: &str) -> Result<TickerRecord, CacheError> {
        self.inner.read(ticker).await
    }

    async fn subscribe(&self, ticker: &str) -> Result<ChangeEvents, CacheError> {
        self.inner.subscribe(ticker).await
    }
}

/// Poll until the ticker's subscriber count reaches `expected`; subscription
/// release happens in spawned tasks, so it is observable only eventually.
async fn wait_for_subscribers(store: &MemoryStore, ticker: &str, expected: usize) {
    for _ in 0..100 {
        if store.subscriber_count(ticker).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "subscriber count for {ticker} never reached {expected} (now {})",
        store.subscriber_count(ticker).await
    );
}

#[tokio::test]
async fn get_returns_written_record() {
    let store = MemoryStore::new();
    let svc = service(&store);

    let ack = svc
        .set(Request::new(proto_record("GOOGL", 1000)))
        .await
        .unwrap()
        .into_inner();
    assert!(ack.success);

    let record = svc
        .get(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(record, proto_record("GOOGL", 1000));
}

#[tokio::test]
async fn get_unwritten_ticker_is_not_found() {
    let svc = service(&MemoryStore::new());

    let err = svc
        .get(Request::new(Tkr {
            tkr: "MSFT".to_string(),
        }))
        .await
        .expect_err("unwritten ticker must fail");
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn empty_ticker_is_rejected() {
    let svc = service(&MemoryStore::new());

    let err = svc
        .get(Request::new(Tkr { tkr: String::new() }))
        .await
        .expect_err("empty ticker must fail");
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = svc
        .set(Request::new(proto_record("", 1000)))
        .await
        .expect_err("empty ticker must fail");
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn get_stream_short_circuits_on_unwritten_ticker() {
    let store = MemoryStore::new();
    let svc = service(&store);

    // Must fail the call immediately rather than waiting for a first write.
    let result = timeout(
        Duration::from_secs(1),
        svc.get_stream(Request::new(Tkr {
            tkr: "NOPE".to_string(),
        })),
    )
    .await
    .expect("short-circuit within deadline");

    let err = match result {
        Ok(_) => panic!("unwritten ticker must fail the stream"),
        Err(err) => err,
    };
    assert_eq!(err.code(), Code::NotFound);

    // The precheck subscription must not leak.
    wait_for_subscribers(&store, "NOPE", 0).await;
}

#[tokio::test]
async fn get_stream_emits_snapshot_then_updates() {
    let store = MemoryStore::new();
    let svc = service(&store);

    svc.set(Request::new(proto_record("GOOGL", 1000)))
        .await
        .unwrap();

    let mut stream = svc
        .get_stream(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    // Snapshot arrives without any write happening.
    let first = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("snapshot within deadline")
        .expect("stream open")
        .expect("snapshot ok");
    assert_eq!(first, proto_record("GOOGL", 1000));

    // Every subsequent write surfaces on the stream. The initial
    // subscribe/read race may duplicate a record, never drop one, so scan
    // forward until the new timestamp appears.
    for updated in [2000, 3000] {
        store
            .write(&proto_record("GOOGL", updated).into())
            .await
            .unwrap();

        let seen = timeout(Duration::from_secs(2), async {
            loop {
                match stream.next().await {
                    Some(Ok(record)) if record.timestamp == updated => break record,
                    Some(Ok(_)) => continue,
                    other => panic!("stream ended before update: {other:?}"),
                }
            }
        })
        .await
        .expect("update within bounded window");
        assert_eq!(seen, proto_record("GOOGL", updated));
    }
}

#[tokio::test]
async fn dropping_get_stream_releases_subscription() {
    let store = MemoryStore::new();
    let svc = service(&store);

    svc.set(Request::new(proto_record("GOOGL", 1000)))
        .await
        .unwrap();

    let stream = svc
        .get_stream(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    wait_for_subscribers(&store, "GOOGL", 1).await;

    // Client cancellation is modeled by dropping the response stream.
    drop(stream);
    wait_for_subscribers(&store, "GOOGL", 0).await;
}

#[tokio::test]
async fn concurrent_streams_each_hold_one_subscription() {
    let store = MemoryStore::new();
    let svc = service(&store);

    svc.set(Request::new(proto_record("GOOGL", 1000)))
        .await
        .unwrap();

    let first = svc
        .get_stream(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    let second = svc
        .get_stream(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    wait_for_subscribers(&store, "GOOGL", 2).await;

    drop(first);
    wait_for_subscribers(&store, "GOOGL", 1).await;
    drop(second);
    wait_for_subscribers(&store, "GOOGL", 0).await;
}

#[tokio::test]
async fn set_stream_acks_in_lockstep() {
    let store = MemoryStore::new();
    let (record_tx, record_rx) = mpsc::channel::<Result<ProtoRecord, Status>>(1);
    let (ack_tx, mut ack_rx) = mpsc::channel(ingest::ACK_CHANNEL_CAPACITY);

    let task_store = store.clone();
    let ingest_task = tokio::spawn(async move {
        ingest::run(&task_store, ReceiverStream::new(record_rx), ack_tx).await;
    });

    for i in 0..5i64 {
        record_tx
            .send(Ok(proto_record("GOOGL", 1000 + i)))
            .await
            .unwrap();

        let ack = timeout(Duration::from_secs(1), ack_rx.recv())
            .await
            .expect("ack within deadline")
            .expect("one ack per record")
            .expect("successful ack");
        assert!(ack.success);

        // The write must be externally observable by the time its ack is.
        assert_eq!(store.read("GOOGL").await.unwrap().timestamp, 1000 + i);
    }

    // End of input terminates the stream cleanly: exactly N acks, no more.
    drop(record_tx);
    assert!(ack_rx.recv().await.is_none());
    ingest_task.await.unwrap();
}

#[tokio::test]
async fn set_stream_rejects_empty_ticker() {
    let store = MemoryStore::new();
    let (record_tx, record_rx) = mpsc::channel::<Result<ProtoRecord, Status>>(1);
    let (ack_tx, mut ack_rx) = mpsc::channel(ingest::ACK_CHANNEL_CAPACITY);

    let task_store = store.clone();
    tokio::spawn(async move {
        ingest::run(&task_store, ReceiverStream::new(record_rx), ack_tx).await;
    });

    record_tx.send(Ok(proto_record("", 1000))).await.unwrap();

    let status = ack_rx
        .recv()
        .await
        .expect("terminal status")
        .expect_err("empty ticker must fail the stream");
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(ack_rx.recv().await.is_none());
}

#[tokio::test]
async fn set_stream_terminates_on_failed_write_without_ack() {
    let store = FlakyStore::new();
    let (record_tx, record_rx) = mpsc::channel::<Result<ProtoRecord, Status>>(1);
    let (ack_tx, mut ack_rx) = mpsc::channel(ingest::ACK_CHANNEL_CAPACITY);

    let task_store = store.clone();
    tokio::spawn(async move {
        ingest::run(&task_store, ReceiverStream::new(record_rx), ack_tx).await;
    });

    record_tx
        .send(Ok(proto_record("GOOGL", 1000)))
        .await
        .unwrap();
    let ack = ack_rx
        .recv()
        .await
        .expect("ack for healthy write")
        .expect("successful ack");
    assert!(ack.success);

    store.fail_writes.store(true, Ordering::SeqCst);
    record_tx
        .send(Ok(proto_record("GOOGL", 2000)))
        .await
        .unwrap();

    // A failed write is terminal: a store error instead of an ack, then
    // nothing.
    let status = ack_rx
        .recv()
        .await
        .expect("terminal status")
        .expect_err("failed write must terminate the stream");
    assert_eq!(status.code(), Code::Internal);
    assert!(ack_rx.recv().await.is_none());

    // The rejected record must not have clobbered the stored state.
    assert_eq!(store.inner.read("GOOGL").await.unwrap().timestamp, 1000);
}

#[tokio::test]
async fn set_stream_surfaces_receive_errors() {
    let store = MemoryStore::new();
    let (record_tx, record_rx) = mpsc::channel::<Result<ProtoRecord, Status>>(1);
    let (ack_tx, mut ack_rx) = mpsc::channel(ingest::ACK_CHANNEL_CAPACITY);

    let task_store = store.clone();
    tokio::spawn(async move {
        ingest::run(&task_store, ReceiverStream::new(record_rx), ack_tx).await;
    });

    record_tx
        .send(Err(Status::aborted("peer went away")))
        .await
        .unwrap();

    let status = ack_rx
        .recv()
        .await
        .expect("terminal status")
        .expect_err("receive error must terminate the stream");
    assert_eq!(status.code(), Code::Aborted);
    assert!(ack_rx.recv().await.is_none());
}

/// End-to-end scenario: a written record is returned by `read` exactly and
/// surfaces on a concurrently open stream within a bounded window.
#[tokio::test]
async fn googl_scenario() {
    let store = MemoryStore::new();
    let svc = service(&store);

    let record = ProtoRecord {
        ticker: "GOOGL".to_string(),
        timestamp: 1000,
        price: 101.5,
        volume: 99_999_000,
    };

    // Stream opened after an initial write so it has a snapshot to serve.
    svc.set(Request::new(record.clone())).await.unwrap();

    let mut stream = svc
        .get_stream(Request::new(Tkr {
            tkr: "GOOGL".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(store.read("GOOGL").await.unwrap(), record.clone().into());

    let emitted = timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("record within bounded window")
        .expect("stream open")
        .expect("record ok");
    assert_eq!(emitted, record);
}
