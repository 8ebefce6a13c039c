use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tarpc::context::Context;
use tarpc::server::{self, Channel};
use tarpc::{client, context};

use kv_harness::commands::parse_keys;
use kv_harness::decode::UNKNOWN_TYPE;
use kv_harness::error::Result;
use kv_harness::invoker::INTERACTIVE_DEADLINE;
use kv_harness::*;

/// Serve `service` over an in-memory channel and return a connected client.
fn spawn_service<S>(service: S) -> StorageServiceClient
where
    S: StorageService + Clone + Send + 'static,
    S::SetFut: Send,
    S::GetFut: Send,
    S::BulkGetFut: Send,
{
    let (client_transport, server_transport) = tarpc::transport::channel::unbounded();
    let server = server::BaseChannel::with_defaults(server_transport);
    tokio::spawn(server.execute(service.serve()));
    StorageServiceClient::new(client::Config::default(), client_transport).spawn()
}

/// A store whose calls take longer than any interactive budget.
#[derive(Clone)]
struct SlowStore {
    delay: Duration,
}

type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;

impl StorageService for SlowStore {
    type SetFut = BoxFut<SetResponse>;
    type GetFut = BoxFut<GetResponse>;
    type BulkGetFut = BoxFut<BulkGetResponse>;

    fn set(self, _: context::Context, _: SetRequest) -> Self::SetFut {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            SetResponse { success: true }
        })
    }

    fn get(self, _: context::Context, _: GetRequest) -> Self::GetFut {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            GetResponse::default()
        })
    }

    fn bulk_get(self, _: context::Context, _: BulkGetRequest) -> Self::BulkGetFut {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            BulkGetResponse::default()
        })
    }
}

/// Wraps a `Store` and fails writes for chosen keys.
struct FlakyStorage {
    store: Store,
    failing_keys: Vec<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FlakyStorage {
    fn new(failing_keys: &[&str]) -> Self {
        FlakyStorage {
            store: Store::new(),
            failing_keys: failing_keys.iter().map(|k| k.to_string()).collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn set(&self, _: Context, req: SetRequest) -> Result<SetResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(req.key.clone());
        if self.failing_keys.contains(&req.key) {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset").into());
        }
        Ok(self.store.put(req))
    }

    async fn get(&self, _: Context, req: GetRequest) -> Result<GetResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.fetch(&req))
    }

    async fn bulk_get(&self, _: Context, req: BulkGetRequest) -> Result<BulkGetResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.store.fetch_all(&req))
    }
}

/// Drops the last answer of every batch.
struct ShortBatchStorage;

#[async_trait]
impl Storage for ShortBatchStorage {
    async fn set(&self, _: Context, _: SetRequest) -> Result<SetResponse> {
        Ok(SetResponse { success: true })
    }

    async fn get(&self, _: Context, _: GetRequest) -> Result<GetResponse> {
        Ok(GetResponse::default())
    }

    async fn bulk_get(&self, _: Context, req: BulkGetRequest) -> Result<BulkGetResponse> {
        let n = req.requests.len().saturating_sub(1);
        Ok(BulkGetResponse {
            responses: vec![GetResponse::default(); n],
        })
    }
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let session = Session::new(spawn_service(Store::new()));

    let set = session.set("k1", "v1").await.unwrap();
    assert!(set.success);
    assert!(set.latency < INTERACTIVE_DEADLINE);

    let get = session.get(" k1 ").await.unwrap();
    assert_eq!(get.entry.value, "v1");
    assert_eq!(get.entry.metadata, Metadata::tag("tag1", "example-tag"));
}

#[tokio::test]
async fn get_missing_key_shows_sentinel() {
    let session = Session::new(spawn_service(Store::new()));
    let get = session.get("nope").await.unwrap();
    assert_eq!(get.entry.value, UNKNOWN_TYPE);
    assert!(get.entry.metadata.tags.is_empty());
}

#[tokio::test]
async fn integer_values_decode_to_decimal() {
    let store = Store::new();
    store.put(SetRequest {
        key: "n".into(),
        value: Value::Int(42),
        metadata: None,
    });
    let session = Session::new(spawn_service(store));
    assert_eq!(session.get("n").await.unwrap().entry.value, "42");
}

#[tokio::test]
async fn bulk_get_keeps_positions() {
    let store = Store::new();
    store.put(SetRequest::text("a", "1"));
    store.put(SetRequest::text("c", "3"));
    let session = Session::new(spawn_service(store));

    let report = session.bulk_get(parse_keys("a, b ,c")).await.unwrap();
    let values: Vec<_> = report.entries.iter().map(|e| e.value.as_str()).collect();
    assert_eq!(values, vec!["1", UNKNOWN_TYPE, "3"]);
}

#[tokio::test]
async fn bulk_get_of_nothing_is_empty() {
    let session = Session::new(spawn_service(Store::new()));
    let report = session.bulk_get(Vec::new()).await.unwrap();
    assert!(report.entries.is_empty());
}

#[tokio::test]
async fn bulk_get_rejects_short_answers() {
    let session = Session::new(ShortBatchStorage);
    let err = session
        .bulk_get(vec!["a".into(), "b".into()])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        HarnessError::BatchMismatch {
            expected: 2,
            actual: 1
        }
    ));
}

#[tokio::test]
async fn slow_service_hits_deadline() {
    let session = Session::new(spawn_service(SlowStore {
        delay: Duration::from_secs(5),
    }));

    let started = std::time::Instant::now();
    let err = session.set("k1", "v1").await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {}", err);
    assert!(started.elapsed() < Duration::from_secs(2));

    let started = std::time::Instant::now();
    let err = session.get("k1").await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {}", err);
    assert!(started.elapsed() < Duration::from_secs(2));

    let err = session.bulk_get(vec!["a".into()]).await.unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {}", err);
}

#[tokio::test]
async fn burst_survives_failures() {
    let session = Session::new(FlakyStorage::new(&["key-1", "key-3"]));

    let result = session.stress(5).await;
    assert_eq!(result.total, 5);
    assert_eq!(result.failure_count(), 2);
    assert_eq!(result.failed_indices(), vec![1, 3]);
    assert_eq!(result.timeouts(), 0);
    assert_eq!(result.latency.count, 3);

    let storage = session.close();
    assert_eq!(storage.calls(), 5);
    assert_eq!(
        *storage.seen.lock().unwrap(),
        vec!["key-0", "key-1", "key-2", "key-3", "key-4"]
    );
    assert_eq!(storage.store.len(), 3);
}

#[tokio::test]
async fn burst_reports_even_when_everything_fails() {
    let session = Session::new(spawn_service(SlowStore {
        delay: Duration::from_millis(500),
    }));

    let result = session.stress(3).await;
    assert_eq!(result.total, 3);
    assert_eq!(result.failure_count(), 3);
    assert_eq!(result.timeouts(), 3);
    assert_eq!(result.latency.count, 0);
    assert!(result.elapsed < Duration::from_secs(2));
    assert!(result.to_string().contains("Failures=3 (3 timed out)"));
}

#[tokio::test]
async fn burst_writes_generated_keys() {
    let store = Store::new();
    let session = Session::new(spawn_service(store.clone()));

    let result = session.stress_test("4").await.unwrap();
    assert_eq!(result.failure_count(), 0);
    assert_eq!(store.len(), 4);
    let resp = store.fetch(&GetRequest {
        key: "key-2".into(),
    });
    assert_eq!(resp.value, Some(ResponseValue::Text("value-2".into())));
}

#[tokio::test]
async fn bad_burst_count_sends_nothing() {
    let session = Session::new(FlakyStorage::new(&[]));

    for input in ["-3", "abc"] {
        let err = session.stress_test(input).await.unwrap_err();
        assert!(matches!(err, HarnessError::InvalidInput(_)));
    }
    assert_eq!(session.close().calls(), 0);
}
