#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use shared_breaker::{
    Breaker, BreakerConfig, MemoryStateStore, OutboundRequest, StateStore, StoreError, Transport,
    TransportError, types::TransportResponse,
};
use tower::ServiceExt;

pub const TARGET_URL: &str = "http://downstream.test/resource";

/// In-process dependency: answers with scripted statuses, then the default.
#[derive(Clone)]
pub struct Downstream {
    hits: Arc<AtomicUsize>,
    script: Arc<Mutex<VecDeque<u16>>>,
    default_status: Arc<Mutex<u16>>,
    body: Arc<Mutex<String>>,
}

impl Downstream {
    pub fn new(default_status: u16, body: &str) -> Self {
        Self {
            hits: Arc::new(AtomicUsize::new(0)),
            script: Arc::new(Mutex::new(VecDeque::new())),
            default_status: Arc::new(Mutex::new(default_status)),
            body: Arc::new(Mutex::new(body.to_string())),
        }
    }

    pub fn healthy() -> Self {
        Self::new(200, r#"{"k":"v"}"#)
    }

    pub fn failing() -> Self {
        Self::new(500, r#"{"error":"boom"}"#)
    }

    pub fn then_statuses(self, statuses: &[u16]) -> Self {
        self.script.lock().unwrap().extend(statuses.iter().copied());
        self
    }

    pub fn set_status(&self, status: u16) {
        *self.default_status.lock().unwrap() = status;
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        let router = Router::new().fallback(respond).with_state(self.clone());
        Arc::new(RouterTransport { router })
    }
}

async fn respond(State(downstream): State<Downstream>) -> (StatusCode, String) {
    downstream.hits.fetch_add(1, Ordering::SeqCst);
    let status = downstream
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| *downstream.default_status.lock().unwrap());
    let body = downstream.body.lock().unwrap().clone();
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body,
    )
}

/// Drives an axum router directly, without sockets, so tests can run on a
/// paused clock.
pub struct RouterTransport {
    router: Router,
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let body = request
            .body
            .clone()
            .map(Body::from)
            .unwrap_or_else(Body::empty);
        let http_request = builder
            .body(body)
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|err| TransportError::Other(err.to_string()))?
            .to_bytes()
            .to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

/// Answers 200 only after `delay`.
pub struct SlowTransport {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn send(&self, _request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(TransportResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: b"{}".to_vec(),
        })
    }
}

/// Store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl StateStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Parse("store unavailable".to_string()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Parse("store unavailable".to_string()))
    }
}

/// Memory store that records every value written.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStateStore,
    writes: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn writes_of(&self, value: &str) -> usize {
        self.writes().iter().filter(|written| *written == value).count()
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.writes.lock().unwrap().push(value.to_string());
        self.inner.set(key, value, ttl).await
    }
}

/// Memory store whose reads can be switched off while writes keep working.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStateStore,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Parse("read timed out".to_string()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set(key, value, ttl).await
    }
}

pub fn fast_config() -> BreakerConfig {
    BreakerConfig {
        timeout: Duration::from_secs(1),
        max_failures: 3,
        open_to_half_open_wait: Duration::from_secs(30),
        half_open_max_success: 2,
        half_open_max_failures: 2,
        retry_intervals: vec![Duration::from_millis(100)],
    }
}

pub async fn breaker_with(
    config: BreakerConfig,
    store: Arc<dyn StateStore>,
    downstream: &Downstream,
) -> Breaker {
    Breaker::with_transport(config, "payments-api", store, downstream.transport()).await
}

pub async fn trip_open(breaker: &Breaker) {
    for _ in 0..breaker.config().max_failures {
        breaker.record_failure().await;
    }
}
