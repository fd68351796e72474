//! Scripted strategy for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{ConnectionStrategy, RawResponse, RequestInfo, TransportError};
use crate::config::ConnectionConfig;
use crate::executor::CommandExecutor;

type Responder = dyn Fn(usize, &Value) -> Result<RawResponse, TransportError> + Send + Sync;

/// Answers each request with a closure of (call index, payload).
pub(crate) struct MockStrategy {
    responder: Box<Responder>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RequestInfo>>,
    closed: AtomicBool,
}

impl MockStrategy {
    pub(crate) fn new(
        responder: impl Fn(usize, &Value) -> Result<RawResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// Always answer 200 with `body`.
    pub(crate) fn replying(body: Value) -> Arc<Self> {
        Self::new(move |_, _| Ok(ok(body.clone())))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<RequestInfo> {
        self.requests.lock().clone()
    }

    /// Payloads sent so far, in order.
    pub(crate) fn payloads(&self) -> Vec<Value> {
        self.requests.lock().iter().map(|r| r.payload.clone()).collect()
    }

    /// Executor scoped to `ks/coll` on top of this strategy.
    pub(crate) fn collection_executor(self: &Arc<Self>) -> CommandExecutor {
        let config = ConnectionConfig {
            base_url: "http://mock".to_string(),
            base_api_path: Some("v1".to_string()),
            token: "token".to_string(),
            ..ConnectionConfig::default()
        };
        let strategy: Arc<dyn ConnectionStrategy> = self.clone();
        CommandExecutor::new(strategy, &config)
            .with_keyspace("ks")
            .with_collection("coll")
    }
}

/// A 200 response with the given body.
pub(crate) fn ok(body: Value) -> RawResponse {
    RawResponse {
        status: 200,
        body: Some(body),
    }
}

#[async_trait]
impl ConnectionStrategy for MockStrategy {
    async fn request(&self, info: RequestInfo) -> Result<RawResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        let payload = info.payload.clone();
        self.requests.lock().push(info);
        // let other workers interleave, like a real network call would
        tokio::task::yield_now().await;
        (self.responder)(index, &payload)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
