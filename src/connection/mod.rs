//! Connection strategies for the JSON command API
//!
//! A strategy owns the HTTP machinery and turns a [`RequestInfo`] into a
//! [`RawResponse`]. Two are provided:
//! - [`PooledStrategy`]: a keep-alive pool of HTTP/1.1 connections
//! - [`SessionStrategy`]: one multiplexed HTTP/2 session, revived when the
//!   peer drops it
//!
//! Both bound every request with a timeout and log payloads under the
//! `dataapi::wire` target.

pub mod http1;
pub mod http2;
#[cfg(test)]
pub(crate) mod mock;

pub use http1::PooledStrategy;
pub use http2::SessionStrategy;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, trace};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result};

/// Tracing target for request and response payloads.
pub const WIRE_TARGET: &str = "dataapi::wire";

/// Value of the `X-Requested-With` and `User-Agent` headers.
pub const REQUESTED_WITH: &str = concat!("dataapi/", env!("CARGO_PKG_VERSION"));

/// One outbound command request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub url: String,
    /// Wire JSON of the command document
    pub payload: Value,
    pub token: String,
    pub auth_header: String,
    pub timeout: Duration,
}

/// Status code and decoded JSON body of a response.
///
/// An empty body decodes as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<Value>,
}

/// Failure to obtain a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response within the request timeout
    Timeout,

    /// The strategy was closed by the caller
    Closed,

    /// The connection could not be established or was lost
    Connection(String),

    /// Any other failure while sending or reading
    Request(String),

    /// The body was not JSON
    InvalidBody(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "Request timed out"),
            TransportError::Closed => write!(f, "Cannot make request when client is closed"),
            TransportError::Connection(msg) => write!(f, "Connection failed: {msg}"),
            TransportError::Request(msg) => write!(f, "Request failed: {msg}"),
            TransportError::InvalidBody(body) => {
                write!(f, "Unable to parse response as JSON, got: \"{body}\"")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// Transport abstraction used by the command executor.
///
/// Implementations must be shareable across tasks; the executor holds one
/// behind an `Arc` and clones that freely.
#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    /// Send one request and wait for its response.
    async fn request(&self, info: RequestInfo) -> std::result::Result<RawResponse, TransportError>;

    /// Stop accepting requests. Terminal.
    fn close(&self);

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Build the strategy selected by the configuration.
///
/// # Arguments
/// * `config` - Connection settings; `use_http2` picks the session strategy
///
/// # Returns
/// * `Result<Arc<dyn ConnectionStrategy>>` - The strategy or a client build error
pub fn build_strategy(config: &ConnectionConfig) -> Result<Arc<dyn ConnectionStrategy>> {
    if config.use_http2 {
        Ok(Arc::new(SessionStrategy::new(config)?))
    } else {
        Ok(Arc::new(PooledStrategy::new(config)?))
    }
}

/// Shared builder settings for both strategies.
fn client_builder(config: &ConnectionConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(REQUESTED_WITH)
        .pool_idle_timeout(config.idle_timeout())
        .gzip(true)
}

fn build_error(err: reqwest::Error) -> ConnectionError {
    ConnectionError::ClientBuild(err.to_string())
}

/// POST one request through `client`, bounded by `info.timeout`.
pub(crate) async fn send(
    client: &reqwest::Client,
    info: RequestInfo,
) -> std::result::Result<RawResponse, TransportError> {
    if tracing::enabled!(target: WIRE_TARGET, Level::TRACE) {
        let pretty = serde_json::to_string_pretty(&info.payload).unwrap_or_default();
        trace!(target: WIRE_TARGET, "--- request POST {} {}", info.url, pretty);
    }

    let timeout = info.timeout;
    let url = info.url.clone();
    let exchange = async move {
        let response = client
            .post(&info.url)
            .header(info.auth_header.as_str(), info.token.as_str())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Requested-With", REQUESTED_WITH)
            .body(info.payload.to_string())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        Ok::<_, TransportError>((status, text))
    };

    let (status, text) = match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result?,
        Err(_) => return Err(TransportError::Timeout),
    };

    let body = if text.trim().is_empty() {
        None
    } else {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(_) => {
                error!(status, url = %url, "response body is not JSON");
                return Err(TransportError::InvalidBody(text));
            }
        }
    };

    if tracing::enabled!(target: WIRE_TARGET, Level::TRACE) {
        let pretty = body
            .as_ref()
            .and_then(|b| serde_json::to_string_pretty(b).ok())
            .unwrap_or_default();
        trace!(target: WIRE_TARGET, "--- response {} POST {} {}", status, url, pretty);
    }

    Ok(RawResponse { status, body })
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() || err.is_body() {
        // hyper reports a dropped session as a request or body error
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}
