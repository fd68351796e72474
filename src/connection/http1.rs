//! HTTP/1.1 keep-alive pool

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{ConnectionStrategy, RawResponse, RequestInfo, TransportError, build_error, send};
use crate::config::ConnectionConfig;
use crate::error::Result;

/// Pooled HTTP/1.1 strategy.
///
/// Connections are reused across requests and dropped after sitting idle
/// for `pool_idle_timeout_secs`.
#[derive(Debug)]
pub struct PooledStrategy {
    client: reqwest::Client,
    closed: AtomicBool,
}

impl PooledStrategy {
    /// Create a pooled strategy
    ///
    /// # Arguments
    /// * `config` - Connection settings (pool size, idle timeout)
    ///
    /// # Returns
    /// * `Result<Self>` - The strategy or a client build error
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = super::client_builder(config)
            .http1_only()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(build_error)?;

        Ok(Self {
            client,
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ConnectionStrategy for PooledStrategy {
    async fn request(&self, info: RequestInfo) -> std::result::Result<RawResponse, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        send(&self.client, info).await
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
