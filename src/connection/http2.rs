//! Single multiplexed HTTP/2 session
//!
//! The session lives in a slot guarded by a synchronous mutex. Requests take
//! a handle out of the slot and release the lock before awaiting, so
//! checking the slot and installing a replacement never straddle an await.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ConnectionStrategy, RawResponse, RequestInfo, TransportError, build_error, send};
use crate::config::ConnectionConfig;
use crate::error::Result;

/// State of the session slot.
#[derive(Debug)]
enum SessionSlot {
    /// A usable session and the generation it was opened as
    Live(reqwest::Client, u64),

    /// The peer dropped the session; the next request opens a new one
    ClosedByPeer,

    /// `close()` was called; no new sessions are opened
    ClosedByUser,
}

/// HTTP/2 session strategy.
#[derive(Debug)]
pub struct SessionStrategy {
    slot: Mutex<SessionState>,
    config: ConnectionConfig,
}

#[derive(Debug)]
struct SessionState {
    slot: SessionSlot,
    generation: u64,
}

impl SessionStrategy {
    /// Open a session strategy
    ///
    /// `http://` origins speak HTTP/2 with prior knowledge; `https://`
    /// origins negotiate it through ALPN.
    ///
    /// # Arguments
    /// * `config` - Connection settings
    ///
    /// # Returns
    /// * `Result<Self>` - The strategy or a client build error
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let client = open_session(config).map_err(build_error)?;

        Ok(Self {
            slot: Mutex::new(SessionState {
                slot: SessionSlot::Live(client, 1),
                generation: 1,
            }),
            config: config.clone(),
        })
    }

    /// Take a handle to the current session, reopening it if the peer
    /// closed it.
    fn acquire(&self) -> std::result::Result<(reqwest::Client, u64), TransportError> {
        let mut state = self.slot.lock();
        match &state.slot {
            SessionSlot::Live(client, generation) => Ok((client.clone(), *generation)),
            SessionSlot::ClosedByUser => Err(TransportError::Closed),
            SessionSlot::ClosedByPeer => {
                let client = open_session(&self.config)
                    .map_err(|e| TransportError::Connection(e.to_string()))?;
                state.generation += 1;
                let generation = state.generation;
                debug!(generation, "reopened HTTP/2 session");
                state.slot = SessionSlot::Live(client.clone(), generation);
                Ok((client, generation))
            }
        }
    }

    /// Mark the session lost, unless a newer one already replaced it.
    fn mark_lost(&self, generation: u64) {
        let mut state = self.slot.lock();
        if let SessionSlot::Live(_, current) = state.slot {
            if current == generation {
                warn!(generation, "HTTP/2 session closed by peer");
                state.slot = SessionSlot::ClosedByPeer;
            }
        }
    }

    #[cfg(test)]
    fn generation(&self) -> Option<u64> {
        match self.slot.lock().slot {
            SessionSlot::Live(_, generation) => Some(generation),
            _ => None,
        }
    }
}

fn open_session(config: &ConnectionConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = super::client_builder(config).pool_max_idle_per_host(1);
    if config.base_url.starts_with("http://") {
        builder = builder.http2_prior_knowledge();
    }
    builder.build()
}

#[async_trait]
impl ConnectionStrategy for SessionStrategy {
    async fn request(&self, info: RequestInfo) -> std::result::Result<RawResponse, TransportError> {
        let (client, generation) = self.acquire()?;

        let result = send(&client, info).await;
        if let Err(TransportError::Connection(_)) = &result {
            self.mark_lost(generation);
        }
        result
    }

    fn close(&self) {
        let mut state = self.slot.lock();
        state.slot = SessionSlot::ClosedByUser;
    }

    fn is_closed(&self) -> bool {
        matches!(self.slot.lock().slot, SessionSlot::ClosedByUser)
    }
}
