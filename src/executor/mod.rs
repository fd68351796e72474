//! Command execution engine
//!
//! This module turns [`Command`]s into requests and responses:
//! - Option filtering against each command's allow-list
//! - URL composition from base URL, API path, keyspace and collection
//! - Transport through the configured [`ConnectionStrategy`]
//! - Classification of the outcome into an [`ApiResponse`]
//!
//! Remote failures never surface as `Err` here: they come back as a
//! response with a non-empty `errors` list, and callers decide whether to
//! raise with [`ApiResponse::ensure_ok`]. Only timeouts and a closed client
//! are errors.

pub mod bulk;
pub mod command;
pub mod response;

pub use bulk::{BulkInsertOptions, BulkInsertResult, FailedInsert, MAX_CHUNK_SIZE, bulk_insert};
pub use command::Command;
pub use response::ApiResponse;

use bson::{Bson, Document};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::codec;
use crate::config::ConnectionConfig;
use crate::connection::{ConnectionStrategy, RawResponse, RequestInfo, TransportError};
use crate::error::{ConnectionError, Result, TimeoutError};

/// Message of the first error the service sends for a bad token.
const INVALID_TOKEN_MESSAGE: &str = "UNAUTHENTICATED: Invalid token";

/// Per-call execution options
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Timeout for this call; the configured default when `None`
    pub max_time_ms: Option<u64>,
}

/// Settings shared by every executor scoped from the same client
#[derive(Debug)]
struct ExecutorSettings {
    base_url: String,
    base_api_path: Option<String>,
    token: String,
    auth_header: String,
    timeout: Duration,
    log_skipped_options: bool,
}

/// Executes commands against one keyspace or collection.
///
/// Clones are cheap and share the connection strategy.
#[derive(Clone)]
pub struct CommandExecutor {
    strategy: Arc<dyn ConnectionStrategy>,
    settings: Arc<ExecutorSettings>,
    keyspace: Option<String>,
    collection: Option<String>,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("base_url", &self.settings.base_url)
            .field("keyspace", &self.keyspace)
            .field("collection", &self.collection)
            .finish()
    }
}

impl CommandExecutor {
    /// Create an executor addressing the API root
    ///
    /// # Arguments
    /// * `strategy` - Transport shared by all scoped executors
    /// * `config` - Base URL, token, header name and default timeout
    pub fn new(strategy: Arc<dyn ConnectionStrategy>, config: &ConnectionConfig) -> Self {
        let base_api_path = config
            .base_api_path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            strategy,
            settings: Arc::new(ExecutorSettings {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                base_api_path,
                token: config.token.clone(),
                auth_header: config.auth_header.clone(),
                timeout: config.request_timeout(),
                log_skipped_options: config.log_skipped_options,
            }),
            keyspace: None,
            collection: None,
        }
    }

    /// Same transport, scoped to a keyspace
    pub fn with_keyspace(&self, keyspace: impl Into<String>) -> Self {
        Self {
            keyspace: Some(keyspace.into()),
            collection: None,
            ..self.clone()
        }
    }

    /// Same transport and keyspace, scoped to a collection
    pub fn with_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..self.clone()
        }
    }

    pub fn keyspace(&self) -> Option<&str> {
        self.keyspace.as_deref()
    }

    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    pub fn close(&self) {
        self.strategy.close();
    }

    pub fn is_closed(&self) -> bool {
        self.strategy.is_closed()
    }

    /// URL this executor posts to
    pub fn url(&self) -> String {
        self.url_for(false)
    }

    fn url_for(&self, root: bool) -> String {
        let mut url = self.settings.base_url.clone();
        if let Some(path) = &self.settings.base_api_path {
            url.push('/');
            url.push_str(path);
        }
        if !root {
            for part in [&self.keyspace, &self.collection].into_iter().flatten() {
                url.push('/');
                url.push_str(part);
            }
        }
        url
    }

    /// The command document that will be sent, options filtered
    pub fn prepare(&self, command: &Command) -> Document {
        let mut document = command.to_document();
        self.filter_options(command, &mut document);
        document
    }

    /// Execute a command and classify the outcome
    ///
    /// # Arguments
    /// * `command` - The command to send
    /// * `options` - Per-call options (timeout)
    ///
    /// # Returns
    /// * `Result<ApiResponse>` - The response, erroneous or not; `Err` only
    ///   for a timeout or a closed client
    pub async fn execute_command(
        &self,
        command: &Command,
        options: ExecuteOptions,
    ) -> Result<ApiResponse> {
        let document = self.prepare(command);
        self.send(command, document, options).await.map(|(_, r)| r)
    }

    /// Execute a command and raise on a non-empty `errors` list
    pub async fn execute_checked(
        &self,
        command: &Command,
        options: ExecuteOptions,
    ) -> Result<ApiResponse> {
        let document = self.prepare(command);
        let (document, response) = self.send(command, document, options).await?;
        response.ensure_ok(document)
    }

    async fn send(
        &self,
        command: &Command,
        document: Document,
        options: ExecuteOptions,
    ) -> Result<(Document, ApiResponse)> {
        if self.strategy.is_closed() {
            return Err(ConnectionError::Closed.into());
        }

        let url = self.url_for(command.is_root_command());
        let timeout = options
            .max_time_ms
            .map(Duration::from_millis)
            .unwrap_or(self.settings.timeout);
        debug!(command = command.name(), url = %url, "executing command");

        let info = RequestInfo {
            url: url.clone(),
            payload: codec::document_to_wire(&document),
            token: self.settings.token.clone(),
            auth_header: self.settings.auth_header.clone(),
            timeout,
        };

        let response = match self.strategy.request(info).await {
            Ok(raw) => classify(raw, &url, &document),
            Err(TransportError::Timeout) => {
                return Err(TimeoutError { command: document }.into());
            }
            Err(TransportError::Closed) => return Err(ConnectionError::Closed.into()),
            Err(e) => {
                error!(command = command.name(), url = %url, error = %e, "request failed");
                ApiResponse::from_error(e.to_string())
            }
        };

        Ok((document, response))
    }

    /// Drop option keys the command does not accept.
    fn filter_options(&self, command: &Command, document: &mut Document) {
        let name = command.name();
        let allowed = command.allowed_options();

        let Some(Bson::Document(payload)) = document.get_mut(name) else {
            return;
        };
        let Some(Bson::Document(options)) = payload.get_mut("options") else {
            return;
        };

        let dropped: Vec<String> = options
            .keys()
            .filter(|k| !allowed.contains(&k.as_str()))
            .cloned()
            .collect();
        for key in dropped {
            if self.settings.log_skipped_options {
                warn!("'{name}' does not support option '{key}'");
            }
            options.remove(&key);
        }

        if options.is_empty() {
            payload.remove("options");
        }
    }
}

/// Turn a raw HTTP response into an [`ApiResponse`].
fn classify(raw: RawResponse, url: &str, command: &Document) -> ApiResponse {
    let response = ApiResponse::from_body(raw.body);

    let bad_token = response
        .errors
        .first()
        .and_then(|e| e.message.as_deref())
        .is_some_and(|m| m == INVALID_TOKEN_MESSAGE);
    if raw.status == 401 || bad_token {
        return ApiResponse::from_error("Authentication failed; is your token valid?");
    }

    if raw.status != 200 {
        error!(
            status = raw.status,
            url = %url,
            payload = %codec::serialize_command(command, false),
            "unexpected response status"
        );
        return ApiResponse::from_error(format!("Server response received : {}!", raw.status));
    }

    response
}
