//! Public client API
//!
//! [`Client`] owns the connection strategy. [`Db`] and [`Collection`] are
//! cheap handles that share it and only differ in the URL scope of the
//! commands they send.
//!
//! # Example
//!
//! ```rust,no_run
//! use bson::doc;
//! use dataapi::client::{Client, ConnectOptions};
//!
//! # async fn run() -> dataapi::Result<()> {
//! let client = Client::connect(
//!     "http://localhost:8181/v1/testks?applicationToken=secret",
//!     ConnectOptions::default(),
//! )?;
//! let users = client.collection("users");
//! users.insert_one(doc! { "name": "Ada" }).await?;
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod db;
pub mod options;

pub use collection::Collection;
pub use db::Db;
pub use options::*;

use std::sync::Arc;
use tracing::info;

use crate::config::ConnectionConfig;
use crate::config::uri::parse_uri;
use crate::connection::{ConnectionStrategy, build_strategy};
use crate::error::{ConfigError, Result};
use crate::executor::CommandExecutor;

/// Overrides applied on top of a connection URI
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Takes precedence over `applicationToken` in the URI
    pub token: Option<String>,
    /// Takes precedence over the path segments of the URI
    pub base_api_path: Option<String>,
    /// Header carrying the token; `Token` when unset
    pub auth_header: Option<String>,
    pub timeout_ms: Option<u64>,
    /// HTTP/2 sessions unless set to `false`
    pub use_http2: Option<bool>,
    pub log_skipped_options: bool,
}

/// Entry point to the service
#[derive(Debug, Clone)]
pub struct Client {
    root: CommandExecutor,
    config: ConnectionConfig,
}

impl Client {
    /// Create a client from validated connection settings
    ///
    /// # Arguments
    /// * `config` - Base URL, token, default keyspace and transport settings
    ///
    /// # Returns
    /// * `Result<Self>` - The client, or a configuration error; no request
    ///   is sent
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let strategy = build_strategy(&config)?;
        info!(
            base_url = %config.base_url,
            keyspace = %config.keyspace,
            http2 = config.use_http2,
            "client created"
        );
        Ok(Self::with_strategy(strategy, config))
    }

    /// Create a client on top of a custom connection strategy
    pub fn with_strategy(strategy: Arc<dyn ConnectionStrategy>, config: ConnectionConfig) -> Self {
        Self {
            root: CommandExecutor::new(strategy, &config),
            config,
        }
    }

    /// Create a client from a URI such as
    /// `http://localhost:8181/v1/testks?applicationToken=abc`
    ///
    /// The last path segment is the default keyspace.
    pub fn connect(uri: &str, options: ConnectOptions) -> Result<Self> {
        let parsed = parse_uri(uri)?;
        let token = options
            .token
            .or(parsed.token)
            .ok_or_else(|| ConfigError::MissingField("applicationToken".to_string()))?;

        let defaults = ConnectionConfig::default();
        let config = ConnectionConfig {
            base_url: parsed.base_url,
            base_api_path: options.base_api_path.or(parsed.base_api_path),
            keyspace: parsed.keyspace,
            token,
            auth_header: options.auth_header.unwrap_or(defaults.auth_header.clone()),
            timeout_ms: options.timeout_ms.unwrap_or(defaults.timeout_ms),
            use_http2: options.use_http2.unwrap_or(defaults.use_http2),
            log_skipped_options: options.log_skipped_options,
            ..defaults
        };
        Self::new(config)
    }

    /// Handle on a keyspace
    pub fn db(&self, name: impl Into<String>) -> Db {
        Db::new(&self.root, name)
    }

    /// Handle on the keyspace named in the configuration
    pub fn default_db(&self) -> Db {
        self.db(self.config.keyspace.as_str())
    }

    /// Default keyspace name
    pub fn namespace(&self) -> &str {
        &self.config.keyspace
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Close the connection. Requests made afterwards fail with
    /// `ConnectionError::Closed`, including those of existing handles.
    pub fn close(&self) {
        self.root.close();
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_closed()
    }

    /* ========================= Default keyspace shortcuts ========================= */

    pub fn collection(&self, name: impl Into<String>) -> Collection {
        self.default_db().collection(name)
    }

    pub async fn create_collection(
        &self,
        name: &str,
        options: CreateCollectionOptions,
    ) -> Result<Collection> {
        self.default_db().create_collection(name, options).await
    }

    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        self.default_db().drop_collection(name).await
    }

    /// Names of the collections of the default keyspace
    pub async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        self.default_db().list_collections(true).await
    }
}

#[cfg(test)]
mod tests;
