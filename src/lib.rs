//! Client library for document collections served over a JSON command API
//!
//! Every operation is a single JSON command posted to a keyspace or
//! collection URL. The crate provides:
//!
//! - `client`: the `Client` / `Db` / `Collection` façade
//! - `cursor`: lazy, paginated `find` results
//! - `executor`: command envelopes, response handling and bulk inserts
//! - `connection`: HTTP/1.1 pool and HTTP/2 session strategies
//! - `codec`: conversion between BSON values and their JSON wire form
//! - `config`: configuration file, environment and URI handling
//! - `cli`, `formatter`: the `dataapi` command-line tool
//!
//! # Example
//!
//! ```no_run
//! use bson::doc;
//! use dataapi::{Client, ConnectOptions, FindOptions};
//!
//! #[tokio::main]
//! async fn main() -> dataapi::Result<()> {
//!     let client = Client::connect(
//!         "http://localhost:8181/v1/testks?applicationToken=secret",
//!         ConnectOptions::default(),
//!     )?;
//!
//!     let users = client.collection("users");
//!     let mut cursor = users.find(doc! { "age": { "$gt": 30 } }, FindOptions::default());
//!     while let Some(user) = cursor.next().await? {
//!         println!("{user}");
//!     }
//!
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod ids;

pub use client::{Client, Collection, ConnectOptions, Db};
pub use config::Config;
pub use cursor::{FindCursor, FindOptions};
pub use error::{DataApiError, Result};
pub use executor::{ApiResponse, CommandExecutor};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
