//! Error handling for data API operations.
//!
//! This module provides:
//! - The crate-wide [`DataApiError`] type and its specific error kinds
//! - Structured descriptors for errors reported by the remote service
//! - Consistent JSON error reports for logging and diagnostics
//!
//! # Example
//!
//! ```rust,no_run
//! use dataapi::error::{DataApiError, Result};
//!
//! fn report(err: &DataApiError) {
//!     if let DataApiError::Command(cmd) = err {
//!         println!("{}", cmd.report().to_json_pretty().unwrap_or_default());
//!     }
//! }
//! ```

pub mod api;
pub mod kinds;

// Re-export commonly used types
pub use api::{ErrorDescriptor, ErrorReport};
pub use kinds::{
    ClientError, CommandError, ConfigError, ConnectionError, CursorError, DataApiError,
    InsertManyOrderedError, Result, TimeoutError,
};
