use std::{fmt, io};

use bson::{Bson, Document};

use crate::error::api::{ErrorReport, format_command_failure};
use crate::executor::ApiResponse;
use crate::executor::bulk::FailedInsert;

/// Crate-wide `Result` type using [`DataApiError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DataApiError>;

/// Top-level error type for data API operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum DataApiError {
    /// Connection-related errors.
    Connection(ConnectionError),

    /// Configuration errors, raised before any I/O.
    Config(ConfigError),

    /// The server answered with a non-empty `errors` list.
    Command(Box<CommandError>),

    /// No response arrived within the configured duration.
    Timeout(TimeoutError),

    /// The response broke the contract of the calling operation.
    Client(ClientError),

    /// Cursor misuse or a failure while consuming a cursor.
    Cursor(CursorError),

    /// An ordered `insertMany` stopped part way through.
    InsertManyOrdered(Box<InsertManyOrderedError>),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Connection-specific errors.
#[derive(Debug)]
pub enum ConnectionError {
    /// The HTTP client could not be constructed.
    ClientBuild(String),

    /// Invalid connection URI.
    InvalidUri(String),

    /// The client was closed explicitly; no new requests are accepted.
    Closed,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },

    /// `ordered` combined with a parallelism other than one.
    OrderedWithParallel(usize),

    /// More documents than a single command accepts.
    BatchTooLarge { max: usize, actual: usize },
}

/// A command the server rejected, with everything it sent back.
#[derive(Debug)]
pub struct CommandError {
    /// The command document as it was sent.
    pub command: Document,

    /// The full response, including any partial `status` or `data`.
    pub response: ApiResponse,
}

/// A command that did not complete in time.
///
/// The server may still have applied it.
#[derive(Debug)]
pub struct TimeoutError {
    pub command: Document,
}

/// Client-side contract violations, such as a bounded update that
/// reports more matching documents than it processed.
#[derive(Debug)]
pub struct ClientError {
    pub message: String,
    pub command: Document,
}

/// Cursor-specific errors.
#[derive(Debug)]
pub enum CursorError {
    /// A configuration method was called after the first fetch.
    AlreadyInitialized,

    /// A mapping function failed.
    Mapping(String),
}

/// Failure of an ordered `insertMany`: what made it in, what did not.
#[derive(Debug)]
pub struct InsertManyOrderedError {
    pub source: CommandError,
    pub inserted_ids: Vec<Bson>,
    pub failed_inserts: Vec<FailedInsert>,
}

/* ========================= Helpers ========================= */

/// Name of a single-key command document, `unknown` when empty.
pub(crate) fn command_name(command: &Document) -> &str {
    command.keys().next().map(String::as_str).unwrap_or("unknown")
}

impl CommandError {
    pub fn new(command: Document, response: ApiResponse) -> Self {
        Self { command, response }
    }

    /// Name of the failed command (e.g. `insertOne`).
    pub fn command_name(&self) -> &str {
        command_name(&self.command)
    }

    /// Structured report suitable for JSON logging.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(
            "dataapi.command_error",
            self.command_name(),
            &self.response.errors,
            self.response.status.as_ref(),
        )
    }
}

impl ClientError {
    pub fn new(message: impl Into<String>, command: Document) -> Self {
        Self {
            message: message.into(),
            command,
        }
    }
}

impl DataApiError {
    /// The command that caused this error, when one is attached.
    pub fn command(&self) -> Option<&Document> {
        match self {
            DataApiError::Command(e) => Some(&e.command),
            DataApiError::Timeout(e) => Some(&e.command),
            DataApiError::Client(e) => Some(&e.command),
            DataApiError::InsertManyOrdered(e) => Some(&e.source.command),
            _ => None,
        }
    }

    /// Whether the operation may have been applied server-side anyway.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DataApiError::Timeout(_))
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DataApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataApiError::Connection(e) => write!(f, "Connection error: {e}"),
            DataApiError::Config(e) => write!(f, "Configuration error: {e}"),
            DataApiError::Command(e) => write!(f, "{e}"),
            DataApiError::Timeout(e) => write!(f, "{e}"),
            DataApiError::Client(e) => write!(f, "{e}"),
            DataApiError::Cursor(e) => write!(f, "Cursor error: {e}"),
            DataApiError::InsertManyOrdered(e) => write!(f, "{e}"),
            DataApiError::Io(e) => write!(f, "I/O error: {e}"),
            DataApiError::Json(e) => write!(f, "JSON error: {e}"),
            DataApiError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ClientBuild(msg) => write!(f, "Failed to build HTTP client: {msg}"),
            ConnectionError::InvalidUri(uri) => write!(f, "Invalid connection URI: {uri}"),
            ConnectionError::Closed => write!(f, "Cannot make request when client is closed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
            ConfigError::OrderedWithParallel(parallel) => write!(
                f,
                "Parallel insert with ordered option is not supported (parallel = {parallel})"
            ),
            ConfigError::BatchTooLarge { max, actual } => {
                write!(f, "Batch of {actual} documents exceeds the maximum of {max}")
            }
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_command_failure(
            f,
            self.command_name(),
            &self.response.errors,
            self.response.status.as_ref(),
        )
    }
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command \"{}\" timed out", command_name(&self.command))
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Command \"{}\" failed with the following error: {}",
            command_name(&self.command),
            self.message
        )
    }
}

impl fmt::Display for CursorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorError::AlreadyInitialized => write!(f, "Cursor has already been initialized"),
            CursorError::Mapping(msg) => write!(f, "Mapping failed: {msg}"),
        }
    }
}

impl fmt::Display for InsertManyOrderedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} inserted, {} failed)",
            self.source,
            self.inserted_ids.len(),
            self.failed_inserts.len()
        )
    }
}

impl std::error::Error for DataApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataApiError::Io(e) => Some(e),
            DataApiError::Json(e) => Some(e),
            DataApiError::InsertManyOrdered(e) => Some(&e.source),
            _ => None,
        }
    }
}
impl std::error::Error for ConnectionError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for CommandError {}
impl std::error::Error for TimeoutError {}
impl std::error::Error for ClientError {}
impl std::error::Error for CursorError {}
impl std::error::Error for InsertManyOrderedError {}

/* ========================= Conversions to DataApiError ========================= */

impl From<io::Error> for DataApiError {
    fn from(err: io::Error) -> Self {
        DataApiError::Io(err)
    }
}

impl From<serde_json::Error> for DataApiError {
    fn from(err: serde_json::Error) -> Self {
        DataApiError::Json(err)
    }
}

impl From<ConnectionError> for DataApiError {
    fn from(err: ConnectionError) -> Self {
        DataApiError::Connection(err)
    }
}

impl From<ConfigError> for DataApiError {
    fn from(err: ConfigError) -> Self {
        DataApiError::Config(err)
    }
}

impl From<CommandError> for DataApiError {
    fn from(err: CommandError) -> Self {
        DataApiError::Command(Box::new(err))
    }
}

impl From<TimeoutError> for DataApiError {
    fn from(err: TimeoutError) -> Self {
        DataApiError::Timeout(err)
    }
}

impl From<ClientError> for DataApiError {
    fn from(err: ClientError) -> Self {
        DataApiError::Client(err)
    }
}

impl From<CursorError> for DataApiError {
    fn from(err: CursorError) -> Self {
        DataApiError::Cursor(err)
    }
}

impl From<InsertManyOrderedError> for DataApiError {
    fn from(err: InsertManyOrderedError) -> Self {
        DataApiError::InsertManyOrdered(Box::new(err))
    }
}

impl From<String> for DataApiError {
    fn from(msg: String) -> Self {
        DataApiError::Generic(msg)
    }
}

impl From<&str> for DataApiError {
    fn from(msg: &str) -> Self {
        DataApiError::Generic(msg.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorDescriptor;
    use bson::doc;

    #[test]
    fn test_command_error_display() {
        let response = ApiResponse {
            status: Some(doc! { "insertedIds": ["1"] }),
            data: None,
            errors: vec![ErrorDescriptor::with_message("duplicate")],
        };
        let err = DataApiError::from(CommandError::new(
            doc! { "insertMany": { "documents": [] } },
            response,
        ));

        let msg = err.to_string();
        assert!(msg.starts_with("Command \"insertMany\" failed with the following errors:"));
        assert!(msg.contains("duplicate"));
        assert!(msg.contains("status: {\"insertedIds\":[\"1\"]}"));
        assert!(err.command().is_some());
    }

    #[test]
    fn test_timeout_carries_command() {
        let err = DataApiError::from(TimeoutError {
            command: doc! { "find": { "filter": {} } },
        });
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Command \"find\" timed out");
        assert_eq!(command_name(err.command().unwrap()), "find");
    }

    #[test]
    fn test_command_name_of_empty_document() {
        assert_eq!(command_name(&Document::new()), "unknown");
    }
}
