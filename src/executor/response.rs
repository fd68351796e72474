//! Response type of the command API

use bson::{Bson, Document};
use serde_json::Value;

use crate::codec;
use crate::error::{CommandError, ErrorDescriptor, Result};

/// A decoded response: `{ status?, data?, errors }`.
///
/// A response is erroneous iff `errors` is non-empty. `status` and `data`
/// may still carry partial results alongside errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: Option<Document>,
    pub data: Option<Document>,
    pub errors: Vec<ErrorDescriptor>,
}

impl ApiResponse {
    /// Decode a JSON response body.
    ///
    /// An `errors` entry that does not fit the descriptor shape is kept as
    /// its raw JSON text in `message`.
    pub fn from_body(body: Option<Value>) -> Self {
        let Some(Value::Object(mut map)) = body else {
            return Self::default();
        };

        let errors = match map.remove("errors") {
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| {
                    serde_json::from_value(item.clone())
                        .unwrap_or_else(|_| ErrorDescriptor::with_message(item.to_string()))
                })
                .collect(),
            _ => Vec::new(),
        };

        Self {
            status: codec::deserialize(map.remove("status")),
            data: codec::deserialize(map.remove("data")),
            errors,
        }
    }

    /// A response carrying a single client-side error.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            errors: vec![ErrorDescriptor::with_message(message)],
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Raise a [`CommandError`] if the response is erroneous
    ///
    /// # Arguments
    /// * `command` - The command document as sent, attached to the error
    ///
    /// # Returns
    /// * `Result<ApiResponse>` - The response itself when it has no errors
    pub fn ensure_ok(self, command: Document) -> Result<Self> {
        if self.is_error() {
            Err(CommandError::new(command, self).into())
        } else {
            Ok(self)
        }
    }

    /// Integer field of `status` (any numeric type).
    pub fn status_count(&self, key: &str) -> Option<i64> {
        self.status.as_ref().and_then(|s| as_i64(s.get(key)?))
    }

    /// Boolean field of `status`, false when absent.
    pub fn status_flag(&self, key: &str) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.get_bool(key).ok())
            .unwrap_or(false)
    }

    /// Array field of `status`, empty when absent.
    pub fn status_array(&self, key: &str) -> Vec<Bson> {
        self.status
            .as_ref()
            .and_then(|s| s.get_array(key).ok())
            .cloned()
            .unwrap_or_default()
    }

    /// `data.document`, if the server returned one.
    pub fn data_document(&self) -> Option<Document> {
        self.data
            .as_ref()
            .and_then(|d| d.get_document("document").ok())
            .cloned()
    }

    /// `data.documents`, empty when absent.
    pub fn data_documents(&self) -> Vec<Document> {
        self.data
            .as_ref()
            .and_then(|d| d.get_array("documents").ok())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|b| b.as_document().cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// `data.nextPageState`, `None` when absent or null.
    pub fn next_page_state(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.get_str("nextPageState").ok())
            .map(str::to_string)
    }
}

pub(crate) fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
}
