use std::fmt;

use bson::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec;

/// A single entry of the `errors` list returned by the service.
///
/// Known fields are typed; anything else the server attaches is kept in
/// `extra` so that nothing is lost when the error is reported back.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "exceptionClass", skip_serializing_if = "Option::is_none")]
    pub exception_class: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorDescriptor {
    /// Build a descriptor that only carries a message.
    ///
    /// Used for errors synthesized on the client side (transport failures,
    /// authentication failures, unexpected HTTP status codes).
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Human readable summary: `CODE: message`, or whichever part exists.
    pub fn summary(&self) -> String {
        match (&self.error_code, &self.message) {
            (Some(code), Some(msg)) => format!("{code}: {msg}"),
            (Some(code), None) => code.clone(),
            (None, Some(msg)) => msg.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

/// Structured report of a failed command.
///
/// This is intended to be serialized to JSON and consumed by other
/// components (logging, CLI output).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub(crate) error_type: String,
    pub(crate) command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) errors: Vec<ErrorDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) status: Option<Value>,
}

impl ErrorReport {
    pub(crate) fn new(
        error_type: &str,
        command: &str,
        errors: &[ErrorDescriptor],
        status: Option<&Document>,
    ) -> Self {
        Self {
            error_type: error_type.to_string(),
            command: command.to_string(),
            errors: errors.to_vec(),
            status: status.map(codec::document_to_wire),
        }
    }

    /// Convert the report to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert the report to a compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Format a command failure the way the service's own clients do:
/// the command name, the JSON error list, and the status when present.
pub fn format_command_failure(
    f: &mut fmt::Formatter<'_>,
    command_name: &str,
    errors: &[ErrorDescriptor],
    status: Option<&Document>,
) -> fmt::Result {
    let errors_json = serde_json::to_string(errors).map_err(|_| fmt::Error)?;
    write!(
        f,
        "Command \"{command_name}\" failed with the following errors: {errors_json}"
    )?;

    if let Some(status) = status {
        let status_json =
            serde_json::to_string(&codec::document_to_wire(status)).map_err(|_| fmt::Error)?;
        write!(f, ", status: {status_json}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_descriptor_keeps_unknown_fields() {
        let raw = serde_json::json!({
            "message": "Document already exists with the given _id",
            "errorCode": "DOCUMENT_ALREADY_EXISTS",
            "family": "REQUEST"
        });

        let desc: ErrorDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(desc.error_code.as_deref(), Some("DOCUMENT_ALREADY_EXISTS"));
        assert_eq!(desc.extra.get("family"), Some(&Value::from("REQUEST")));
        assert_eq!(
            desc.summary(),
            "DOCUMENT_ALREADY_EXISTS: Document already exists with the given _id"
        );
    }

    #[test]
    fn test_report_json() {
        let errors = vec![ErrorDescriptor::with_message("boom")];
        let status = doc! { "insertedIds": ["a"] };
        let report = ErrorReport::new("dataapi.command_error", "insertMany", &errors, Some(&status));

        let json = report.to_json_compact().unwrap();
        assert!(json.contains("\"type\":\"dataapi.command_error\""));
        assert!(json.contains("\"insertedIds\":[\"a\"]"));
    }
}
