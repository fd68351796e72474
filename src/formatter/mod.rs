//! JSON output for the command-line tool
//!
//! Documents are rendered in their wire form (dates as `{"$date": millis}`,
//! ObjectIds as hex strings), so the output can be fed back as command input.
//! Colors are only applied to pretty output.

use bson::{Bson, Document};
use colored_json::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::codec;
use crate::config::DisplayConfig;
use crate::error::Result;

/// JSON formatter with pretty printing support
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    pretty: bool,
    indent: usize,
    use_colors: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    ///
    /// # Arguments
    /// * `pretty` - Enable pretty printing
    /// * `use_colors` - Enable colored output
    /// * `indent` - Spaces per level in pretty mode
    pub fn new(pretty: bool, use_colors: bool, indent: usize) -> Self {
        Self {
            pretty,
            indent,
            use_colors,
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.pretty, config.color_output, 2)
    }

    pub fn format_document(&self, doc: &Document) -> Result<String> {
        self.format_value(&codec::document_to_wire(doc))
    }

    pub fn format_documents(&self, docs: &[Document]) -> Result<String> {
        let values: Vec<Value> = docs.iter().map(codec::document_to_wire).collect();
        self.format_value(&Value::Array(values))
    }

    pub fn format_bson(&self, value: &Bson) -> Result<String> {
        self.format_value(&codec::to_wire(value))
    }

    /// Render any serializable value
    pub fn format_value<T: Serialize>(&self, value: &T) -> Result<String> {
        if !self.pretty {
            return Ok(serde_json::to_string(value)?);
        }

        let json_str = self.to_pretty_string(value)?;
        if self.use_colors {
            Ok(json_str.to_colored_json_auto().unwrap_or(json_str))
        } else {
            Ok(json_str)
        }
    }

    fn to_pretty_string<T: Serialize>(&self, value: &T) -> Result<String> {
        let mut buf = Vec::new();
        let indent = " ".repeat(self.indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        value.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new(true, false, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{DateTime, doc, oid::ObjectId};

    #[test]
    fn test_compact_is_single_line() {
        let formatter = JsonFormatter::new(false, false, 2);
        let result = formatter
            .format_document(&doc! { "name": "test", "value": 42 })
            .unwrap();

        assert_eq!(result, r#"{"name":"test","value":42}"#);
    }

    #[test]
    fn test_pretty_uses_indent() {
        let formatter = JsonFormatter::new(true, false, 4);
        let result = formatter.format_document(&doc! { "a": 1 }).unwrap();
        assert_eq!(result, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_extended_types_in_wire_form() {
        let formatter = JsonFormatter::new(false, false, 2);
        let oid = ObjectId::parse_str("65705d84dfc3f3b5094e1f72").unwrap();
        let result = formatter
            .format_document(&doc! {
                "_id": oid,
                "at": DateTime::from_millis(1_701_862_788_373_i64),
                "big": 9_007_199_254_740_993_i64,
            })
            .unwrap();

        assert!(result.contains(r#""_id":"65705d84dfc3f3b5094e1f72""#));
        assert!(result.contains(r#""$date":1701862788373"#));
        assert!(result.contains(r#""big":9007199254740993"#));
    }

    #[test]
    fn test_document_list() {
        let formatter = JsonFormatter::new(false, false, 2);
        let result = formatter
            .format_documents(&[doc! { "a": 1 }, doc! { "a": 2 }])
            .unwrap();
        assert_eq!(result, r#"[{"a":1},{"a":2}]"#);
    }

    #[test]
    fn test_colors_only_when_pretty() {
        let formatter = JsonFormatter::new(false, true, 2);
        let result = formatter.format_value(&serde_json::json!({ "a": 1 })).unwrap();
        assert_eq!(result, r#"{"a":1}"#);
    }
}
