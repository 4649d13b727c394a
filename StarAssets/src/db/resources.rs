//! Resource documents
//!
//! Asset JSON files allow `//` line comments, which are stripped before
//! parsing. Every parsed document carries its own virtual path under
//! [`PATH_FIELD`] so relative references inside it can be resolved later.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field injected into every parsed resource.
pub const PATH_FIELD: &str = "__path__";

/// Resources of one extension keyed by their id field, in index order.
pub type ResourceIndex = IndexMap<String, ResourceRecord>;

/// A parsed JSON object stamped with its virtual path.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    fields: Map<String, Value>,
}

impl ResourceRecord {
    /// Stamp `fields` with `path`.
    pub fn new(path: &str, mut fields: Map<String, Value>) -> Self {
        fields.insert(PATH_FIELD.to_string(), Value::String(path.to_string()));
        Self { fields }
    }

    /// Virtual path the record was loaded from.
    pub fn path(&self) -> &str {
        self.fields
            .get(PATH_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// A field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// A string field value.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// All fields, including [`PATH_FIELD`].
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert into a JSON object value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// The record's key under `id_field`.
    ///
    /// Strings are used as-is and numbers by their decimal text.
    pub fn id(&self, id_field: &str) -> Option<String> {
        match self.fields.get(id_field)? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// Remove `//` comments that start outside a string literal, line by line.
///
/// ```
/// use starassets::db::strip_line_comments;
///
/// let text = "{\"url\": \"http://x\" // note\n}";
/// assert_eq!(strip_line_comments(text), "{\"url\": \"http://x\" \n}");
/// ```
pub fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&line[..comment_start(line).unwrap_or(line.len())]);
    }
    out
}

fn comment_start(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
        } else if byte == b'"' {
            in_string = true;
        } else if byte == b'/' && bytes.get(i + 1) == Some(&b'/') {
            return Some(i);
        }
    }
    None
}

/// Parse a resource document from raw bytes.
pub fn parse_record(path: &str, bytes: &[u8]) -> Result<ResourceRecord> {
    let failure = |cause: String| Error::ResourceParseFailure {
        path: path.to_string(),
        cause,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| failure(e.to_string()))?;
    let value: Value =
        serde_json::from_str(&strip_line_comments(text)).map_err(|e| failure(e.to_string()))?;

    match value {
        Value::Object(fields) => Ok(ResourceRecord::new(path, fields)),
        other => Err(failure(format!("expected a JSON object, found {}", json_kind(&other)))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
