//! Request body decoding for the append endpoint.
//!
//! A body is read as JSON unless it is declared form-encoded. An empty body
//! falls back to query-string parameters. Individual fields are never
//! rejected here; coercion to cells happens in [`crate::types::PersistedRow`].

use crate::error::{FormspoolError, Result};
use crate::types::FieldMap;
use serde_json::Value;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// An undecoded submission as it arrived over the wire.
#[derive(Debug, Clone, Default)]
pub struct RawPayload {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub query: Option<String>,
}

impl RawPayload {
    pub fn json(value: &Value) -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            body: value.to_string().into_bytes(),
            query: None,
        }
    }

    pub fn form(encoded: &str) -> Self {
        Self {
            content_type: Some(FORM_CONTENT_TYPE.to_string()),
            body: encoded.as_bytes().to_vec(),
            query: None,
        }
    }

    fn is_form(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false)
    }

    /// Decode into a field map.
    ///
    /// # Errors
    ///
    /// [`FormspoolError::MalformedPayload`] when a non-form body is not valid
    /// JSON. A well-formed JSON value that is not an object decodes to an
    /// empty map and yields a row of blanks.
    pub fn decode(&self) -> Result<FieldMap> {
        if self.is_form() {
            return Ok(parse_form(&self.body));
        }

        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(self
                .query
                .as_deref()
                .map(|q| parse_form(q.as_bytes()))
                .unwrap_or_default());
        }

        let value: Value = serde_json::from_slice(&self.body)
            .map_err(|e| FormspoolError::MalformedPayload(e.to_string()))?;

        match value {
            Value::Object(map) => Ok(map),
            other => {
                tracing::warn!(
                    "[PAYLOAD] expected a JSON object, got {}; storing blanks",
                    json_kind(&other)
                );
                Ok(FieldMap::new())
            }
        }
    }
}

/// Parse `application/x-www-form-urlencoded` pairs. The first occurrence of a
/// repeated key wins.
pub fn parse_form(body: &[u8]) -> FieldMap {
    let mut map = FieldMap::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        if !map.contains_key(key.as_ref()) {
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
    }
    map
}

/// Text coercion for identity and comment columns: falsy values become empty.
pub fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => String::new(),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Numeric coercion for rating columns.
///
/// Returns `None` for anything that should be stored as an empty cell:
/// missing, blank, unparsable, non-finite, or zero.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        Value::Bool(true) => 1.0,
        _ => return None,
    };

    if n.is_finite() && n != 0.0 {
        Some(n)
    } else {
        None
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
