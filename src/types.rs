use crate::payload::{coerce_number, coerce_text};
use crate::schema::{self, COLUMN_COUNT};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw field map as received from a client, keyed by payload field name.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// A single value in a persisted row.
///
/// Empty cells are stored as `Text("")`, matching how spreadsheets represent
/// a blank cell written from a row array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Text(s) if s.is_empty())
    }

    /// Integral values are kept as integers so a rating of 5 is stored as `5`.
    pub fn from_number(n: f64) -> Self {
        if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
            Cell::Integer(n as i64)
        } else {
            Cell::Float(n)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

/// A row as committed to the table: server timestamp plus the business
/// columns in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRow {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Cell>,
}

impl PersistedRow {
    /// Build a row from a client field map.
    ///
    /// Missing fields and values that fail numeric coercion become empty
    /// cells. Any client-supplied `timestamp` is ignored in favour of `now`.
    pub fn from_fields(fields: &FieldMap, now: DateTime<Utc>) -> Self {
        let mut values = Vec::with_capacity(COLUMN_COUNT - 1);

        for key in schema::field_keys() {
            let raw = fields.get(key);
            let cell = if schema::is_question_key(key) {
                raw.and_then(coerce_number)
                    .map(Cell::from_number)
                    .unwrap_or_else(Cell::empty)
            } else {
                Cell::Text(raw.map(coerce_text).unwrap_or_default())
            };
            values.push(cell);
        }

        PersistedRow {
            timestamp: now,
            values,
        }
    }

    /// All sixteen cells in column order, timestamp first.
    pub fn cells(&self) -> Vec<Cell> {
        let mut cells = Vec::with_capacity(COLUMN_COUNT);
        cells.push(Cell::Text(format_timestamp(&self.timestamp)));
        cells.extend(self.values.iter().cloned());
        cells
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The header row as cells.
pub fn header_cells() -> Vec<Cell> {
    schema::HEADERS
        .iter()
        .map(|h| Cell::Text(h.to_string()))
        .collect()
}

/// One form submission as produced and buffered by a client.
///
/// The business fields live in `fields` using their payload names
/// (`studentName`, `q1`, ...). `timestamp` is the client's own submission
/// time and `queued_at` the local enqueue marker; the server ignores both.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeedbackRecord {
    #[serde(flatten)]
    pub fields: FieldMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "_queued_at", default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<String>,
}

impl FeedbackRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a record from a JSON object, keeping only known field names.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FormspoolError::MalformedPayload`] if the value is not
    /// a JSON object.
    pub fn from_json(json: &serde_json::Value) -> crate::error::Result<Self> {
        let obj = json.as_object().ok_or_else(|| {
            crate::error::FormspoolError::MalformedPayload("Expected JSON object".to_string())
        })?;

        let mut record = FeedbackRecord::new();
        for (key, value) in obj {
            if schema::is_field_key(key) {
                record.fields.insert(key.clone(), value.clone());
            }
        }
        record.timestamp = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Ok(record)
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.to_string(), serde_json::Value::String(value.into()));
        self
    }

    pub fn with_rating(mut self, key: &str, value: i64) -> Self {
        self.fields.insert(key.to_string(), serde_json::Value::from(value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Stamp the client-side submission time if the record does not carry one.
    pub fn stamp_submitted(&mut self, now: DateTime<Utc>) {
        if self.timestamp.is_none() {
            self.timestamp = Some(format_timestamp(&now));
        }
    }

    /// Client-side checks applied before a record is queued.
    ///
    /// The server never repeats these: it stores whatever arrives.
    pub fn validate(&self) -> Vec<FieldProblem> {
        let mut problems = Vec::new();

        let text = |key: &str| self.get(key).map(coerce_text).unwrap_or_default();

        let name = text("studentName");
        if name.trim().is_empty() {
            problems.push(FieldProblem::new("studentName", "This field is required."));
        } else if name.trim().chars().count() < 2 {
            problems.push(FieldProblem::new(
                "studentName",
                "Enter your full name (min 2 chars).",
            ));
        }

        let roll = text("rollNumber");
        if roll.trim().is_empty() {
            problems.push(FieldProblem::new("rollNumber", "This field is required."));
        } else if roll.trim().chars().count() < 3 {
            problems.push(FieldProblem::new("rollNumber", "Enter a valid Student ID."));
        }

        for key in schema::QUESTION_FIELDS {
            match self.get(key).and_then(coerce_number) {
                None => problems.push(FieldProblem::new(key, "Please select an option.")),
                Some(n)
                    if n.fract() != 0.0
                        || (n as i64) < schema::RATING_MIN
                        || (n as i64) > schema::RATING_MAX =>
                {
                    problems.push(FieldProblem::new(key, "Rating must be between 1 and 5."))
                }
                Some(_) => {}
            }
        }

        problems
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: String,
    pub message: String,
}

impl FieldProblem {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    Success,
    Error,
}

/// Wire envelope returned by the append endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitResponse {
    pub status: SubmitStatus,
    pub message: String,
}

impl SubmitResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: SubmitStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SubmitStatus::Success
    }
}
