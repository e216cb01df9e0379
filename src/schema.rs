//! Fixed table layout for persisted feedback rows.
//!
//! The column order here is the contract between the append endpoint and the
//! table on disk. Changing it after a table has been created is not supported:
//! the header row is written once and never rewritten.

use serde::{Deserialize, Serialize};

/// Default name of the sheet that receives feedback rows.
pub const DEFAULT_SHEET_NAME: &str = "FeedbackData";

/// Header row, in column order.
pub const HEADERS: [&str; 16] = [
    "Timestamp",
    "Student Name",
    "Roll Number",
    "Mobile Number",
    "College / Institution",
    "Q1 – Overall Quality",
    "Q2 – Course Content",
    "Q3 – Teaching Style",
    "Q4 – Practical Sessions",
    "Q5 – Industry Relevance",
    "Q6 – Study Materials",
    "Q7 – Pace & Duration",
    "Q8 – GenAI Understanding",
    "Q9 – Support & Mentoring",
    "Q10 – Recommendation",
    "Comments",
];

pub const COLUMN_COUNT: usize = HEADERS.len();

/// Payload keys for the free-text identity columns, in column order.
pub const TEXT_FIELDS: [&str; 4] = ["studentName", "rollNumber", "mobileNumber", "college"];

/// Payload keys for the numeric rating columns, in column order.
pub const QUESTION_FIELDS: [&str; 10] = [
    "q1", "q2", "q3", "q4", "q5", "q6", "q7", "q8", "q9", "q10",
];

pub const COMMENTS_FIELD: &str = "comments";

/// Inclusive range accepted for rating answers by client-side validation.
pub const RATING_MIN: i64 = 1;
pub const RATING_MAX: i64 = 5;

/// Every business field a payload may carry, in column order (timestamp excluded).
pub fn field_keys() -> impl Iterator<Item = &'static str> {
    TEXT_FIELDS
        .iter()
        .chain(QUESTION_FIELDS.iter())
        .chain(std::iter::once(&COMMENTS_FIELD))
        .copied()
}

pub fn is_field_key(key: &str) -> bool {
    field_keys().any(|k| k == key)
}

pub fn is_question_key(key: &str) -> bool {
    QUESTION_FIELDS.contains(&key)
}

/// Presentation applied to a sheet exactly once, when its header is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetFormat {
    pub header_bold: bool,
    pub header_background: String,
    pub header_font_color: String,
    pub header_alignment: String,
    pub header_wrap: bool,
    pub frozen_rows: usize,
    pub header_height: u32,
    pub column_widths: Vec<u32>,
    /// Background for data rows at even row numbers (row 1 is the header).
    pub banding: Option<RowBanding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowBanding {
    pub color: String,
    pub every: usize,
}

impl Default for SheetFormat {
    fn default() -> Self {
        let mut column_widths = vec![180, 180, 130, 140, 220];
        column_widths.extend(std::iter::repeat(90).take(QUESTION_FIELDS.len()));
        column_widths.push(320);

        Self {
            header_bold: true,
            header_background: "#1a1a2e".to_string(),
            header_font_color: "#ffffff".to_string(),
            header_alignment: "center".to_string(),
            header_wrap: true,
            frozen_rows: 1,
            header_height: 40,
            column_widths,
            banding: Some(RowBanding {
                color: "#f0f4ff".to_string(),
                every: 2,
            }),
        }
    }
}

impl RowBanding {
    /// Whether the 1-based `row` receives the band colour. The header never does.
    pub fn applies_to(&self, row: usize) -> bool {
        self.every > 0 && row > 1 && row % self.every == 0
    }
}
