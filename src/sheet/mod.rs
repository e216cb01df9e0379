//! Spreadsheet-style storage for the append-only feedback table.
//!
//! A [`Workbook`] holds named sheets; each sheet is an ordered list of rows
//! that can only grow. Callers are expected to hold the ledger lock around
//! any sequence of calls that must be atomic (existence check, header write,
//! append). Implementations only need to be safe for concurrent use, not
//! transactional.

pub mod file;
pub mod memory;

use crate::error::Result;
use crate::schema::SheetFormat;
use crate::types::Cell;

pub use file::FileWorkbook;
pub use memory::MemoryWorkbook;

pub trait Workbook: Send + Sync {
    fn has_sheet(&self, name: &str) -> Result<bool>;

    /// Create an empty sheet. Creating a sheet that already exists is a no-op.
    fn insert_sheet(&self, name: &str) -> Result<()>;

    /// Number of rows in the sheet, header included. Zero for a fresh sheet.
    fn last_row(&self, name: &str) -> Result<usize>;

    /// Append one row and return its 1-based row number.
    fn append_row(&self, name: &str, cells: &[Cell]) -> Result<usize>;

    /// Record presentation for the sheet. Only called when the header is created.
    fn apply_format(&self, name: &str, format: &SheetFormat) -> Result<()>;

    /// Make every pending change durable.
    fn flush(&self) -> Result<()>;
}
