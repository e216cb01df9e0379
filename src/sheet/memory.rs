use super::Workbook;
use crate::error::{FormspoolError, Result};
use crate::schema::SheetFormat;
use crate::types::Cell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct MemorySheet {
    rows: Vec<Vec<Cell>>,
    format: Option<SheetFormat>,
}

/// In-memory workbook for tests and embedding.
///
/// `fail_appends` makes every append fail, and `append_delay_ms` stretches
/// each append so that overlapping critical sections would be observable.
#[derive(Default)]
pub struct MemoryWorkbook {
    sheets: Mutex<BTreeMap<String, MemorySheet>>,
    fail_appends: AtomicBool,
    append_delay_ms: AtomicU64,
    appending: AtomicBool,
    overlaps: AtomicU64,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn set_append_delay(&self, delay: Duration) {
        self.append_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn rows(&self, name: &str) -> Vec<Vec<Cell>> {
        self.lock_sheets()
            .map(|sheets| sheets.get(name).map(|s| s.rows.clone()).unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn format(&self, name: &str) -> Option<SheetFormat> {
        self.lock_sheets()
            .ok()
            .and_then(|sheets| sheets.get(name).and_then(|s| s.format.clone()))
    }

    /// How many appends started while another append was still running.
    pub fn overlapping_appends(&self) -> u64 {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn lock_sheets(&self) -> Result<MutexGuard<'_, BTreeMap<String, MemorySheet>>> {
        self.sheets
            .lock()
            .map_err(|_| FormspoolError::StorageWrite("workbook state poisoned".to_string()))
    }
}

impl Workbook for MemoryWorkbook {
    fn has_sheet(&self, name: &str) -> Result<bool> {
        Ok(self.lock_sheets()?.contains_key(name))
    }

    fn insert_sheet(&self, name: &str) -> Result<()> {
        self.lock_sheets()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn last_row(&self, name: &str) -> Result<usize> {
        Ok(self
            .lock_sheets()?
            .get(name)
            .map(|s| s.rows.len())
            .unwrap_or(0))
    }

    fn append_row(&self, name: &str, cells: &[Cell]) -> Result<usize> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(FormspoolError::StorageWrite(
                "simulated append failure".to_string(),
            ));
        }

        if self.appending.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        // Read the row count, wait, then write: a lost update if two appends overlap.
        let result = self.last_row(name).and_then(|before| {
            let delay = self.append_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                std::thread::sleep(Duration::from_millis(delay));
            }
            let mut sheets = self.lock_sheets()?;
            let sheet = sheets.entry(name.to_string()).or_default();
            sheet.rows.truncate(before);
            sheet.rows.push(cells.to_vec());
            Ok(sheet.rows.len())
        });

        self.appending.store(false, Ordering::SeqCst);
        result
    }

    fn apply_format(&self, name: &str, format: &SheetFormat) -> Result<()> {
        let mut sheets = self.lock_sheets()?;
        sheets.entry(name.to_string()).or_default().format = Some(format.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
