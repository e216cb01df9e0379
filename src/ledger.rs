//! Serialized append path for feedback rows.
//!
//! Every append runs the same critical section under one [`NamedLock`]:
//! make sure the sheet exists, write the header and formatting if the sheet
//! is empty, decode the payload, append exactly one row, flush. The lock
//! guard travels with the blocking task, so it is released only once that
//! task is finished, even if the caller stops waiting.

use crate::error::{FormspoolError, Result};
use crate::lock::{LockGuard, NamedLock, DEFAULT_LOCK_WAIT};
use crate::payload::RawPayload;
use crate::schema::{SheetFormat, COLUMN_COUNT, DEFAULT_SHEET_NAME};
use crate::sheet::{FileWorkbook, Workbook};
use crate::types::{header_cells, PersistedRow};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Source of the authoritative row timestamp.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub sheet_name: String,
    pub lock_wait: Duration,
    pub format: SheetFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            lock_wait: DEFAULT_LOCK_WAIT,
            format: SheetFormat::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppendReceipt {
    /// 1-based row number of the appended row (the header is row 1).
    pub row: usize,
    pub timestamp: DateTime<Utc>,
    pub header_created: bool,
}

pub struct FeedbackLedger {
    workbook: Arc<dyn Workbook>,
    lock: NamedLock,
    config: LedgerConfig,
    clock: Clock,
}

impl FeedbackLedger {
    pub fn new(workbook: Arc<dyn Workbook>, lock: NamedLock, config: LedgerConfig) -> Self {
        Self {
            workbook,
            lock,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    /// Ledger over a [`FileWorkbook`] in `data_dir`, locked across processes
    /// through `{data_dir}/.{sheet}.lock`.
    pub fn open_dir(data_dir: &Path, config: LedgerConfig) -> Result<Self> {
        let workbook = FileWorkbook::open(data_dir)?;
        workbook.sheet_path(&config.sheet_name)?;
        let lock_path = data_dir.join(format!(".{}.lock", config.sheet_name));
        let lock = NamedLock::with_lock_file(&config.sheet_name, &lock_path)?;
        tracing::info!(
            "[LEDGER {}] storing rows in {}",
            config.sheet_name,
            data_dir.display()
        );
        Ok(Self::new(Arc::new(workbook), lock, config))
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.config.sheet_name
    }

    pub fn columns(&self) -> usize {
        COLUMN_COUNT
    }

    pub fn lock_wait(&self) -> Duration {
        self.config.lock_wait
    }

    pub fn lock(&self) -> &NamedLock {
        &self.lock
    }

    /// Append one submission.
    ///
    /// # Errors
    ///
    /// - [`FormspoolError::LockTimeout`] if the lock was not acquired within
    ///   the configured wait; storage is not touched.
    /// - [`FormspoolError::MalformedPayload`] if the body could not be decoded
    ///   at all; no row is appended.
    /// - [`FormspoolError::StorageWrite`] if the workbook failed.
    pub async fn append(&self, payload: RawPayload) -> Result<AppendReceipt> {
        let guard = self.lock.acquire(self.config.lock_wait).await?;

        let workbook = Arc::clone(&self.workbook);
        let config = self.config.clone();
        let clock = Arc::clone(&self.clock);

        let receipt = tokio::task::spawn_blocking(move || {
            append_locked(guard, workbook.as_ref(), &config, &payload, clock.as_ref())
        })
        .await
        .map_err(|e| FormspoolError::StorageWrite(format!("append task failed: {}", e)))??;

        tracing::info!(
            "[LEDGER {}] appended row {}{}",
            self.config.sheet_name,
            receipt.row,
            if receipt.header_created {
                " (header created)"
            } else {
                ""
            }
        );
        Ok(receipt)
    }
}

fn append_locked(
    _guard: LockGuard,
    workbook: &dyn Workbook,
    config: &LedgerConfig,
    payload: &RawPayload,
    clock: &(dyn Fn() -> DateTime<Utc> + Send + Sync),
) -> Result<AppendReceipt> {
    let sheet = config.sheet_name.as_str();

    if !workbook.has_sheet(sheet).map_err(storage)? {
        workbook.insert_sheet(sheet).map_err(storage)?;
    }
    let header_created = ensure_header(workbook, sheet, &config.format)?;

    let outcome = payload.decode().and_then(|fields| {
        let row = PersistedRow::from_fields(&fields, clock());
        let number = workbook.append_row(sheet, &row.cells()).map_err(storage)?;
        Ok(AppendReceipt {
            row: number,
            timestamp: row.timestamp,
            header_created,
        })
    });

    // Flush even on a rejected payload so a freshly written header is durable.
    workbook.flush().map_err(storage)?;
    outcome
}

/// Write the header row and formatting if the sheet has no rows yet.
fn ensure_header(workbook: &dyn Workbook, sheet: &str, format: &SheetFormat) -> Result<bool> {
    if workbook.last_row(sheet).map_err(storage)? > 0 {
        return Ok(false);
    }
    workbook.append_row(sheet, &header_cells()).map_err(storage)?;
    workbook.apply_format(sheet, format).map_err(storage)?;
    Ok(true)
}

fn storage(e: FormspoolError) -> FormspoolError {
    match e {
        FormspoolError::Io(msg) | FormspoolError::Json(msg) => FormspoolError::StorageWrite(msg),
        other => other,
    }
}
