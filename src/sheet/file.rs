use super::Workbook;
use crate::error::{FormspoolError, Result};
use crate::schema::SheetFormat;
use crate::types::Cell;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const ROWS_EXT: &str = "jsonl";
const FORMAT_SUFFIX: &str = ".format.json";

struct OpenSheet {
    writer: BufWriter<File>,
    rows: usize,
    // File length as last seen by this workbook. A mismatch means another
    // process appended.
    bytes: u64,
}

/// Workbook stored as a directory: `{sheet}.jsonl` holds one JSON array per
/// row (header first) and `{sheet}.format.json` the presentation written
/// when the header was created.
pub struct FileWorkbook {
    dir: PathBuf,
    open: Mutex<HashMap<String, OpenSheet>>,
}

impl FileWorkbook {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            open: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn sheet_path(&self, name: &str) -> Result<PathBuf> {
        validate_sheet_name(name)?;
        Ok(self.dir.join(format!("{}.{}", name, ROWS_EXT)))
    }

    pub fn format_path(&self, name: &str) -> Result<PathBuf> {
        validate_sheet_name(name)?;
        Ok(self.dir.join(format!("{}{}", name, FORMAT_SUFFIX)))
    }

    /// Read every intact row back. Used for inspection and tests; the ledger
    /// itself never reads rows.
    pub fn read_rows(&self, name: &str) -> Result<Vec<Vec<Cell>>> {
        self.flush()?;
        let path = self.sheet_path(name)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&path)?);
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Vec<Cell>>(&line) {
                Ok(row) => rows.push(row),
                Err(_) => continue,
            }
        }
        Ok(rows)
    }

    pub fn read_format(&self, name: &str) -> Result<Option<SheetFormat>> {
        let path = self.format_path(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&contents)?))
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, HashMap<String, OpenSheet>>> {
        self.open
            .lock()
            .map_err(|_| FormspoolError::StorageWrite("workbook state poisoned".to_string()))
    }

    fn with_sheet<T>(&self, name: &str, f: impl FnOnce(&mut OpenSheet) -> Result<T>) -> Result<T> {
        let mut open = self.lock_open()?;
        if !open.contains_key(name) {
            let sheet = self.open_sheet(name)?;
            open.insert(name.to_string(), sheet);
        }
        match open.get_mut(name) {
            Some(sheet) => f(sheet),
            None => Err(FormspoolError::StorageWrite(format!(
                "sheet '{}' vanished while open",
                name
            ))),
        }
    }

    fn open_sheet(&self, name: &str) -> Result<OpenSheet> {
        let path = self.sheet_path(name)?;
        let (rows, torn_tail) = scan_rows(&path)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if torn_tail {
            terminate_torn_row(&mut file, name, &path)?;
        }
        let bytes = file.metadata()?.len();

        Ok(OpenSheet {
            writer: BufWriter::new(file),
            rows,
            bytes,
        })
    }
}

fn terminate_torn_row(file: &mut File, name: &str, path: &Path) -> Result<()> {
    tracing::warn!(
        "[SHEET {}] terminating a partially written row at {}",
        name,
        path.display()
    );
    file.write_all(b"\n")?;
    Ok(())
}

/// Count intact rows and report whether the file ends mid-line.
fn scan_rows(path: &Path) -> Result<(usize, bool)> {
    if !path.exists() {
        return Ok((0, false));
    }

    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let torn_tail = if len > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        file.seek(SeekFrom::Start(0))?;
        last[0] != b'\n'
    } else {
        false
    };

    let mut rows = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if serde_json::from_str::<Vec<Cell>>(&line).is_ok() {
            rows += 1;
        }
    }
    Ok((rows, torn_tail))
}

fn validate_sheet_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.'));
    if ok {
        Ok(())
    } else {
        Err(FormspoolError::Config(format!("invalid sheet name: {:?}", name)))
    }
}

impl Workbook for FileWorkbook {
    fn has_sheet(&self, name: &str) -> Result<bool> {
        if self.lock_open()?.contains_key(name) {
            return Ok(true);
        }
        Ok(self.sheet_path(name)?.exists())
    }

    fn insert_sheet(&self, name: &str) -> Result<()> {
        self.with_sheet(name, |_| Ok(()))?;
        tracing::info!("[SHEET {}] created in {}", name, self.dir.display());
        Ok(())
    }

    fn last_row(&self, name: &str) -> Result<usize> {
        if !self.has_sheet(name)? {
            return Ok(0);
        }
        let path = self.sheet_path(name)?;
        self.with_sheet(name, |sheet| {
            sheet.writer.flush()?;
            let on_disk = sheet.writer.get_ref().metadata()?.len();
            if on_disk != sheet.bytes {
                let (rows, torn_tail) = scan_rows(&path)?;
                if torn_tail {
                    terminate_torn_row(sheet.writer.get_mut(), name, &path)?;
                }
                sheet.rows = rows;
                sheet.bytes = sheet.writer.get_ref().metadata()?.len();
            }
            Ok(sheet.rows)
        })
    }

    fn append_row(&self, name: &str, cells: &[Cell]) -> Result<usize> {
        let line = serde_json::to_string(cells)?;
        self.with_sheet(name, |sheet| {
            sheet.writer.write_all(line.as_bytes())?;
            sheet.writer.write_all(b"\n")?;
            sheet.rows += 1;
            sheet.bytes += line.len() as u64 + 1;
            Ok(sheet.rows)
        })
    }

    fn apply_format(&self, name: &str, format: &SheetFormat) -> Result<()> {
        let path = self.format_path(name)?;
        let json = serde_json::to_string_pretty(format)?;
        fs::write(&path, json)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut open = self.lock_open()?;
        for sheet in open.values_mut() {
            sheet.writer.flush()?;
            sheet.writer.get_ref().sync_data()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::header_cells;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read_rows() {
        let tmp = TempDir::new().unwrap();
        let wb = FileWorkbook::open(tmp.path()).unwrap();

        assert!(!wb.has_sheet("FeedbackData").unwrap());
        assert_eq!(wb.last_row("FeedbackData").unwrap(), 0);

        wb.insert_sheet("FeedbackData").unwrap();
        assert!(wb.has_sheet("FeedbackData").unwrap());
        assert_eq!(wb.append_row("FeedbackData", &header_cells()).unwrap(), 1);
        assert_eq!(
            wb.append_row("FeedbackData", &[Cell::Text("a".into()), Cell::Integer(3)])
                .unwrap(),
            2
        );
        wb.flush().unwrap();

        let rows = wb.read_rows("FeedbackData").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], Cell::Text("Timestamp".into()));
        assert_eq!(rows[1][1], Cell::Integer(3));
    }

    #[test]
    fn test_reopen_continues_row_count() {
        let tmp = TempDir::new().unwrap();
        {
            let wb = FileWorkbook::open(tmp.path()).unwrap();
            wb.insert_sheet("S").unwrap();
            wb.append_row("S", &header_cells()).unwrap();
            wb.append_row("S", &[Cell::empty()]).unwrap();
            wb.flush().unwrap();
        }

        let wb = FileWorkbook::open(tmp.path()).unwrap();
        assert!(wb.has_sheet("S").unwrap());
        assert_eq!(wb.last_row("S").unwrap(), 2);
        assert_eq!(wb.append_row("S", &[Cell::empty()]).unwrap(), 3);
    }

    #[test]
    fn test_torn_tail_is_isolated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("S.jsonl");
        fs::write(&path, "[\"Timestamp\"]\n[\"2026-01-01\",\"half").unwrap();

        let wb = FileWorkbook::open(tmp.path()).unwrap();
        assert_eq!(wb.last_row("S").unwrap(), 1);
        assert_eq!(wb.append_row("S", &[Cell::Integer(7)]).unwrap(), 2);

        let rows = wb.read_rows("S").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Cell::Integer(7)]);
    }

    #[test]
    fn test_sees_rows_appended_by_another_workbook() {
        let tmp = TempDir::new().unwrap();
        let a = FileWorkbook::open(tmp.path()).unwrap();
        let b = FileWorkbook::open(tmp.path()).unwrap();
        a.insert_sheet("S").unwrap();
        b.insert_sheet("S").unwrap();
        assert_eq!(b.last_row("S").unwrap(), 0);

        a.append_row("S", &header_cells()).unwrap();
        a.flush().unwrap();

        assert_eq!(b.last_row("S").unwrap(), 1);
        assert_eq!(b.append_row("S", &[Cell::Integer(2)]).unwrap(), 2);
        b.flush().unwrap();
        assert_eq!(a.last_row("S").unwrap(), 2);
    }

    #[test]
    fn test_format_written_to_sidecar() {
        let tmp = TempDir::new().unwrap();
        let wb = FileWorkbook::open(tmp.path()).unwrap();
        wb.insert_sheet("S").unwrap();
        wb.apply_format("S", &SheetFormat::default()).unwrap();

        let format = wb.read_format("S").unwrap().unwrap();
        assert_eq!(format, SheetFormat::default());
        assert!(tmp.path().join("S.format.json").exists());
    }

    #[test]
    fn test_rejects_path_like_sheet_names() {
        let tmp = TempDir::new().unwrap();
        let wb = FileWorkbook::open(tmp.path()).unwrap();
        assert!(wb.insert_sheet("../escape").is_err());
        assert!(wb.insert_sheet(".hidden").is_err());
        assert!(wb.insert_sheet("").is_err());
    }
}
