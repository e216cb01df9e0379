use formspool::schema::{SheetFormat, DEFAULT_SHEET_NAME};
use formspool::LedgerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings for [`crate::serve`]. The binary fills these from its flags and
/// their `FORMSPOOL_*` environment fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub sheet_name: String,
    pub lock_wait_ms: u64,
    pub max_body_kb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            bind_addr: "127.0.0.1:7700".to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            lock_wait_ms: 10_000,
            max_body_kb: 64,
        }
    }
}

impl ServerConfig {
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            sheet_name: self.sheet_name.clone(),
            lock_wait: self.lock_wait(),
            format: SheetFormat::default(),
        }
    }
}
