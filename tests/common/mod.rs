use formspool::sheet::MemoryWorkbook;
use formspool::{FeedbackLedger, LedgerConfig, NamedLock};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// The reference submission: every rating filled, a short comment.
pub fn asha_payload() -> serde_json::Value {
    json!({
        "timestamp": "2001-09-09T01:46:40.000Z",
        "studentName": "Asha",
        "rollNumber": "R1",
        "mobileNumber": "9876543210",
        "college": "KAHE",
        "q1": 5, "q2": 4, "q3": 4, "q4": 3, "q5": 5,
        "q6": 4, "q7": 3, "q8": 5, "q9": 4, "q10": 5,
        "comments": "great"
    })
}

#[allow(dead_code)]
pub fn memory_ledger(lock_wait: Duration) -> (Arc<MemoryWorkbook>, Arc<FeedbackLedger>) {
    let workbook = Arc::new(MemoryWorkbook::new());
    let config = LedgerConfig {
        lock_wait,
        ..Default::default()
    };
    let ledger = FeedbackLedger::new(
        Arc::clone(&workbook) as Arc<dyn formspool::sheet::Workbook>,
        NamedLock::in_process("FeedbackData"),
        config,
    );
    (workbook, Arc::new(ledger))
}
