use formspool::FeedbackLedger;
use std::sync::Arc;
use std::time::Instant;

pub mod health;
pub mod submit;

pub struct AppState {
    pub ledger: Arc<FeedbackLedger>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(ledger: Arc<FeedbackLedger>) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            started_at: Instant::now(),
        })
    }
}

pub use health::{health, liveness};
pub use submit::submit_feedback;
