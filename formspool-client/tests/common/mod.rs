#![allow(dead_code)]

use formspool::FeedbackRecord;
use formspool_client::{ClientError, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Decide = Box<dyn Fn(&FeedbackRecord, usize) -> bool + Send + Sync>;

/// Scripted transport. `decide(record, call_index)` returns whether the
/// call succeeds; every call is recorded with its (possibly paused) time.
pub struct FakeTransport {
    decide: Decide,
    delay: Duration,
    calls: AtomicUsize,
    pub attempts: Mutex<Vec<(Option<String>, Instant)>>,
}

impl FakeTransport {
    pub fn new(decide: impl Fn(&FeedbackRecord, usize) -> bool + Send + Sync + 'static) -> Self {
        Self {
            decide: Box::new(decide),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(|_, _| true)
    }

    pub fn always_fail() -> Self {
        Self::new(|_, _| false)
    }

    /// Fails the first `n` calls, then succeeds.
    pub fn failing_times(n: usize) -> Self {
        Self::new(move |_, call| call >= n)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempted_markers(&self) -> Vec<Option<String>> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn gaps(&self) -> Vec<Duration> {
        let attempts = self.attempts.lock().unwrap();
        attempts
            .windows(2)
            .map(|w| w[1].1.duration_since(w[0].1))
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn deliver(&self, record: &FeedbackRecord) -> formspool_client::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.attempts
            .lock()
            .unwrap()
            .push((record.queued_at.clone(), Instant::now()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if (self.decide)(record, call) {
            Ok(())
        } else {
            Err(ClientError::Transport("connection refused".into()))
        }
    }
}

pub fn record(name: &str) -> FeedbackRecord {
    FeedbackRecord::new()
        .with_text("studentName", name)
        .with_text("rollNumber", "R100")
        .with_rating("q1", 4)
        .with_text("comments", "ok")
}

pub fn asha() -> FeedbackRecord {
    let mut record = FeedbackRecord::new()
        .with_text("studentName", "Asha")
        .with_text("rollNumber", "R1")
        .with_text("mobileNumber", "9876543210")
        .with_text("college", "KAHE")
        .with_text("comments", "great");
    for (i, rating) in [5, 4, 4, 3, 5, 4, 3, 5, 4, 5].into_iter().enumerate() {
        record = record.with_rating(&format!("q{}", i + 1), rating);
    }
    record
}
