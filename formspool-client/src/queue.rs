//! Durable FIFO of records awaiting acknowledgment.
//!
//! The whole queue is one JSON array stored under a single key. Local
//! storage failures never reach `enqueue` or the read accessors: a failed
//! read shows an empty queue and a failed enqueue persists nothing, each
//! with a warning. A queue that cannot be read is never written over.

use crate::error::Result;
use crate::store::LocalStore;
use chrono::{DateTime, Utc};
use formspool::FeedbackRecord;
use std::sync::{Arc, Mutex};

pub const DEFAULT_QUEUE_KEY: &str = "formspool_feedback_queue";

pub struct SubmissionQueue {
    store: Arc<dyn LocalStore>,
    key: String,
    // Serializes read-modify-write cycles within this process.
    rmw: Mutex<()>,
}

impl SubmissionQueue {
    pub fn new(store: Arc<dyn LocalStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            rmw: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Stamp `record` with an enqueue marker and append it.
    ///
    /// Returns the marker, or `None` if local storage was unavailable and
    /// nothing was persisted.
    pub fn enqueue(&self, mut record: FeedbackRecord) -> Option<String> {
        let _rmw = self.rmw.lock().unwrap_or_else(|p| p.into_inner());

        let mut items = match self.load() {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("[QUEUE {}] local storage unreadable, not enqueuing: {}", self.key, e);
                return None;
            }
        };
        let stamp = unique_stamp(Utc::now(), &items);
        record.queued_at = Some(stamp.clone());
        items.push(record);

        match self.save(&items) {
            Ok(()) => {
                tracing::debug!("[QUEUE {}] enqueued {} ({} pending)", self.key, stamp, items.len());
                Some(stamp)
            }
            Err(e) => {
                tracing::warn!("[QUEUE {}] could not persist record: {}", self.key, e);
                None
            }
        }
    }

    /// Snapshot of every queued record, oldest first.
    pub fn pending(&self) -> Vec<FeedbackRecord> {
        let _rmw = self.rmw.lock().unwrap_or_else(|p| p.into_inner());
        self.load().unwrap_or_else(|e| {
            tracing::warn!("[QUEUE {}] local storage unreadable: {}", self.key, e);
            Vec::new()
        })
    }

    pub fn head(&self) -> Option<FeedbackRecord> {
        self.pending().into_iter().next()
    }

    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the first record carrying `queued_at`. Returns whether one was
    /// found.
    pub fn remove(&self, queued_at: &str) -> Result<bool> {
        self.remove_first(|r| r.queued_at.as_deref() == Some(queued_at))
    }

    /// Remove `record` after delivery: by marker when it has one, otherwise
    /// by full equality.
    pub fn remove_record(&self, record: &FeedbackRecord) -> Result<bool> {
        match record.queued_at.as_deref() {
            Some(stamp) => self.remove(stamp),
            None => self.remove_first(|r| r == record),
        }
    }

    fn remove_first(&self, matches: impl Fn(&FeedbackRecord) -> bool) -> Result<bool> {
        let _rmw = self.rmw.lock().unwrap_or_else(|p| p.into_inner());

        let mut items = self.load()?;
        let Some(pos) = items.iter().position(matches) else {
            return Ok(false);
        };
        items.remove(pos);
        self.save(&items)?;
        Ok(true)
    }

    /// Unparsable contents count as an empty queue; a failed read is an error.
    fn load(&self) -> Result<Vec<FeedbackRecord>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Option<Vec<FeedbackRecord>>>(&raw) {
            Ok(items) => Ok(items.unwrap_or_default()),
            Err(e) => {
                tracing::warn!("[QUEUE {}] discarding unparsable queue: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, items: &[FeedbackRecord]) -> Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(&self.key, &raw)
    }
}

/// ISO-8601 with microseconds, nudged forward until no queued record
/// carries the same marker.
fn unique_stamp(now: DateTime<Utc>, items: &[FeedbackRecord]) -> String {
    let mut at = now;
    loop {
        let stamp = at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
        if !items.iter().any(|r| r.queued_at.as_deref() == Some(stamp.as_str())) {
            return stamp;
        }
        at += chrono::Duration::microseconds(1);
    }
}
