//! Drains the submission queue towards the endpoint.
//!
//! At most one drain runs at a time. A flush that finds another one running
//! returns immediately and leaves a note; the running drain checks that note
//! before it exits so records enqueued at the very end are not stranded.

use crate::connectivity::Connectivity;
use crate::queue::SubmissionQueue;
use crate::retry::{send_with_retry, RetryPolicy};
use crate::transport::Transport;
use formspool::FeedbackRecord;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushOutcome {
    /// The queue was emptied.
    Drained,
    /// A record could not be delivered, or the client went offline; the
    /// rest stays queued.
    Stopped,
    SkippedInProgress,
    SkippedOffline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub delivered: usize,
    pub remaining: usize,
    pub outcome: FlushOutcome,
}

/// Result of [`Flusher::submit`]: the local marker (if the record could be
/// persisted) and the background delivery task.
pub struct Submission {
    pub queued_at: Option<String>,
    pub delivery: JoinHandle<FlushReport>,
}

pub struct Flusher<T: Transport> {
    queue: Arc<SubmissionQueue>,
    transport: Arc<T>,
    policy: RetryPolicy,
    connectivity: Connectivity,
    flushing: AtomicBool,
    rerun: AtomicBool,
}

struct FlushingFlag<'a>(&'a AtomicBool);

impl<'a> FlushingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for FlushingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Transport + 'static> Flusher<T> {
    pub fn new(
        queue: Arc<SubmissionQueue>,
        transport: Arc<T>,
        policy: RetryPolicy,
        connectivity: Connectivity,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            transport,
            policy,
            connectivity,
            flushing: AtomicBool::new(false),
            rerun: AtomicBool::new(false),
        })
    }

    pub fn queue(&self) -> &SubmissionQueue {
        &self.queue
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    /// Deliver queued records oldest first, stopping at the first one that
    /// exhausts its retries.
    pub async fn flush(&self) -> FlushReport {
        if !self.connectivity.is_online() {
            tracing::debug!("[FLUSH] offline, skipping");
            return self.report(0, FlushOutcome::SkippedOffline);
        }

        let mut delivered = 0;
        loop {
            let outcome = {
                let Some(_flag) = FlushingFlag::raise(&self.flushing) else {
                    self.rerun.store(true, Ordering::Release);
                    let outcome = if delivered == 0 {
                        tracing::debug!("[FLUSH] already in progress, skipping");
                        FlushOutcome::SkippedInProgress
                    } else {
                        FlushOutcome::Drained
                    };
                    return self.report(delivered, outcome);
                };
                self.rerun.store(false, Ordering::Release);
                let (sent, outcome) = self.drain().await;
                delivered += sent;
                outcome
            };

            if outcome != FlushOutcome::Drained
                || !self.rerun.swap(false, Ordering::AcqRel)
                || self.queue.is_empty()
            {
                let report = self.report(delivered, outcome);
                if delivered > 0 || outcome == FlushOutcome::Stopped {
                    tracing::info!(
                        "[FLUSH] delivered {}, {} remaining ({:?})",
                        report.delivered,
                        report.remaining,
                        report.outcome
                    );
                }
                return report;
            }
        }
    }

    async fn drain(&self) -> (usize, FlushOutcome) {
        let mut delivered = 0;
        // Re-read the head each time: records enqueued meanwhile are picked up.
        while let Some(record) = self.queue.head() {
            if !self.connectivity.is_online() {
                tracing::info!("[FLUSH] went offline, stopping");
                return (delivered, FlushOutcome::Stopped);
            }

            if let Err(e) = send_with_retry(self.transport.as_ref(), &record, &self.policy).await {
                tracing::warn!(
                    "[FLUSH] {} stays queued: {}",
                    record.queued_at.as_deref().unwrap_or("record"),
                    e
                );
                return (delivered, FlushOutcome::Stopped);
            }

            match self.queue.remove_record(&record) {
                Ok(true) => delivered += 1,
                Ok(false) => {
                    tracing::debug!("[FLUSH] delivered record was already gone from the queue")
                }
                Err(e) => {
                    // Without a working remove the same head would be resent forever.
                    tracing::warn!("[FLUSH] delivered but could not dequeue: {}", e);
                    return (delivered, FlushOutcome::Stopped);
                }
            }
        }
        (delivered, FlushOutcome::Drained)
    }

    /// Enqueue `record` and start delivery in the background.
    ///
    /// The caller is never blocked on the network. If local storage is
    /// unavailable the record is sent directly, once through the retry
    /// schedule, with nothing kept on failure.
    pub fn submit(self: &Arc<Self>, record: FeedbackRecord) -> Submission {
        let queued_at = self.queue.enqueue(record.clone());
        let this = Arc::clone(self);

        let delivery = match queued_at {
            Some(_) => tokio::spawn(async move { this.flush().await }),
            None => tokio::spawn(async move { this.send_unqueued(record).await }),
        };

        Submission {
            queued_at,
            delivery,
        }
    }

    async fn send_unqueued(&self, record: FeedbackRecord) -> FlushReport {
        if !self.connectivity.is_online() {
            tracing::warn!("[FLUSH] offline and no local storage, submission dropped");
            return self.report(0, FlushOutcome::SkippedOffline);
        }
        match send_with_retry(self.transport.as_ref(), &record, &self.policy).await {
            Ok(_) => self.report(1, FlushOutcome::Drained),
            Err(e) => {
                tracing::warn!("[FLUSH] unqueued submission lost: {}", e);
                self.report(0, FlushOutcome::Stopped)
            }
        }
    }

    /// Flush now if online, then again on every offline -> online edge.
    /// Runs until the task is aborted.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self.connectivity.subscribe();
        if *rx.borrow_and_update() {
            self.flush().await;
        }
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            if online {
                tracing::info!("[FLUSH] back online, {} queued", self.queue.len());
                self.flush().await;
            }
        }
    }

    fn report(&self, delivered: usize, outcome: FlushOutcome) -> FlushReport {
        FlushReport {
            delivered,
            remaining: self.queue.len(),
            outcome,
        }
    }
}
