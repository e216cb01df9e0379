//! Offline-first submission queue for Formspool.
//!
//! Records are persisted locally before any network activity and leave the
//! queue only once the endpoint acknowledges them. A [`Flusher`] drains the
//! queue with retry and backoff whenever the client is (or comes back)
//! online.
//!
//! ```rust,no_run
//! use formspool::FeedbackRecord;
//! use formspool_client::{ClientConfig, Connectivity, FileStore, Flusher, SubmissionQueue};
//! use std::sync::Arc;
//!
//! # async fn run() -> formspool_client::Result<()> {
//! let dir = std::path::Path::new("./queue");
//! let config = ClientConfig::load_or_default(dir);
//! let queue = SubmissionQueue::new(Arc::new(FileStore::open(dir)?), config.queue_key.clone());
//! let flusher = Flusher::new(
//!     Arc::new(queue),
//!     Arc::new(config.transport()?),
//!     config.retry_policy(),
//!     Connectivity::new(true),
//! );
//!
//! let submission = flusher.submit(FeedbackRecord::new().with_text("studentName", "Asha"));
//! let report = submission.delivery.await;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod flusher;
pub mod queue;
pub mod retry;
pub mod store;
pub mod transport;

pub use config::ClientConfig;
pub use connectivity::Connectivity;
pub use error::{ClientError, Result};
pub use flusher::{FlushOutcome, FlushReport, Flusher, Submission};
pub use queue::{SubmissionQueue, DEFAULT_QUEUE_KEY};
pub use retry::{send_with_retry, AckMode, RetryPolicy, MAX_ATTEMPTS};
pub use store::{FileStore, LocalStore, MemoryStore, UnavailableStore};
pub use transport::{HttpTransport, Transport};
