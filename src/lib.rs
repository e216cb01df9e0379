//! # Formspool
//!
//! Durable collection of feedback-form submissions into a single
//! append-only table.
//!
//! This crate holds the server-side core: the fixed row schema, payload
//! decoding and coercion, a named lock with bounded waiting, workbook
//! storage, and [`FeedbackLedger`], which serializes appends. The HTTP
//! endpoint lives in `formspool-http` and the offline-first submission
//! queue in `formspool-client`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use formspool::{FeedbackLedger, LedgerConfig, RawPayload};
//! use serde_json::json;
//!
//! # async fn run() -> formspool::Result<()> {
//! let ledger = FeedbackLedger::open_dir("./data".as_ref(), LedgerConfig::default())?;
//!
//! let receipt = ledger
//!     .append(RawPayload::json(&json!({"studentName": "Asha", "q1": 5})))
//!     .await?;
//! println!("stored as row {}", receipt.row);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! | Feature | Dependencies | Use case |
//! |---------|-------------|----------|
//! | `axum-support` | axum | [`FormspoolError`] implements `IntoResponse` |
//! | `openapi` | utoipa | OpenAPI schemas for the wire types |

pub mod error;
pub mod ledger;
pub mod lock;
pub mod payload;
pub mod schema;
pub mod sheet;
pub mod types;

pub use error::{FormspoolError, Result};
pub use ledger::{AppendReceipt, Clock, FeedbackLedger, LedgerConfig};
pub use lock::{LockGuard, NamedLock};
pub use payload::RawPayload;
pub use types::*;
