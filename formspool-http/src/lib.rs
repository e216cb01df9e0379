//! HTTP endpoint for Formspool.
//!
//! `GET /` answers a liveness check, `POST /` appends one submission
//! through the shared [`formspool::FeedbackLedger`]. Every response body
//! for a POST is a `{status, message}` envelope.

pub mod config;
pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod server;

pub use config::ServerConfig;
pub use server::{build_router, init_tracing, serve};
