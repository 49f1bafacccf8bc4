//! HTTP API server for PINOVARA's ODK attachment sync.
//!
//! This crate provides:
//! - Per-kind and all-kinds sync endpoints
//! - Attachment listing and file audit
//! - Health and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
