//! HTTP upload ingestion server.
//!
//! This crate provides the HTTP surface and the workflows behind it:
//! - Multipart upload streamed through the type/size gate into blob storage
//! - Catalog listing, deletion and blob download
//! - Compensation for blobs whose catalog insert failed
//! - Periodic orphan sweep

pub mod error;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod sweep;

pub use error::ApiError;
pub use ingest::{Coordinator, IngestError};
pub use routes::create_router;
pub use state::AppState;
pub use sweep::{SweepStats, spawn_sweeper, sweep_orphans};
