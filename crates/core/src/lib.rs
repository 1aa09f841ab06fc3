//! Core library: the sync engine.
//!
//! Tag and note pipelines run on their own worker pools and share one
//! cache/buffer state; the orchestrator in [`pipeline`] ties them together.

pub mod buffer;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod regroup;
pub mod state;
pub mod stats;
pub mod tasks;

pub use error::SyncError;
pub use pipeline::{RunPhase, RunSummary, SyncSettings, Synchronizer};
