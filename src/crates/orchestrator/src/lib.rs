//! Job orchestrator for the book generation pipeline.
//!
//! Drives a single book from `queued` to `complete` through a fixed phase
//! graph, persisting intermediate artifacts as checkpoints, enforcing
//! at-most-once execution per step, and recovering from crashes or timeouts.

pub mod api;
pub mod cache;
pub mod config;
pub mod controller;
pub mod cover;
pub mod db;
pub mod executor;
pub mod phase;
pub mod progress;
pub mod scheduler;
pub mod version;
pub mod worker;

use thiserror::Error;

/// Top-level orchestrator error for glue code that doesn't belong to one
/// specific layer (db, executor, api each carry their own typed error).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Referenced job does not exist
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// A state transition was attempted that the state machine forbids
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// The phase graph has no runnable instance yet some required phase
    /// is not done — always a bug.
    #[error("scheduler deadlock: {0}")]
    Deadlock(String),

    /// General/uncategorized error
    #[error("orchestrator error: {0}")]
    General(String),

    /// Database-layer error
    #[error(transparent)]
    Database(#[from] db::DatabaseError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        OrchestratorError::Database(err.into())
    }
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Get version information
pub fn version() -> &'static str {
    version::VERSION
}
