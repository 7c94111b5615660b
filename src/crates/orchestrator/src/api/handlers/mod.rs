//! API request handlers
//!
//! Provides handler functions for all API endpoints organized by resource.

pub mod health;
pub mod jobs;

pub use health::{health, health_detailed};
pub use jobs::{cancel_job, create_job, get_job, get_manuscript, list_checkpoints, tick_job};
