//! Phase Registry
//!
//! A static declarative table of the phases that make up the literary
//! pipeline: name, dependencies, fan-out rule, retry policy, cost class.
//! The plan is fixed code, not user-editable configuration.

pub mod input;
pub mod registry;
pub mod schema;

pub use registry::{canonical_plan, phase_by_name, CostClass, FanOut, PhaseSpec};

/// Phase input, built by `phase::input` from the job's creative brief and
/// upstream Checkpoints, and handed to the Step Executor's provider call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PhaseInput {
    pub phase_name: String,
    pub index: i64,
    pub payload: serde_json::Value,
}
