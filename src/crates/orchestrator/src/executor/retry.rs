//! Step-level error classification for the Scheduler.

/// Five-way classification surfaced by the Step Executor to the Scheduler.
/// Only `Transient` is retried; everything else fails the Job outright
/// (`Canceled` is the one non-`Transient` case that isn't a failure —
/// the Job is marked `cancelled`, not `failed`).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// Provider timeout, 5xx, rate limit, or output-schema validation
    /// failure. Retried up to the phase's `max_attempts`.
    #[error("transient: {0}")]
    Transient(String),
    /// Content-policy refusal, blocked-franchise guardrail match,
    /// authentication failure. Never retried.
    #[error("policy violation: {0}")]
    Policy(String),
    /// Provider quota exhausted or an authentication failure on the
    /// provider call itself. Distinct from `Transient` because retrying
    /// won't help until an operator intervenes — bubbles straight to a
    /// failed Job without consuming an attempt.
    #[error("capacity exhausted: {0}")]
    Capacity(String),
    /// Scheduler deadlock, checkpoint corruption, invariant violation.
    #[error("consistency error: {0}")]
    Consistency(String),
    /// The Job's cancellation flag was observed at a suspension point.
    #[error("canceled")]
    Canceled,
}

impl ExecError {
    /// Only `Transient` errors are retried against the phase's attempt cap.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ExecError::Transient(_))
    }

    /// Whether this error should fail the Job outright (vs. re-enqueue).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecError::Policy(_) | ExecError::Consistency(_) | ExecError::Capacity(_))
    }
}
