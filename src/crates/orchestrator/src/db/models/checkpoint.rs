//! Checkpoint model for database persistence
//!
//! One completed phase instance. Keyed by (job_id, phase_name, index); see
//! `db::repositories::checkpoint_repo` for the upsert-with-precondition
//! write path that enforces at-most-once completion.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents one completed phase instance in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Checkpoint {
    /// Owning job
    pub job_id: String,
    /// Phase name, e.g. `concept`, `write`, `cover`
    pub phase_name: String,
    /// Fan-out index; `0` for singleton phases. For `write[ch,s]`,
    /// `index = chapter * 10000 + scene`.
    pub index: i64,
    /// Phase output, strongly typed per phase but stored as JSON text
    pub payload: String,
    /// Stable hash of (phase_name, normalized inputs, config version)
    pub fingerprint: String,
    /// Provider usage: input/output tokens, dollar cost, wall-clock ms
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_cents: i64,
    pub duration_ms: i64,
    pub created_at: String,
}

impl Checkpoint {
    /// Build a checkpoint ready to be inserted with precondition "absent".
    pub fn new(
        job_id: impl Into<String>,
        phase_name: impl Into<String>,
        index: i64,
        payload: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            phase_name: phase_name.into(),
            index,
            payload: payload.into(),
            fingerprint: fingerprint.into(),
            tokens_in: 0,
            tokens_out: 0,
            cost_cents: 0,
            duration_ms: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_usage(mut self, tokens_in: i64, tokens_out: i64, cost_cents: i64, duration_ms: i64) -> Self {
        self.tokens_in = tokens_in;
        self.tokens_out = tokens_out;
        self.cost_cents = cost_cents;
        self.duration_ms = duration_ms;
        self
    }

    /// Decompose a writer fan-out index into (chapter, scene). Singleton
    /// phases always use index 0, which decomposes to (0, 0).
    pub fn decompose_scene_index(index: i64) -> (i64, i64) {
        (index / 10_000, index % 10_000)
    }

    pub fn compose_scene_index(chapter: i64, scene: i64) -> i64 {
        chapter * 10_000 + scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checkpoint() {
        let cp = Checkpoint::new("job-1", "concept", 0, "{}", "abc123");
        assert_eq!(cp.job_id, "job-1");
        assert_eq!(cp.phase_name, "concept");
        assert_eq!(cp.index, 0);
        assert_eq!(cp.tokens_in, 0);
    }

    #[test]
    fn test_with_usage() {
        let cp = Checkpoint::new("job-1", "write", 10003, "{}", "fp").with_usage(100, 200, 5, 1500);
        assert_eq!(cp.tokens_in, 100);
        assert_eq!(cp.tokens_out, 200);
        assert_eq!(cp.cost_cents, 5);
        assert_eq!(cp.duration_ms, 1500);
    }

    #[test]
    fn test_scene_index_roundtrip() {
        let index = Checkpoint::compose_scene_index(3, 7);
        assert_eq!(index, 30007);
        assert_eq!(Checkpoint::decompose_scene_index(index), (3, 7));
    }
}
