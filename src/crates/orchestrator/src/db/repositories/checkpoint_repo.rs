//! Checkpoint repository for database operations
//!
//! The Artifact Store's write path: upsert-with-precondition "absent" so
//! that concurrent workers racing on the same (job_id, phase_name, index)
//! converge on exactly one surviving Checkpoint.

use crate::db::connection::DatabasePool;
use crate::db::models::Checkpoint;

pub struct CheckpointRepository;

impl CheckpointRepository {
    /// Insert a checkpoint iff none exists yet for this key. Returns the
    /// checkpoint that is now durably stored — which may belong to a
    /// different worker if this call lost the race; that is the
    /// idempotent "discard and return success" behavior the Step Executor
    /// contract requires.
    pub async fn create_if_absent(pool: &DatabasePool, checkpoint: &Checkpoint) -> Result<Checkpoint, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO checkpoints
                (job_id, phase_name, index_key, payload, fingerprint, tokens_in, tokens_out, cost_cents, duration_ms, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (job_id, phase_name, index_key) DO NOTHING",
        )
        .bind(&checkpoint.job_id)
        .bind(&checkpoint.phase_name)
        .bind(checkpoint.index)
        .bind(&checkpoint.payload)
        .bind(&checkpoint.fingerprint)
        .bind(checkpoint.tokens_in)
        .bind(checkpoint.tokens_out)
        .bind(checkpoint.cost_cents)
        .bind(checkpoint.duration_ms)
        .bind(&checkpoint.created_at)
        .execute(pool)
        .await?;

        if inserted.rows_affected() > 0 {
            return Ok(checkpoint.clone());
        }

        // Lost the race (or this is a genuine idempotent re-run); the
        // already-persisted value is authoritative.
        Self::get_by_phase_index(pool, &checkpoint.job_id, &checkpoint.phase_name, checkpoint.index)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn get_by_phase_index(
        pool: &DatabasePool,
        job_id: &str,
        phase_name: &str,
        index: i64,
    ) -> Result<Option<Checkpoint>, sqlx::Error> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT job_id, phase_name, index_key as \"index\", payload, fingerprint,
                    tokens_in, tokens_out, cost_cents, duration_ms, created_at
             FROM checkpoints WHERE job_id = ? AND phase_name = ? AND index_key = ?",
        )
        .bind(job_id)
        .bind(phase_name)
        .bind(index)
        .fetch_optional(pool)
        .await
    }

    pub async fn list_by_job(pool: &DatabasePool, job_id: &str) -> Result<Vec<Checkpoint>, sqlx::Error> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT job_id, phase_name, index_key as \"index\", payload, fingerprint,
                    tokens_in, tokens_out, cost_cents, duration_ms, created_at
             FROM checkpoints WHERE job_id = ? ORDER BY created_at ASC",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_phase(
        pool: &DatabasePool,
        job_id: &str,
        phase_name: &str,
    ) -> Result<Vec<Checkpoint>, sqlx::Error> {
        sqlx::query_as::<_, Checkpoint>(
            "SELECT job_id, phase_name, index_key as \"index\", payload, fingerprint,
                    tokens_in, tokens_out, cost_cents, duration_ms, created_at
             FROM checkpoints WHERE job_id = ? AND phase_name = ? ORDER BY index_key ASC",
        )
        .bind(job_id)
        .bind(phase_name)
        .fetch_all(pool)
        .await
    }

    pub async fn delete_by_job(pool: &DatabasePool, job_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM checkpoints WHERE job_id = ?")
            .bind(job_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_by_job(pool: &DatabasePool, job_id: &str) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM checkpoints WHERE job_id = ?")
            .bind(job_id)
            .fetch_one(pool)
            .await?;
        Ok(result.0)
    }
}
