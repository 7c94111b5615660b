//! Job repository for database operations

use crate::db::connection::DatabasePool;
use crate::db::models::Job;
use chrono::Utc;

/// Repository for managing Job rows. The Controller is the only caller
/// that should mutate status/progress; everything else is read-only.
pub struct JobRepository;

impl JobRepository {
    pub async fn create(pool: &DatabasePool, job: &Job) -> Result<Job, sqlx::Error> {
        sqlx::query_as::<_, Job>(
            "INSERT INTO jobs (id, owner_id, prompt, genre, target_length_words, voice, mode,
                status, current_phase, progress, cover_status, last_error,
                lease_token, lease_expires_at, created_at, updated_at, started_at, ended_at, attempts_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&job.id)
        .bind(&job.owner_id)
        .bind(&job.prompt)
        .bind(&job.genre)
        .bind(job.target_length_words)
        .bind(&job.voice)
        .bind(&job.mode)
        .bind(&job.status)
        .bind(&job.current_phase)
        .bind(job.progress)
        .bind(&job.cover_status)
        .bind(&job.last_error)
        .bind(&job.lease_token)
        .bind(&job.lease_expires_at)
        .bind(&job.created_at)
        .bind(&job.updated_at)
        .bind(&job.started_at)
        .bind(&job.ended_at)
        .bind(&job.attempts_json)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_id(pool: &DatabasePool, id: &str) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_owner(pool: &DatabasePool, owner_id: &str) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE owner_id = ? ORDER BY created_at DESC")
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Jobs eligible for worker pickup: non-terminal and with no active lease.
    pub async fn list_runnable(pool: &DatabasePool) -> Result<Vec<Job>, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs
             WHERE status IN ('queued', 'running')
               AND (lease_expires_at IS NULL OR lease_expires_at < ?)
             ORDER BY created_at ASC",
        )
        .bind(now)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(pool: &DatabasePool, id: &str, status: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_progress(
        pool: &DatabasePool,
        id: &str,
        progress: i64,
        current_phase: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET progress = ?, current_phase = ?, updated_at = ? WHERE id = ?")
            .bind(progress)
            .bind(current_phase)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_cover_status(pool: &DatabasePool, id: &str, cover_status: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET cover_status = ?, updated_at = ? WHERE id = ?")
            .bind(cover_status)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_started(pool: &DatabasePool, id: &str) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE jobs SET status = 'running', started_at = COALESCE(started_at, ?), updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn mark_terminal(
        pool: &DatabasePool,
        id: &str,
        status: &str,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE jobs SET status = ?, last_error = ?, ended_at = ?, updated_at = ?,
                lease_token = NULL, lease_expires_at = NULL WHERE id = ?",
        )
        .bind(status)
        .bind(error)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Acquire a lease with precondition: no unexpired lease currently held.
    /// Returns the number of rows affected; 0 means another worker won.
    pub async fn try_acquire_lease(
        pool: &DatabasePool,
        id: &str,
        token: &str,
        ttl: std::time::Duration,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let expires = (now + chrono::Duration::from_std(ttl).unwrap_or_default()).to_rfc3339();
        let now_str = now.to_rfc3339();

        let result = sqlx::query(
            "UPDATE jobs SET lease_token = ?, lease_expires_at = ?, updated_at = ?
             WHERE id = ? AND (lease_expires_at IS NULL OR lease_expires_at < ?)",
        )
        .bind(token)
        .bind(&expires)
        .bind(&now_str)
        .bind(id)
        .bind(&now_str)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Release a lease, but only if the caller still holds it by token.
    pub async fn release_lease(pool: &DatabasePool, id: &str, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET lease_token = NULL, lease_expires_at = NULL WHERE id = ? AND lease_token = ?",
        )
        .bind(id)
        .bind(token)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Read-modify-write: bumps the attempt count for one phase instance and
    /// returns the new count. Safe because only the lease holder calls this.
    pub async fn record_attempt(
        pool: &DatabasePool,
        id: &str,
        phase_name: &str,
        index: i64,
    ) -> Result<u32, sqlx::Error> {
        let job = Self::get_by_id(pool, id).await?.ok_or(sqlx::Error::RowNotFound)?;
        let updated_json = job.bump_attempt(phase_name, index);
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE jobs SET attempts_json = ?, updated_at = ? WHERE id = ?")
            .bind(&updated_json)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(job.attempt_count(phase_name, index) + 1)
    }

    pub async fn count_by_status(pool: &DatabasePool, status: &str) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status)
            .fetch_one(pool)
            .await?;
        Ok(result.0)
    }
}
