//! Cache entry repository for database operations
//!
//! Durable source of truth behind the in-process LRU in `cache`. Writes are
//! a plain upsert — the cache is a single-writer-per-fingerprint surface in
//! practice because a fingerprint collision means the inputs were
//! identical, so a second write is redundant, not racy.

use crate::db::connection::DatabasePool;
use crate::db::models::CacheEntry;
use chrono::Utc;

pub struct CacheRepository;

impl CacheRepository {
    pub async fn put(pool: &DatabasePool, entry: &CacheEntry) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO cache_entries (fingerprint, location, global, created_at, last_hit_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (fingerprint) DO UPDATE SET last_hit_at = excluded.last_hit_at",
        )
        .bind(&entry.fingerprint)
        .bind(&entry.location)
        .bind(entry.global)
        .bind(&entry.created_at)
        .bind(&entry.last_hit_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Look up by fingerprint and bump `last_hit_at` atomically with the read.
    pub async fn get(pool: &DatabasePool, fingerprint: &str) -> Result<Option<CacheEntry>, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let entry = sqlx::query_as::<_, CacheEntry>("SELECT * FROM cache_entries WHERE fingerprint = ?")
            .bind(fingerprint)
            .fetch_optional(pool)
            .await?;

        if entry.is_some() {
            sqlx::query("UPDATE cache_entries SET last_hit_at = ? WHERE fingerprint = ?")
                .bind(&now)
                .bind(fingerprint)
                .execute(pool)
                .await?;
        }

        Ok(entry)
    }

    pub async fn evict_expired(pool: &DatabasePool, ttl_days: i64) -> Result<u64, sqlx::Error> {
        let cutoff = (Utc::now() - chrono::Duration::days(ttl_days)).to_rfc3339();
        let result = sqlx::query("DELETE FROM cache_entries WHERE last_hit_at < ?")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count(pool: &DatabasePool) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
            .fetch_one(pool)
            .await?;
        Ok(result.0)
    }
}
