//! Artifact cache.
//!
//! A two-level cache in front of expensive provider calls: the durable
//! `cache_entries` table is authoritative (see `db::repositories::cache_repo`),
//! fronted here by expiry-aware lookup so callers don't serve a stale hit.
//! There is no separate in-process LRU yet — `sqlx`'s own pool connection
//! reuse keeps repeat lookups cheap enough for this scale.

pub mod fingerprint;

use crate::db::connection::DatabasePool;
use crate::db::models::CacheEntry;
use crate::db::repositories::CacheRepository;

pub struct Cache<'a> {
    pool: &'a DatabasePool,
    ttl_days: i64,
}

impl<'a> Cache<'a> {
    pub fn new(pool: &'a DatabasePool, ttl_days: i64) -> Self {
        Self { pool, ttl_days }
    }

    /// Returns `Some(location)` on an unexpired hit, bumping `last_hit_at`.
    pub async fn lookup(&self, fingerprint: &str) -> Result<Option<String>, sqlx::Error> {
        let Some(entry) = CacheRepository::get(self.pool, fingerprint).await? else {
            return Ok(None);
        };
        if entry.is_expired(chrono::Utc::now(), self.ttl_days) {
            return Ok(None);
        }
        Ok(Some(entry.location))
    }

    pub async fn publish(&self, fingerprint: &str, location: &str, global: bool) -> Result<(), sqlx::Error> {
        let entry = CacheEntry::new(fingerprint, location, global);
        CacheRepository::put(self.pool, &entry).await
    }

    pub async fn evict_expired(&self) -> Result<u64, sqlx::Error> {
        CacheRepository::evict_expired(self.pool, self.ttl_days).await
    }
}
