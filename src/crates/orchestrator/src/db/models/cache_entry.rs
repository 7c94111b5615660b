//! Cache entry model for database persistence
//!
//! The durable half of the two-level cache described in `cache`: a
//! fingerprint-keyed record pointing at a prior artifact reference so
//! retries and resumed jobs can skip re-invoking an external provider.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CacheEntry {
    /// Stable hash of (phase_name, canonicalized input JSON, config version)
    pub fingerprint: String,
    /// Location of the cached artifact in the Artifact Store (a checkpoint
    /// reference, as `job_id:phase_name:index`, or an object-storage path
    /// for binary artifacts)
    pub location: String,
    /// `true` for phases whose output may be reused across users
    pub global: bool,
    pub created_at: String,
    pub last_hit_at: String,
}

impl CacheEntry {
    pub fn new(fingerprint: impl Into<String>, location: impl Into<String>, global: bool) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            fingerprint: fingerprint.into(),
            location: location.into(),
            global,
            created_at: now.clone(),
            last_hit_at: now,
        }
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>, ttl_days: i64) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.last_hit_at) {
            Ok(last_hit) => now - last_hit.with_timezone(&chrono::Utc) > chrono::Duration::days(ttl_days),
            Err(_) => true,
        }
    }
}
