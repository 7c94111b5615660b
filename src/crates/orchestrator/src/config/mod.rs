//! Environment-driven runtime configuration.
//!
//! Every knob the orchestrator needs at process start is read once into a
//! `Settings` struct. There is no file-based configuration layer: the
//! phase graph is fixed code (see `phase::registry`), and everything that
//! genuinely varies between deployments is an environment variable.

use std::env;
use std::time::Duration;

/// Resolved runtime settings, read once at process start.
#[derive(Debug, Clone)]
pub struct Settings {
    /// SQLite connection string
    pub database_url: String,
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Wall-clock budget for a single `tick` call
    pub tick_budget: Duration,
    /// Max concurrent writer fan-out instances within one tick
    pub writer_concurrency: usize,
    /// Worker lease time-to-live
    pub lease_ttl: Duration,
    /// Max cover regeneration attempts before `cover: failed`
    pub cover_max_attempts: u32,
    /// Cache entry time-to-live, in days
    pub cache_ttl_days: i64,
}

impl Settings {
    /// Load settings from environment variables, falling back to documented
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            database_url: env_string("DATABASE_URL", "sqlite://orchestrator.db"),
            bind_addr: env_string("BIND_ADDR", "0.0.0.0:8080"),
            tick_budget: Duration::from_millis(env_u64("TICK_BUDGET_MS", 120_000)),
            writer_concurrency: env_u64("WRITER_CONCURRENCY", 3) as usize,
            lease_ttl: Duration::from_millis(env_u64("LEASE_TTL_MS", 30_000)),
            cover_max_attempts: env_u64("COVER_MAX_ATTEMPTS", 4) as u32,
            cache_ttl_days: env_u64("CACHE_TTL_DAYS", 30) as i64,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
