//! Job model for database persistence
//!
//! A Job is the unit of orchestration: the durable record of one book's
//! progress from `queued` to a terminal state.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status of a Job. Total order, see module docs for the legal transition
/// table (enforced by `controller`, not here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// String form used for the `status` column and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents one book-generation job in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Opaque, stable identifier (UUID string)
    pub id: String,
    /// Owning user id
    pub owner_id: String,
    /// Original creative brief
    pub prompt: String,
    pub genre: Option<String>,
    pub target_length_words: i64,
    pub voice: Option<String>,
    /// `draft` or `polished`
    pub mode: String,
    /// One of `queued`, `running`, `complete`, `failed`, `cancelled`
    pub status: String,
    /// Human label of the current/next phase, if any
    pub current_phase: Option<String>,
    /// 0..=100
    pub progress: i64,
    /// Sub-state of the cover subsystem: `pending`, `ready`, `failed`
    pub cover_status: String,
    /// Present iff `status == failed`
    pub last_error: Option<String>,
    /// Worker lease fields; both null when unheld
    pub lease_token: Option<String>,
    pub lease_expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    /// JSON object mapping `"{phase_name}:{index}"` to an attempt count;
    /// durable so a crash mid-attempt still counts on the next observation.
    pub attempts_json: String,
}

impl Job {
    /// Build a new job in the `queued` state.
    pub fn new(
        id: impl Into<String>,
        owner_id: impl Into<String>,
        prompt: impl Into<String>,
        target_length_words: i64,
        mode: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            owner_id: owner_id.into(),
            prompt: prompt.into(),
            genre: None,
            target_length_words,
            voice: None,
            mode: mode.into(),
            status: JobStatus::Queued.as_str().to_string(),
            current_phase: None,
            progress: 0,
            cover_status: "pending".to_string(),
            last_error: None,
            lease_token: None,
            lease_expires_at: None,
            created_at: now.clone(),
            updated_at: now,
            started_at: None,
            ended_at: None,
            attempts_json: "{}".to_string(),
        }
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Parsed status, panics on a corrupt row (constraint-checked by the DB).
    pub fn status(&self) -> JobStatus {
        self.status.parse().expect("status column violates CHECK constraint")
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    fn attempt_key(phase_name: &str, index: i64) -> String {
        format!("{phase_name}:{index}")
    }

    /// Current attempt count for one phase instance, `0` if never attempted.
    pub fn attempt_count(&self, phase_name: &str, index: i64) -> u32 {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.attempts_json).unwrap_or_default();
        map.get(&Self::attempt_key(phase_name, index)).and_then(|v| v.as_u64()).unwrap_or(0) as u32
    }

    /// Returns the updated `attempts_json` with this instance's count bumped
    /// by one; callers persist it via `JobRepository::record_attempt`.
    pub fn bump_attempt(&self, phase_name: &str, index: i64) -> String {
        let mut map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&self.attempts_json).unwrap_or_default();
        let key = Self::attempt_key(phase_name, index);
        let current = map.get(&key).and_then(|v| v.as_u64()).unwrap_or(0);
        map.insert(key, serde_json::Value::from(current + 1));
        serde_json::Value::Object(map).to_string()
    }

    pub fn has_active_lease(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match &self.lease_expires_at {
            None => false,
            Some(ts) => chrono::DateTime::parse_from_rfc3339(ts)
                .map(|expires| expires.with_timezone(&chrono::Utc) > now)
                .unwrap_or(false),
        }
    }
}
