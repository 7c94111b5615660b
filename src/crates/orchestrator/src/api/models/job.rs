//! Job-facing request/response DTOs
//!
//! The wire shapes for the job orchestration HTTP surface: submit a book,
//! poll its status, fetch the assembled manuscript, and list checkpoints.

use crate::controller::{CreateJobInput, JobSnapshot};
use crate::db::models::{Checkpoint, Job, Manuscript};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub owner_id: String,
    pub prompt: String,
    pub genre: Option<String>,
    pub target_length_words: i64,
    pub voice: Option<String>,
    /// `draft` or `polished`; defaults to `draft` if omitted.
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "draft".to_string()
}

impl From<CreateJobRequest> for CreateJobInput {
    fn from(req: CreateJobRequest) -> Self {
        CreateJobInput {
            owner_id: req.owner_id,
            prompt: req.prompt,
            genre: req.genre,
            target_length_words: req.target_length_words,
            voice: req.voice,
            mode: req.mode,
        }
    }
}

/// A Job row as seen over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub id: String,
    pub owner_id: String,
    pub prompt: String,
    pub genre: Option<String>,
    pub target_length_words: i64,
    pub voice: Option<String>,
    pub mode: String,
    pub status: String,
    pub current_phase: Option<String>,
    pub progress: i64,
    pub progress_label: String,
    pub cover_status: String,
    pub last_error: Option<String>,
    pub checkpoint_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<JobSnapshot> for JobResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        let JobSnapshot { job, progress, checkpoint_count } = snapshot;
        Self {
            id: job.id,
            owner_id: job.owner_id,
            prompt: job.prompt,
            genre: job.genre,
            target_length_words: job.target_length_words,
            voice: job.voice,
            mode: job.mode,
            status: job.status,
            current_phase: job.current_phase,
            progress: progress.percent as i64,
            progress_label: progress.label,
            cover_status: job.cover_status,
            last_error: job.last_error,
            checkpoint_count,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

impl From<Job> for JobResponse {
    /// Used where no fresh `Progress` has been computed (e.g. `cancel`'s
    /// return value) — progress is read straight off the stored column.
    fn from(job: Job) -> Self {
        Self {
            progress: job.progress,
            progress_label: job.current_phase.clone().unwrap_or_default(),
            checkpoint_count: 0,
            id: job.id,
            owner_id: job.owner_id,
            prompt: job.prompt,
            genre: job.genre,
            target_length_words: job.target_length_words,
            voice: job.voice,
            mode: job.mode,
            status: job.status,
            current_phase: job.current_phase,
            cover_status: job.cover_status,
            last_error: job.last_error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Response of `GET /api/v1/jobs/:id/manuscript`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuscriptResponse {
    pub job_id: String,
    pub title: String,
    pub blurb: String,
    pub chapters: serde_json::Value,
    pub stats: serde_json::Value,
    pub cover_reference: Option<String>,
    pub created_at: String,
}

impl TryFrom<Manuscript> for ManuscriptResponse {
    type Error = serde_json::Error;

    fn try_from(m: Manuscript) -> Result<Self, Self::Error> {
        Ok(Self {
            job_id: m.job_id,
            title: m.title,
            blurb: m.blurb,
            chapters: serde_json::from_str(&m.chapters_json)?,
            stats: serde_json::from_str(&m.stats_json)?,
            cover_reference: m.cover_reference,
            created_at: m.created_at,
        })
    }
}

/// One row of `GET /api/v1/jobs/:id/checkpoints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointListItem {
    pub phase_name: String,
    pub index: i64,
    pub payload: serde_json::Value,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cost_cents: i64,
    pub duration_ms: i64,
    pub created_at: String,
}

impl TryFrom<Checkpoint> for CheckpointListItem {
    type Error = serde_json::Error;

    fn try_from(c: Checkpoint) -> Result<Self, Self::Error> {
        Ok(Self {
            phase_name: c.phase_name,
            index: c.index,
            payload: serde_json::from_str(&c.payload)?,
            tokens_in: c.tokens_in,
            tokens_out: c.tokens_out,
            cost_cents: c.cost_cents,
            duration_ms: c.duration_ms,
            created_at: c.created_at,
        })
    }
}
