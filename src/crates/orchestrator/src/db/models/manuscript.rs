//! Manuscript model for database persistence
//!
//! The final assembled book, derived from a Job's Checkpoints by the
//! terminal `finalize` phase. One Manuscript per completed Job.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManuscriptStats {
    pub word_count: i64,
    pub chapter_count: i64,
    pub scene_count: i64,
}

/// Database row. `chapters` and `stats` are stored as JSON text; the typed
/// accessors below deserialize them lazily.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Manuscript {
    pub job_id: String,
    pub title: String,
    pub blurb: String,
    pub chapters_json: String,
    pub stats_json: String,
    pub cover_reference: Option<String>,
    pub created_at: String,
}

impl Manuscript {
    pub fn new(
        job_id: impl Into<String>,
        title: impl Into<String>,
        blurb: impl Into<String>,
        chapters: &[Chapter],
        stats: &ManuscriptStats,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            job_id: job_id.into(),
            title: title.into(),
            blurb: blurb.into(),
            chapters_json: serde_json::to_string(chapters)?,
            stats_json: serde_json::to_string(stats)?,
            cover_reference: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn with_cover(mut self, reference: impl Into<String>) -> Self {
        self.cover_reference = Some(reference.into());
        self
    }

    pub fn chapters(&self) -> serde_json::Result<Vec<Chapter>> {
        serde_json::from_str(&self.chapters_json)
    }

    pub fn stats(&self) -> serde_json::Result<ManuscriptStats> {
        serde_json::from_str(&self.stats_json)
    }
}
