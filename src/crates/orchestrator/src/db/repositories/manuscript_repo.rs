//! Manuscript repository for database operations

use crate::db::connection::DatabasePool;
use crate::db::models::Manuscript;

pub struct ManuscriptRepository;

impl ManuscriptRepository {
    pub async fn create(pool: &DatabasePool, manuscript: &Manuscript) -> Result<Manuscript, sqlx::Error> {
        sqlx::query_as::<_, Manuscript>(
            "INSERT INTO manuscripts (job_id, title, blurb, chapters_json, stats_json, cover_reference, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&manuscript.job_id)
        .bind(&manuscript.title)
        .bind(&manuscript.blurb)
        .bind(&manuscript.chapters_json)
        .bind(&manuscript.stats_json)
        .bind(&manuscript.cover_reference)
        .bind(&manuscript.created_at)
        .fetch_one(pool)
        .await
    }

    pub async fn get_by_job(pool: &DatabasePool, job_id: &str) -> Result<Option<Manuscript>, sqlx::Error> {
        sqlx::query_as::<_, Manuscript>("SELECT * FROM manuscripts WHERE job_id = ?")
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Chapter, ManuscriptStats, Section};
    use sqlx::sqlite::SqlitePool;

    async fn setup() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE manuscripts (
                job_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                blurb TEXT NOT NULL,
                chapters_json TEXT NOT NULL,
                stats_json TEXT NOT NULL,
                cover_reference TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = setup().await;
        let chapters = vec![Chapter {
            title: "One".to_string(),
            sections: vec![Section {
                title: "Scene 1".to_string(),
                text: "text".to_string(),
            }],
        }];
        let stats = ManuscriptStats {
            word_count: 1,
            chapter_count: 1,
            scene_count: 1,
        };
        let manuscript = Manuscript::new("job-1", "Title", "Blurb", &chapters, &stats).unwrap();
        ManuscriptRepository::create(&pool, &manuscript).await.unwrap();

        let fetched = ManuscriptRepository::get_by_job(&pool, "job-1").await.unwrap().unwrap();
        assert_eq!(fetched.title, "Title");
        assert_eq!(fetched.chapters().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let pool = setup().await;
        assert!(ManuscriptRepository::get_by_job(&pool, "missing").await.unwrap().is_none());
    }
}
