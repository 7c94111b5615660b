//! Shared scaffolding for the integration/scenario tests: an in-memory
//! SQLite pool, a default mock provider bundle, and a counting text
//! generator used to assert on provider call counts (cache hits, crash
//! recovery, rate-limit scripts).

use async_trait::async_trait;
use orchestrator::config::Settings;
use orchestrator::controller::JobController;
use orchestrator::executor::providers::{
    ImageGeneration, InMemoryObjectStore, MockImageGenerator, MockTtsSynthesizer,
    MockVisionInspector, ProviderBundle, TextGeneration, TextGenerator, Usage, VisionInspection,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A single-connection pool: SQLite's `:memory:` database lives on one
/// connection, so a pool that hands out more than one would give
/// concurrent callers distinct, empty databases. Capping at one forces the
/// pool itself to serialize callers the way a real lease-holding Worker
/// would — exactly what the lease-exclusivity test needs.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new().max_connections(1).connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

pub fn test_settings() -> Settings {
    let mut settings = Settings::from_env();
    settings.database_url = "sqlite::memory:".to_string();
    settings
}

/// Counts every call so tests can assert a cache hit skipped the provider.
/// The counter is a separate `Arc` handle so a test can keep it after the
/// generator itself is moved into a `Box<dyn TextGenerator>`.
#[derive(Debug)]
pub struct CountingTextGenerator {
    pub calls: Arc<AtomicUsize>,
}

impl CountingTextGenerator {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { calls: calls.clone() }, calls)
    }
}

impl Default for CountingTextGenerator {
    fn default() -> Self {
        Self::new().0
    }
}

#[async_trait]
impl TextGenerator for CountingTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<TextGeneration, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TextGeneration {
            text: format!("generated: {}", &prompt[..prompt.len().min(30)]),
            usage: Usage::default(),
        })
    }
}

/// Rejects every cover image with `has_text: true`, used by the cover
/// rejection-loop scenario to force a capped failure.
#[derive(Debug, Default)]
pub struct AlwaysRejectVisionInspector;

#[async_trait]
impl orchestrator::executor::providers::VisionInspector for AlwaysRejectVisionInspector {
    async fn inspect(&self, _image: &[u8]) -> Result<VisionInspection, String> {
        Ok(VisionInspection { has_text: true, slop_patterns: vec![] })
    }
}

/// A cover image generator that always errors, backing a cover-never-
/// composes scenario without touching the vision gate.
#[derive(Debug, Default)]
pub struct FailingImageGenerator;

#[async_trait]
impl orchestrator::executor::providers::ImageGenerator for FailingImageGenerator {
    async fn generate(&self, _prompt: &str, _seed: u64) -> Result<ImageGeneration, String> {
        Err("image provider unavailable".to_string())
    }
}

pub fn mock_providers() -> ProviderBundle {
    ProviderBundle {
        text: Box::new(CountingTextGenerator::default()),
        image: Box::new(MockImageGenerator),
        vision: Box::new(MockVisionInspector::new(0)),
        tts: Box::new(MockTtsSynthesizer),
        objects: Box::new(InMemoryObjectStore::default()),
    }
}

pub async fn test_controller() -> Arc<JobController> {
    let pool = test_pool().await;
    Arc::new(JobController::new(pool, mock_providers(), test_settings()))
}

/// Same as `test_controller`, but with a caller-supplied vision inspector —
/// used by the cover-rejection scenario, where the default (never-rejects)
/// inspector would hide the retry path entirely.
pub async fn test_controller_with_vision(
    vision: impl orchestrator::executor::providers::VisionInspector + 'static,
) -> Arc<JobController> {
    let pool = test_pool().await;
    let providers = ProviderBundle {
        text: Box::new(CountingTextGenerator::default()),
        image: Box::new(MockImageGenerator),
        vision: Box::new(vision),
        tts: Box::new(MockTtsSynthesizer),
        objects: Box::new(InMemoryObjectStore::default()),
    };
    Arc::new(JobController::new(pool, providers, test_settings()))
}

/// Same as `test_controller`, but also hands back the text-generator call
/// counter so a test can assert on it after the job finishes.
pub async fn test_controller_with_counter() -> (Arc<JobController>, Arc<AtomicUsize>) {
    let pool = test_pool().await;
    let (text, calls) = CountingTextGenerator::new();
    let providers = ProviderBundle {
        text: Box::new(text),
        image: Box::new(MockImageGenerator),
        vision: Box::new(MockVisionInspector::new(0)),
        tts: Box::new(MockTtsSynthesizer),
        objects: Box::new(InMemoryObjectStore::default()),
    };
    (Arc::new(JobController::new(pool, providers, test_settings())), calls)
}
