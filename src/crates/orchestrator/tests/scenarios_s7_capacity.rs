//! Scenario S7: the text provider reports its quota exhausted. Like a
//! content-policy refusal this is fatal and not retriable, but unlike a
//! retriable Transient failure it must never consume an attempt — the job
//! fails immediately on the first call.

mod support;

use orchestrator::controller::{CreateJobInput, JobController};
use orchestrator::db::repositories::CheckpointRepository;
use orchestrator::executor::providers::{
    InMemoryObjectStore, MockImageGenerator, MockTtsSynthesizer, MockVisionInspector, ProviderBundle,
    ScriptedTextGenerator,
};

#[tokio::test]
async fn test_provider_capacity_exhaustion_fails_job_without_retry() {
    let pool = support::test_pool().await;
    let providers = ProviderBundle {
        text: Box::new(ScriptedTextGenerator::new(vec![Err("capacity: monthly quota exhausted".to_string())])),
        image: Box::new(MockImageGenerator),
        vision: Box::new(MockVisionInspector::new(0)),
        tts: Box::new(MockTtsSynthesizer),
        objects: Box::new(InMemoryObjectStore::default()),
    };
    let controller = JobController::new(pool, providers, support::test_settings());

    let job = controller
        .create(CreateJobInput {
            owner_id: "user-1".to_string(),
            prompt: "A quiet diner on the edge of a desert highway.".to_string(),
            genre: Some("drama".to_string()),
            target_length_words: 5_000,
            voice: None,
            mode: "draft".to_string(),
        })
        .await
        .unwrap();

    let snapshot = controller.tick(&job.id).await.unwrap();

    assert_eq!(snapshot.job.status, "failed");
    assert!(snapshot.job.last_error.as_deref().unwrap_or_default().contains("capacity exhausted"));
    assert_eq!(snapshot.job.progress, 0);

    let checkpoints = CheckpointRepository::list_by_job(controller.pool(), &job.id).await.unwrap();
    assert!(checkpoints.is_empty(), "no checkpoint survives a fatal capacity failure on the very first phase");

    // A fatal capacity failure bubbles straight to a failed Job without
    // ever being recorded as a retriable attempt.
    assert_eq!(snapshot.job.attempt_count("concept", 0), 0);
}
