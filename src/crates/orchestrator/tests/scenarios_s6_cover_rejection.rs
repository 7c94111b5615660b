//! Scenario S6: the vision inspector rejects the first cover render (it
//! "contains text") and accepts the second. The cover subsystem's internal
//! retry must absorb the rejection without failing the job, land on
//! `cover_status: "ready"`, and the composed checkpoint must reference the
//! second attempt's image.

mod support;

use orchestrator::controller::CreateJobInput;
use orchestrator::db::repositories::{CheckpointRepository, JobRepository};
use orchestrator::executor::providers::MockVisionInspector;

#[tokio::test]
async fn test_cover_rejection_then_composed_reaches_ready() {
    let controller = support::test_controller_with_vision(MockVisionInspector::new(1)).await;

    let job = controller
        .create(CreateJobInput {
            owner_id: "user-1".to_string(),
            prompt: "A clockmaker builds a tower that keeps the wrong time on purpose.".to_string(),
            genre: Some("fantasy".to_string()),
            target_length_words: 1800,
            voice: None,
            mode: "draft".to_string(),
        })
        .await
        .unwrap();

    let snapshot = controller.tick(&job.id).await.unwrap();
    assert_eq!(snapshot.job.status, "complete");

    let job_row = JobRepository::get_by_id(controller.pool(), &job.id).await.unwrap().unwrap();
    assert_eq!(job_row.cover_status, "ready");

    let checkpoints = CheckpointRepository::list_by_job(controller.pool(), &job.id).await.unwrap();
    let cover_cp = checkpoints.iter().find(|c| c.phase_name == "cover").expect("cover checkpoint written");
    let payload: serde_json::Value = serde_json::from_str(&cover_cp.payload).unwrap();
    assert_eq!(payload["composed"], serde_json::json!(true));
    assert_ne!(payload["image_reference"], serde_json::json!("unavailable"));
}
