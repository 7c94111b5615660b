//! Progress Reporter
//!
//! Pure function over (Job, Checkpoints, Phase Registry) -> (percent,
//! label). Writer scenes dominate the weighting since they're the bulk of
//! the work; concept/constitution/plan/finalize are small fixed shares.

use crate::db::models::{Checkpoint, Job};
use crate::phase::{phase_by_name, PhaseSpec};
use crate::scheduler::{self, InstanceStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: u8,
    pub label: String,
}

/// Fixed weight per non-fan-out phase; the remainder is split across
/// writer (and, in polished mode, polish) scene instances.
const FIXED_PHASE_WEIGHT: f64 = 0.06;

fn human_label(phase_name: &str) -> &'static str {
    match phase_name {
        "concept" => "Distilling concept",
        "constitution" => "Establishing voice and rules",
        "plan" => "Plotting chapters and scenes",
        "write" => "Writing",
        "polish" => "Polishing prose",
        "cover" => "Generating cover",
        "finalize" => "Assembling manuscript",
        other => other,
    }
}

pub fn report(plan: &[PhaseSpec], job: &Job, checkpoints: &[Checkpoint]) -> Progress {
    let view = match scheduler::runnable_set(plan, job, checkpoints, &[]) {
        Ok(view) => view,
        Err(_) => return Progress { percent: job.progress.clamp(0, 100) as u8, label: "Error".to_string() },
    };

    if view.complete {
        return Progress { percent: 100, label: "Complete".to_string() };
    }

    let total = view.instances.len().max(1) as f64;
    let fan_out_count = view
        .instances
        .iter()
        .filter(|i| matches!(phase_by_name(i.phase_name).map(|p| p.fan_out), Some(crate::phase::FanOut::Derived { .. })))
        .count()
        .max(1) as f64;
    let fixed_count = total - fan_out_count;
    let fan_out_weight_total = (1.0 - FIXED_PHASE_WEIGHT * fixed_count).max(0.1);
    let per_fan_out_weight = fan_out_weight_total / fan_out_count;

    let done_weight: f64 = view
        .instances
        .iter()
        .filter(|i| i.status == InstanceStatus::Done)
        .map(|i| match phase_by_name(i.phase_name).map(|p| p.fan_out) {
            Some(crate::phase::FanOut::Derived { .. }) => per_fan_out_weight,
            _ => FIXED_PHASE_WEIGHT,
        })
        .sum();

    let percent = (done_weight * 100.0).round().clamp(0.0, 99.0) as u8;

    let label = match view.ready.first() {
        Some(instance) if instance.phase_name == "write" || instance.phase_name == "polish" => {
            let (chapter, scene) = Checkpoint::decompose_scene_index(instance.index);
            format!("Writing Chapter {}, Scene {}", chapter + 1, scene + 1)
        }
        Some(instance) => human_label(instance.phase_name).to_string(),
        None => "Working".to_string(),
    };

    Progress { percent, label }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::canonical_plan;
    use serde_json::json;

    fn job() -> Job {
        Job::new("job-1", "user-1", "prompt", 10_000, "draft")
    }

    #[test]
    fn test_no_checkpoints_reports_concept() {
        let plan = canonical_plan();
        let j = job();
        let progress = report(&plan, &j, &[]);
        assert_eq!(progress.label, "Distilling concept");
        assert_eq!(progress.percent, 0);
    }

    #[test]
    fn test_writer_instance_reports_chapter_and_scene() {
        let plan = canonical_plan();
        let j = job();
        let chapters = json!([{"title": "One", "scenes": [{"summary": "a"}, {"summary": "b"}]}]);
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp"),
        ];
        let progress = report(&plan, &j, &checkpoints);
        assert_eq!(progress.label, "Writing Chapter 1, Scene 1");
    }

    #[test]
    fn test_complete_job_reports_100() {
        let plan = canonical_plan();
        let j = job();
        let chapters = json!([{"title": "One", "scenes": [{"summary": "a"}]}]);
        let index = Checkpoint::compose_scene_index(0, 0);
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp"),
            Checkpoint::new("job-1", "write", index, "{}", "fp"),
            Checkpoint::new("job-1", "finalize", 0, "{}", "fp"),
        ];
        let progress = report(&plan, &j, &checkpoints);
        assert_eq!(progress.percent, 100);
        assert_eq!(progress.label, "Complete");
    }

    #[test]
    fn test_progress_monotonic_as_scenes_complete() {
        let plan = canonical_plan();
        let j = job();
        let chapters = json!([{"title": "One", "scenes": [{"summary": "a"}, {"summary": "b"}]}]);
        let plan_cp = Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp");
        let base = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_cp,
        ];
        let before = report(&plan, &j, &base).percent;

        let mut with_one_scene = base.clone();
        with_one_scene.push(Checkpoint::new("job-1", "write", Checkpoint::compose_scene_index(0, 0), "{}", "fp"));
        let after = report(&plan, &j, &with_one_scene).percent;

        assert!(after > before);
    }
}
