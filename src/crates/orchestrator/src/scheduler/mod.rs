//! Scheduler
//!
//! A pure function over (Phase Registry, Job, Checkpoints) that computes
//! which phase instances are runnable right now. No I/O, no async — the
//! Worker Loop and Controller call this and act on the result.

pub mod fanout;

use crate::db::models::{Checkpoint, Job};
use crate::phase::{CostClass, FanOut, PhaseSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Done,
    Blocked,
    Ready,
    InFlight,
}

#[derive(Debug, Clone)]
pub struct PhaseInstance {
    pub phase_name: &'static str,
    pub ordinal: u32,
    pub index: i64,
    pub cost_class: CostClass,
    pub status: InstanceStatus,
}

#[derive(Debug, Clone)]
pub struct SchedulerView {
    pub instances: Vec<PhaseInstance>,
    pub ready: Vec<PhaseInstance>,
    /// All required plan instances are `Done`.
    pub complete: bool,
    /// Set when the ready set is empty, nothing is in-flight, and some
    /// instance remains `Blocked` — always a bug (see spec's Deadlock term).
    pub deadlock: Option<String>,
}

/// `in_flight` carries the (phase_name, index) pairs currently held by an
/// advisory flag; the Scheduler itself never mutates that flag.
pub fn runnable_set(
    plan: &[PhaseSpec],
    job: &Job,
    checkpoints: &[Checkpoint],
    in_flight: &[(String, i64)],
) -> Result<SchedulerView, String> {
    let instances = active_plan_instances(plan, job, checkpoints)?;

    let done_key = |name: &str, idx: i64| checkpoints.iter().any(|c| c.phase_name == name && c.index == idx);
    let in_flight_key = |name: &str, idx: i64| in_flight.iter().any(|(n, i)| n == name && *i == idx);

    let mut resolved = Vec::with_capacity(instances.len());
    for (spec, index) in &instances {
        let status = if done_key(spec.name, *index) {
            InstanceStatus::Done
        } else if in_flight_key(spec.name, *index) {
            InstanceStatus::InFlight
        } else {
            let deps_done = spec.deps.iter().all(|dep| {
                // A dep on a fan-out phase is satisfied only when it has at
                // least one instance in the active plan and every one of
                // them is done — an empty instance set (the phase hasn't
                // been planned yet) must block, not vacuously pass.
                let dep_instances: Vec<i64> =
                    instances.iter().filter(|(s, _)| s.name == *dep).map(|(_, i)| *i).collect();
                !dep_instances.is_empty() && dep_instances.iter().all(|i| done_key(dep, *i))
            });
            if deps_done {
                InstanceStatus::Ready
            } else {
                InstanceStatus::Blocked
            }
        };
        resolved.push(PhaseInstance {
            phase_name: spec.name,
            ordinal: spec.ordinal,
            index: *index,
            cost_class: spec.cost_class,
            status,
        });
    }

    resolved.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then(a.index.cmp(&b.index)));

    let ready: Vec<PhaseInstance> = resolved.iter().filter(|i| i.status == InstanceStatus::Ready).cloned().collect();
    let any_in_flight = resolved.iter().any(|i| i.status == InstanceStatus::InFlight);
    let any_blocked = resolved.iter().any(|i| i.status == InstanceStatus::Blocked);

    let required_names: std::collections::HashSet<&str> =
        plan.iter().filter(|p| p.required).map(|p| p.name).collect();
    let complete = resolved
        .iter()
        .filter(|i| required_names.contains(i.phase_name))
        .all(|i| i.status == InstanceStatus::Done);

    let deadlock = if ready.is_empty() && !any_in_flight && any_blocked && !complete {
        let offenders: Vec<String> = resolved
            .iter()
            .filter(|i| i.status == InstanceStatus::Blocked)
            .map(|i| format!("{}[{}]", i.phase_name, i.index))
            .collect();
        Some(format!("no runnable instance; blocked on: {}", offenders.join(", ")))
    } else {
        None
    };

    Ok(SchedulerView { instances: resolved, ready, complete, deadlock })
}

/// Step 1 of the Scheduler algorithm: derive the active plan's instance
/// list. Returns `(spec, index)` pairs; fan-out phases contribute one pair
/// per derived index.
fn active_plan_instances<'a>(
    plan: &'a [PhaseSpec],
    job: &Job,
    checkpoints: &[Checkpoint],
) -> Result<Vec<(&'a PhaseSpec, i64)>, String> {
    let plan_checkpoint = checkpoints.iter().find(|c| c.phase_name == "plan" && c.index == 0);

    let mut instances = Vec::new();
    for spec in plan {
        match spec.fan_out {
            FanOut::Singleton => {
                if spec.name == "polish" {
                    continue; // handled below, gated on fan-out + mode
                }
                if spec.name == "cover" {
                    instances.push((spec, 0));
                    continue;
                }
                instances.push((spec, 0));
            }
            FanOut::Derived { from } => {
                let Some(plan_cp) = plan_checkpoint else {
                    // Plan hasn't run yet: only the minimal prefix exists.
                    continue;
                };
                if from != "plan" && from != "write" {
                    return Err(format!("unsupported fan-out source: {from}"));
                }
                if spec.name == "polish" && job.mode != "polished" {
                    continue;
                }
                let indices = fanout::derive_write_indices(plan_cp)?;
                for index in indices {
                    instances.push((spec, index));
                }
            }
        }
    }
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::canonical_plan;
    use proptest::prelude::*;
    use serde_json::json;

    fn job(mode: &str) -> Job {
        Job::new("job-1", "user-1", "A lighthouse keeper...", 10_000, mode)
    }

    fn plan_checkpoint() -> Checkpoint {
        let chapters = json!([{"title": "One", "scenes": [{"summary": "a"}]}]);
        Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp")
    }

    #[test]
    fn test_minimal_prefix_before_plan_runs() {
        let plan = canonical_plan();
        let j = job("draft");
        let view = runnable_set(&plan, &j, &[], &[]).unwrap();
        let ready_names: Vec<&str> = view.ready.iter().map(|i| i.phase_name).collect();
        assert_eq!(ready_names, vec!["concept"]);
    }

    #[test]
    fn test_write_fans_out_once_plan_done() {
        let plan = canonical_plan();
        let j = job("draft");
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_checkpoint(),
        ];
        let view = runnable_set(&plan, &j, &checkpoints, &[]).unwrap();
        let write_ready: Vec<&PhaseInstance> = view.ready.iter().filter(|i| i.phase_name == "write").collect();
        assert_eq!(write_ready.len(), 1);
        assert_eq!(write_ready[0].index, Checkpoint::compose_scene_index(0, 0));
    }

    #[test]
    fn test_polish_absent_in_draft_mode() {
        let plan = canonical_plan();
        let j = job("draft");
        let index = Checkpoint::compose_scene_index(0, 0);
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_checkpoint(),
            Checkpoint::new("job-1", "write", index, "{}", "fp"),
        ];
        let view = runnable_set(&plan, &j, &checkpoints, &[]).unwrap();
        assert!(view.instances.iter().all(|i| i.phase_name != "polish"));
    }

    #[test]
    fn test_complete_when_all_required_done() {
        let plan = canonical_plan();
        let j = job("draft");
        let index = Checkpoint::compose_scene_index(0, 0);
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_checkpoint(),
            Checkpoint::new("job-1", "write", index, "{}", "fp"),
            Checkpoint::new("job-1", "finalize", 0, "{}", "fp"),
        ];
        let view = runnable_set(&plan, &j, &checkpoints, &[]).unwrap();
        assert!(view.complete);
        assert!(view.ready.is_empty());
        assert!(view.deadlock.is_none());
    }

    #[test]
    fn test_deadlock_detected_for_broken_spec() {
        let mut plan = canonical_plan();
        plan.push(crate::phase::PhaseSpec {
            name: "phantom",
            ordinal: 99,
            deps: &["nonexistent"],
            fan_out: FanOut::Singleton,
            max_attempts: 1,
            cost_class: CostClass::Cheap,
            required: true,
            cacheable_globally: false,
        });
        let j = job("draft");
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_checkpoint(),
            Checkpoint::new("job-1", "write", Checkpoint::compose_scene_index(0, 0), "{}", "fp"),
            Checkpoint::new("job-1", "finalize", 0, "{}", "fp"),
        ];
        let view = runnable_set(&plan, &j, &checkpoints, &[]).unwrap();
        assert!(view.deadlock.is_some());
    }

    #[test]
    fn test_tie_break_ordinal_then_index() {
        let plan = canonical_plan();
        let j = job("draft");
        let chapters = json!([{"title": "One", "scenes": [{"summary": "a"}, {"summary": "b"}]}]);
        let plan_cp = Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp");
        let checkpoints = vec![
            Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
            Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
            plan_cp,
        ];
        let view = runnable_set(&plan, &j, &checkpoints, &[]).unwrap();
        let indices: Vec<i64> = view.ready.iter().filter(|i| i.phase_name == "write").map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    fn single_chapter_plan(scene_count: usize) -> Checkpoint {
        let scenes: Vec<serde_json::Value> =
            (0..scene_count).map(|i| json!({"summary": format!("scene {i}")})).collect();
        let chapters = json!([{"title": "One", "scenes": scenes}]);
        Checkpoint::new("job-1", "plan", 0, json!({"chapters": chapters}).to_string(), "fp")
    }

    fn done_count(plan: &[PhaseSpec], j: &Job, checkpoints: &[Checkpoint]) -> usize {
        runnable_set(plan, j, checkpoints, &[])
            .unwrap()
            .instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Done)
            .count()
    }

    proptest! {
        /// Invariant 1: as Checkpoints accumulate in dependency order, the
        /// number of `Done` instances the Scheduler reports never
        /// decreases. Progress (derived from this count) inherits the
        /// same monotonicity.
        #[test]
        fn prop_done_count_is_monotonic_as_checkpoints_accumulate(scene_count in 1usize..6) {
            let plan = canonical_plan();
            let j = job("draft");
            let plan_cp = single_chapter_plan(scene_count);

            let mut ordered_checkpoints = vec![
                Checkpoint::new("job-1", "concept", 0, "{}", "fp"),
                Checkpoint::new("job-1", "constitution", 0, "{}", "fp"),
                plan_cp,
            ];
            for scene_idx in 0..scene_count {
                ordered_checkpoints.push(Checkpoint::new(
                    "job-1",
                    "write",
                    Checkpoint::compose_scene_index(0, scene_idx as i64),
                    "{}",
                    "fp",
                ));
            }
            ordered_checkpoints.push(Checkpoint::new("job-1", "finalize", 0, "{}", "fp"));

            let mut previous = 0;
            for prefix_len in 1..=ordered_checkpoints.len() {
                let current = done_count(&plan, &j, &ordered_checkpoints[..prefix_len]);
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
