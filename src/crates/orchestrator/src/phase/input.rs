//! Per-phase input builders.
//!
//! Pure functions mapping a Job's creative brief and its upstream
//! Checkpoints to the `PhaseInput` payload handed to the Step Executor.
//! None of these touch the database; callers fetch the upstream
//! Checkpoints and pass them in.

use super::PhaseInput;
use crate::db::models::{Checkpoint, Job};
use serde_json::{json, Value};

fn payload_of(checkpoint: &Checkpoint) -> Result<Value, String> {
    serde_json::from_str(&checkpoint.payload)
        .map_err(|e| format!("corrupt checkpoint payload for {}: {e}", checkpoint.phase_name))
}

fn find<'a>(checkpoints: &'a [Checkpoint], phase_name: &str, index: i64) -> Option<&'a Checkpoint> {
    checkpoints.iter().find(|c| c.phase_name == phase_name && c.index == index)
}

pub fn build_concept_input(job: &Job) -> PhaseInput {
    PhaseInput {
        phase_name: "concept".to_string(),
        index: 0,
        payload: json!({
            "prompt": job.prompt,
            "genre": job.genre,
            "target_length_words": job.target_length_words,
            "voice": job.voice,
        }),
    }
}

pub fn build_constitution_input(job: &Job, checkpoints: &[Checkpoint]) -> Result<PhaseInput, String> {
    let concept = find(checkpoints, "concept", 0).ok_or("missing concept checkpoint")?;
    Ok(PhaseInput {
        phase_name: "constitution".to_string(),
        index: 0,
        payload: json!({
            "concept": payload_of(concept)?,
            "voice": job.voice,
        }),
    })
}

pub fn build_plan_input(job: &Job, checkpoints: &[Checkpoint]) -> Result<PhaseInput, String> {
    let concept = find(checkpoints, "concept", 0).ok_or("missing concept checkpoint")?;
    let constitution = find(checkpoints, "constitution", 0).ok_or("missing constitution checkpoint")?;
    Ok(PhaseInput {
        phase_name: "plan".to_string(),
        index: 0,
        payload: json!({
            "concept": payload_of(concept)?,
            "constitution": payload_of(constitution)?,
            "target_length_words": job.target_length_words,
        }),
    })
}

/// `index` is the composed `chapter * 10000 + scene` fan-out index.
pub fn build_write_input(job: &Job, checkpoints: &[Checkpoint], index: i64) -> Result<PhaseInput, String> {
    let constitution = find(checkpoints, "constitution", 0).ok_or("missing constitution checkpoint")?;
    let plan = find(checkpoints, "plan", 0).ok_or("missing plan checkpoint")?;
    let (chapter, scene) = Checkpoint::decompose_scene_index(index);
    let plan_payload = payload_of(plan)?;
    let scene_summary = plan_payload
        .get("chapters")
        .and_then(|c| c.get(chapter as usize))
        .and_then(|ch| ch.get("scenes"))
        .and_then(|s| s.get(scene as usize))
        .cloned()
        .ok_or_else(|| format!("plan has no scene at chapter {chapter} scene {scene}"))?;

    Ok(PhaseInput {
        phase_name: "write".to_string(),
        index,
        payload: json!({
            "constitution": payload_of(constitution)?,
            "chapter": chapter,
            "scene": scene,
            "scene_summary": scene_summary,
            "mode": job.mode,
        }),
    })
}

/// Only called when `job.mode == "polished"`; the Scheduler decides whether
/// this phase is runnable for a given job (see `phase::registry`'s note
/// that `required` can't vary by job).
pub fn build_polish_input(job: &Job, checkpoints: &[Checkpoint], index: i64) -> Result<PhaseInput, String> {
    let constitution = find(checkpoints, "constitution", 0).ok_or("missing constitution checkpoint")?;
    let write = find(checkpoints, "write", index).ok_or("missing write checkpoint for this scene")?;
    Ok(PhaseInput {
        phase_name: "polish".to_string(),
        index,
        payload: json!({
            "constitution": payload_of(constitution)?,
            "draft": payload_of(write)?,
            "mode": job.mode,
        }),
    })
}

pub fn build_cover_input(checkpoints: &[Checkpoint]) -> Result<PhaseInput, String> {
    let concept = find(checkpoints, "concept", 0).ok_or("missing concept checkpoint")?;
    let plan = find(checkpoints, "plan", 0).ok_or("missing plan checkpoint")?;
    Ok(PhaseInput {
        phase_name: "cover".to_string(),
        index: 0,
        payload: json!({
            "concept": payload_of(concept)?,
            "plan": payload_of(plan)?,
        }),
    })
}

pub fn build_finalize_input(job: &Job, checkpoints: &[Checkpoint]) -> Result<PhaseInput, String> {
    let mut scenes: Vec<&Checkpoint> = checkpoints
        .iter()
        .filter(|c| c.phase_name == if job.mode == "polished" { "polish" } else { "write" })
        .collect();
    scenes.sort_by_key(|c| c.index);
    let scene_payloads: Result<Vec<Value>, String> = scenes.iter().map(|c| payload_of(c)).collect();
    let cover = find(checkpoints, "cover", 0).map(payload_of).transpose()?;

    Ok(PhaseInput {
        phase_name: "finalize".to_string(),
        index: 0,
        payload: json!({
            "scenes": scene_payloads?,
            "cover": cover,
            "job_id": job.id,
        }),
    })
}
