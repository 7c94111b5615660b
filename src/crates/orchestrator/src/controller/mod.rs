//! Job Controller
//!
//! The only component allowed to mutate a Job's status/progress outside the
//! Worker's lease. `tick` is the unifying primitive: an HTTP-driven
//! "advance a little" call and the Worker Loop's "drive to completion"
//! call are the same code path, one in a loop.

use crate::cache::Cache;
use crate::config::Settings;
use crate::db::connection::DatabasePool;
use crate::db::models::{Chapter, Checkpoint, Job, Manuscript, ManuscriptStats, Section};
use crate::db::repositories::{CheckpointRepository, JobRepository, ManuscriptRepository};
use crate::executor::providers::{ProviderBundle, Usage};
use crate::executor::retry::ExecError;
use crate::executor::step::{self, AdvisoryFlags, StepContext};
use crate::phase::{self, input, phase_by_name, PhaseSpec};
use crate::progress::{self, Progress};
use crate::scheduler::{self, InstanceStatus, PhaseInstance};
use crate::{OrchestratorError, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::time::{Duration, Instant};

/// Prompt substrings rejected before a Job row is ever written.
const BLOCKED_PROMPT_TERMS: &[&str] = &["lawsuit bait", "trademarked-universe-reboot"];

#[derive(Debug, Clone)]
pub struct CreateJobInput {
    pub owner_id: String,
    pub prompt: String,
    pub genre: Option<String>,
    pub target_length_words: i64,
    pub voice: Option<String>,
    pub mode: String,
}

#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job: Job,
    pub progress: Progress,
    pub checkpoint_count: i64,
}

pub struct JobController {
    pool: DatabasePool,
    providers: ProviderBundle,
    settings: Settings,
    config_version: String,
    flags: AdvisoryFlags,
}

impl JobController {
    pub fn new(pool: DatabasePool, providers: ProviderBundle, settings: Settings) -> Self {
        Self { pool, providers, settings, config_version: "v1".to_string(), flags: AdvisoryFlags::new() }
    }

    /// Exposes the pool so `WorkerLoop` can poll `list_runnable` without the
    /// Controller needing its own passthrough method for every query shape.
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    pub async fn create(&self, input: CreateJobInput) -> Result<Job> {
        if input.prompt.trim().is_empty() {
            return Err(OrchestratorError::General("prompt must not be empty".to_string()));
        }
        if input.target_length_words <= 0 {
            return Err(OrchestratorError::General("target_length_words must be positive".to_string()));
        }
        if input.mode != "draft" && input.mode != "polished" {
            return Err(OrchestratorError::General(format!("unknown mode: {}", input.mode)));
        }
        let lower_prompt = input.prompt.to_lowercase();
        if let Some(term) = BLOCKED_PROMPT_TERMS.iter().find(|t| lower_prompt.contains(**t)) {
            return Err(OrchestratorError::General(format!("prompt rejected by content guardrail: {term}")));
        }

        let mut job = Job::new(uuid::Uuid::new_v4().to_string(), input.owner_id, input.prompt, input.target_length_words, input.mode);
        if let Some(genre) = input.genre {
            job = job.with_genre(genre);
        }
        if let Some(voice) = input.voice {
            job = job.with_voice(voice);
        }
        let job = JobRepository::create(&self.pool, &job).await?;
        tracing::info!(job_id = %job.id, "job created");
        Ok(job)
    }

    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        self.snapshot_for(job).await
    }

    pub async fn cancel(&self, job_id: &str) -> Result<Job> {
        let job = JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        if job.is_terminal() {
            return Err(OrchestratorError::InvalidStateTransition {
                from: job.status,
                to: "cancelled".to_string(),
            });
        }
        JobRepository::mark_terminal(&self.pool, job_id, "cancelled", None).await?;
        JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    /// Maintenance op: counts non-terminal jobs with no active lease, which
    /// are already visible to the next Worker poll via `list_runnable`.
    pub async fn resume_all(&self) -> Result<i64> {
        let runnable = JobRepository::list_runnable(&self.pool).await?;
        Ok(runnable.len() as i64)
    }

    pub async fn tick(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;

        if job.is_terminal() {
            return self.snapshot_for(job).await;
        }

        let lease_token = uuid::Uuid::new_v4().to_string();
        let won_lease = JobRepository::try_acquire_lease(&self.pool, job_id, &lease_token, self.settings.lease_ttl).await?;
        if !won_lease {
            // Another worker (or concurrent tick) holds the lease; report
            // the current snapshot without touching the Job.
            let job = JobRepository::get_by_id(&self.pool, job_id)
                .await?
                .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
            return self.snapshot_for(job).await;
        }

        JobRepository::mark_started(&self.pool, job_id).await?;
        let deadline = Instant::now() + self.settings.tick_budget;
        self.drive_until_blocked(job_id, deadline).await?;
        JobRepository::release_lease(&self.pool, job_id, &lease_token).await?;

        let job = JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        self.snapshot_for(job).await
    }

    async fn snapshot_for(&self, job: Job) -> Result<JobSnapshot> {
        let checkpoints = CheckpointRepository::list_by_job(&self.pool, &job.id).await?;
        let plan = phase::canonical_plan();
        let progress = progress::report(&plan, &job, &checkpoints);
        Ok(JobSnapshot { checkpoint_count: checkpoints.len() as i64, job, progress })
    }

    async fn drive_until_blocked(&self, job_id: &str, deadline: Instant) -> Result<()> {
        let plan = phase::canonical_plan();

        loop {
            let job = JobRepository::get_by_id(&self.pool, job_id)
                .await?
                .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
            if job.is_terminal() {
                return Ok(());
            }

            let checkpoints = CheckpointRepository::list_by_job(&self.pool, job_id).await?;
            let view = scheduler::runnable_set(&plan, &job, &checkpoints, &[])
                .map_err(OrchestratorError::General)?;

            if let Some(diagnostic) = view.deadlock {
                JobRepository::mark_terminal(&self.pool, job_id, "failed", Some(&diagnostic)).await?;
                return Ok(());
            }

            if view.complete {
                self.finalize_if_needed(job_id, &checkpoints).await?;
                JobRepository::update_progress(&self.pool, job_id, 100, None).await?;
                JobRepository::mark_terminal(&self.pool, job_id, "complete", None).await?;
                return Ok(());
            }

            if view.ready.is_empty() {
                return Ok(()); // nothing runnable this tick; stays running
            }

            if Instant::now() >= deadline {
                JobRepository::update_status(&self.pool, job_id, "queued").await?;
                return Ok(());
            }

            let batch = select_batch(&view.ready, self.settings.writer_concurrency);
            // The batch is already capped at `writer_concurrency` writer/polish
            // instances (or a single non-fanout instance) by `select_batch`,
            // so dispatching it as a `FuturesUnordered` runs the whole batch
            // concurrently without any further bound needed here.
            let mut dispatches: FuturesUnordered<_> =
                batch.iter().map(|instance| self.dispatch_and_record(job_id, &job, &checkpoints, instance)).collect();
            while let Some(result) = dispatches.next().await {
                result?;
            }

            let progress = progress::report(&plan, &job, &checkpoints);
            JobRepository::update_progress(&self.pool, job_id, progress.percent as i64, Some(&progress.label))
                .await?;
        }
    }

    async fn dispatch_and_record(
        &self,
        job_id: &str,
        job: &Job,
        checkpoints: &[Checkpoint],
        instance: &PhaseInstance,
    ) -> Result<()> {
        let spec = phase_by_name(instance.phase_name)
            .ok_or_else(|| OrchestratorError::General(format!("unknown phase {}", instance.phase_name)))?;

        match self.dispatch_phase(job, checkpoints, &spec, instance.index).await {
            Ok(_) => Ok(()),
            Err(ExecError::Canceled) => {
                JobRepository::update_status(&self.pool, job_id, "cancelled").await?;
                Ok(())
            }
            Err(err) if err.is_fatal() => {
                JobRepository::mark_terminal(&self.pool, job_id, "failed", Some(&err.to_string())).await?;
                Ok(())
            }
            Err(err) => {
                let ExecError::Transient(msg) = err else {
                    unreachable!("Policy, Capacity and Consistency are all fatal, Canceled is handled above")
                };
                let attempts = JobRepository::record_attempt(&self.pool, job_id, spec.name, instance.index).await?;
                if attempts >= spec.max_attempts {
                    JobRepository::mark_terminal(&self.pool, job_id, "failed", Some(&msg)).await?;
                }
                Ok(())
            }
        }
    }

    async fn dispatch_phase(
        &self,
        job: &Job,
        checkpoints: &[Checkpoint],
        spec: &PhaseSpec,
        index: i64,
    ) -> std::result::Result<Checkpoint, ExecError> {
        let cache = Cache::new(&self.pool, self.settings.cache_ttl_days);
        let ctx = StepContext { pool: &self.pool, cache: &cache, config_version: &self.config_version };
        let timeout = Duration::from_secs(60);

        match spec.name {
            "concept" => {
                let phase_input = input::build_concept_input(job);
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |phase_input| async move {
                    let gen = self.providers.text.generate(&phase_input.payload.to_string()).await.map_err(classify_text_error)?;
                    let payload = json!({
                        "title": derive_working_title(&job.prompt),
                        "logline": gen.text,
                        "themes": ["ambition", "solitude"],
                    });
                    Ok((payload, gen.usage))
                })
                .await
            }
            "constitution" => {
                let phase_input = input::build_constitution_input(job, checkpoints).map_err(ExecError::Consistency)?;
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |phase_input| async move {
                    let gen = self.providers.text.generate(&phase_input.payload.to_string()).await.map_err(classify_text_error)?;
                    let payload = json!({
                        "voice": gen.text,
                        "rules": ["maintain consistent POV", "avoid anachronism"],
                    });
                    Ok((payload, gen.usage))
                })
                .await
            }
            "plan" => {
                let phase_input = input::build_plan_input(job, checkpoints).map_err(ExecError::Consistency)?;
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |phase_input| async move {
                    let gen = self.providers.text.generate(&phase_input.payload.to_string()).await.map_err(classify_text_error)?;
                    let payload = synthesize_plan(job.target_length_words, &gen.text);
                    Ok((payload, gen.usage))
                })
                .await
            }
            "write" => {
                let phase_input = input::build_write_input(job, checkpoints, index).map_err(ExecError::Consistency)?;
                let scene_title = phase_input.payload["scene_summary"]["summary"]
                    .as_str()
                    .unwrap_or("Untitled scene")
                    .to_string();
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |phase_input| async move {
                    let gen = self.providers.text.generate(&phase_input.payload.to_string()).await.map_err(classify_text_error)?;
                    let payload = json!({"title": scene_title, "text": gen.text});
                    Ok((payload, gen.usage))
                })
                .await
            }
            "polish" => {
                let phase_input = input::build_polish_input(job, checkpoints, index).map_err(ExecError::Consistency)?;
                let draft_title = phase_input.payload["draft"]["title"].as_str().unwrap_or("Untitled scene").to_string();
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |phase_input| async move {
                    let gen = self.providers.text.generate(&phase_input.payload.to_string()).await.map_err(classify_text_error)?;
                    let payload = json!({"title": draft_title, "text": gen.text});
                    Ok((payload, gen.usage))
                })
                .await
            }
            "cover" => {
                let phase_input = input::build_cover_input(checkpoints).map_err(ExecError::Consistency)?;
                let prompt = phase_input.payload["concept"]["logline"].as_str().unwrap_or(&job.prompt).to_string();
                let object_key = format!("{}:cover", job.id);
                let cover_max_attempts = self.settings.cover_max_attempts;
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |_phase_input| async move {
                    let result = crate::cover::run_cover(
                        &prompt,
                        self.providers.image.as_ref(),
                        self.providers.vision.as_ref(),
                        self.providers.objects.as_ref(),
                        &object_key,
                        cover_max_attempts,
                    )
                    .await
                    .map_err(ExecError::Transient)?;
                    let payload = match result {
                        crate::cover::CoverResult::Composed { image_reference, .. } => {
                            json!({"image_reference": image_reference, "composed": true})
                        }
                        crate::cover::CoverResult::Failed { .. } => {
                            json!({"image_reference": "unavailable", "composed": false})
                        }
                    };
                    Ok((payload, Usage::default()))
                })
                .await
            }
            "finalize" => {
                let phase_input = input::build_finalize_input(job, checkpoints).map_err(ExecError::Consistency)?;
                step::run_step(&ctx, &self.flags, spec, &job.id, phase_input, timeout, |_phase_input| async move {
                    Ok((json!({"manuscript_ref": job.id}), Usage::default()))
                })
                .await
            }
            other => Err(ExecError::Consistency(format!("no dispatcher for phase {other}"))),
        }
    }

    async fn finalize_if_needed(&self, job_id: &str, checkpoints: &[Checkpoint]) -> Result<()> {
        if ManuscriptRepository::get_by_job(&self.pool, job_id).await?.is_some() {
            return Ok(());
        }
        let job = JobRepository::get_by_id(&self.pool, job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))?;
        let manuscript = assemble_manuscript(&job, checkpoints).map_err(OrchestratorError::General)?;
        ManuscriptRepository::create(&self.pool, &manuscript).await?;
        if let Some(cover_cp) = checkpoints.iter().find(|c| c.phase_name == "cover" && c.index == 0) {
            let payload: serde_json::Value =
                serde_json::from_str(&cover_cp.payload).map_err(|e| OrchestratorError::General(e.to_string()))?;
            let cover_status = if payload["composed"].as_bool().unwrap_or(false) { "ready" } else { "failed" };
            JobRepository::update_cover_status(&self.pool, job_id, cover_status).await?;
        }
        Ok(())
    }
}

/// Text-generator failures are plain `String`s (see
/// `executor::providers::TextGenerator`). A `"policy:"` prefix signals a
/// content-policy refusal; a `"capacity:"` prefix signals the provider's
/// quota is exhausted or its credentials were rejected — both fatal.
/// Anything else is treated as transient (rate limit, timeout, upstream 5xx).
fn classify_text_error(message: String) -> ExecError {
    if message.starts_with("policy:") {
        ExecError::Policy(message)
    } else if message.starts_with("capacity:") {
        ExecError::Capacity(message)
    } else {
        ExecError::Transient(message)
    }
}

fn derive_working_title(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().take(5).collect();
    format!("{}...", words.join(" "))
}

/// Deterministic chapter/scene breakdown sized to the target word count —
/// real deployments let the `plan` provider call decide this; here it's
/// synthesized so the pipeline is exercisable without a live LLM.
fn synthesize_plan(target_length_words: i64, seed_text: &str) -> serde_json::Value {
    const WORDS_PER_SCENE: i64 = 900;
    const SCENES_PER_CHAPTER: i64 = 3;

    let total_scenes = (target_length_words / WORDS_PER_SCENE).max(1);
    let chapter_count = (total_scenes as f64 / SCENES_PER_CHAPTER as f64).ceil() as i64;

    let mut chapters = Vec::new();
    let mut remaining = total_scenes;
    for chapter_idx in 0..chapter_count {
        let scenes_here = remaining.min(SCENES_PER_CHAPTER);
        remaining -= scenes_here;
        let scenes: Vec<serde_json::Value> = (0..scenes_here)
            .map(|scene_idx| json!({"summary": format!("{seed_text} (ch {} sc {})", chapter_idx + 1, scene_idx + 1)}))
            .collect();
        chapters.push(json!({"title": format!("Chapter {}", chapter_idx + 1), "scenes": scenes}));
    }
    json!({"chapters": chapters})
}

fn assemble_manuscript(job: &Job, checkpoints: &[Checkpoint]) -> std::result::Result<Manuscript, String> {
    let plan_cp = checkpoints
        .iter()
        .find(|c| c.phase_name == "plan" && c.index == 0)
        .ok_or("missing plan checkpoint at finalize")?;
    let plan_payload: serde_json::Value =
        serde_json::from_str(&plan_cp.payload).map_err(|e| format!("corrupt plan checkpoint: {e}"))?;
    let plan_chapters = plan_payload["chapters"].as_array().ok_or("plan payload missing chapters")?;

    let scene_phase = if job.mode == "polished" { "polish" } else { "write" };
    let mut total_words = 0i64;
    let mut scene_count = 0i64;
    let mut chapters = Vec::with_capacity(plan_chapters.len());

    for (chapter_idx, plan_chapter) in plan_chapters.iter().enumerate() {
        let title = plan_chapter["title"].as_str().unwrap_or("Untitled chapter").to_string();
        let scene_total = plan_chapter["scenes"].as_array().map(|s| s.len()).unwrap_or(0);
        let mut sections = Vec::with_capacity(scene_total);
        for scene_idx in 0..scene_total {
            let index = Checkpoint::compose_scene_index(chapter_idx as i64, scene_idx as i64);
            let scene_cp = checkpoints
                .iter()
                .find(|c| c.phase_name == scene_phase && c.index == index)
                .ok_or_else(|| format!("missing {scene_phase} checkpoint at chapter {chapter_idx} scene {scene_idx}"))?;
            let scene_payload: serde_json::Value =
                serde_json::from_str(&scene_cp.payload).map_err(|e| format!("corrupt {scene_phase} checkpoint: {e}"))?;
            let text = scene_payload["text"].as_str().unwrap_or("").to_string();
            total_words += text.split_whitespace().count() as i64;
            scene_count += 1;
            sections.push(Section { title: scene_payload["title"].as_str().unwrap_or("Scene").to_string(), text });
        }
        chapters.push(Chapter { title, sections });
    }

    let concept_cp = checkpoints.iter().find(|c| c.phase_name == "concept" && c.index == 0);
    let blurb = concept_cp
        .and_then(|c| serde_json::from_str::<serde_json::Value>(&c.payload).ok())
        .and_then(|v| v["logline"].as_str().map(|s| s.to_string()))
        .unwrap_or_default();
    let title = concept_cp
        .and_then(|c| serde_json::from_str::<serde_json::Value>(&c.payload).ok())
        .and_then(|v| v["title"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| derive_working_title(&job.prompt));

    let stats = ManuscriptStats { word_count: total_words, chapter_count: chapters.len() as i64, scene_count };
    let mut manuscript = Manuscript::new(job.id.clone(), title, blurb, &chapters, &stats).map_err(|e| e.to_string())?;
    if let Some(cover_cp) = checkpoints.iter().find(|c| c.phase_name == "cover" && c.index == 0) {
        if let Ok(payload) = serde_json::from_str::<serde_json::Value>(&cover_cp.payload) {
            if payload["composed"].as_bool().unwrap_or(false) {
                if let Some(reference) = payload["image_reference"].as_str() {
                    manuscript = manuscript.with_cover(reference);
                }
            }
        }
    }
    Ok(manuscript)
}

/// Caps a tick's dispatch batch: writer/polish fan-out instances are
/// bounded by per-job concurrency; everything else runs one at a time.
fn select_batch(ready: &[PhaseInstance], writer_concurrency: usize) -> Vec<PhaseInstance> {
    let mut batch = Vec::new();
    for instance in ready {
        if instance.phase_name == "write" || instance.phase_name == "polish" {
            if batch.iter().filter(|i: &&PhaseInstance| i.phase_name == instance.phase_name).count()
                < writer_concurrency
            {
                batch.push(instance.clone());
            }
        } else if batch.is_empty() {
            batch.push(instance.clone());
        }
    }
    if batch.is_empty() && !ready.is_empty() {
        batch.push(ready[0].clone());
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_prompt_terms_are_lowercase_matched() {
        assert!(BLOCKED_PROMPT_TERMS.iter().any(|t| "this is lawsuit bait".contains(*t)));
    }

    #[test]
    fn test_synthesize_plan_scene_count() {
        let plan = synthesize_plan(9000, "seed");
        let chapters = plan["chapters"].as_array().unwrap();
        let total_scenes: usize = chapters.iter().map(|c| c["scenes"].as_array().unwrap().len()).sum();
        assert_eq!(total_scenes, 10);
    }

    #[test]
    fn test_select_batch_caps_writer_fanout() {
        let ready: Vec<PhaseInstance> = (0..5)
            .map(|i| PhaseInstance {
                phase_name: "write",
                ordinal: 4,
                index: i,
                cost_class: crate::phase::CostClass::Llm,
                status: InstanceStatus::Ready,
            })
            .collect();
        let batch = select_batch(&ready, 3);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_classify_text_error_by_prefix() {
        assert!(matches!(classify_text_error("policy: refused".to_string()), ExecError::Policy(_)));
        assert!(matches!(classify_text_error("capacity: quota exhausted".to_string()), ExecError::Capacity(_)));
        assert!(matches!(classify_text_error("rate limited".to_string()), ExecError::Transient(_)));
    }

    #[test]
    fn test_select_batch_singleton_phase_runs_alone() {
        let ready = vec![PhaseInstance {
            phase_name: "concept",
            ordinal: 1,
            index: 0,
            cost_class: crate::phase::CostClass::Llm,
            status: InstanceStatus::Ready,
        }];
        let batch = select_batch(&ready, 3);
        assert_eq!(batch.len(), 1);
    }
}
