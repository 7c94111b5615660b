//! Step Executor: runs one phase instance to completion.
//!
//! The 8-step contract: acquire advisory flag, build input (by the caller,
//! via `phase::input`), check cache, invoke the provider under a timeout,
//! validate the output schema, persist the Checkpoint with precondition
//! "absent", record usage and publish to cache, release the flag.

use super::providers::Usage;
use super::retry::ExecError;
use crate::cache::{fingerprint, Cache};
use crate::db::connection::DatabasePool;
use crate::db::models::Checkpoint;
use crate::db::repositories::CheckpointRepository;
use crate::phase::{schema, PhaseInput, PhaseSpec};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

/// In-process "running-this-step" flag, keyed by (job_id, phase_name,
/// index). Prevents a single Worker process from double-dispatching the
/// same instance within one tick; cross-process exclusivity comes from the
/// Job lease the Worker holds.
#[derive(Default)]
pub struct AdvisoryFlags {
    held: Mutex<HashSet<(String, String, i64)>>,
}

impl AdvisoryFlags {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(job_id: &str, phase_name: &str, index: i64) -> (String, String, i64) {
        (job_id.to_string(), phase_name.to_string(), index)
    }

    pub fn try_acquire(&self, job_id: &str, phase_name: &str, index: i64) -> bool {
        self.held.lock().unwrap().insert(Self::key(job_id, phase_name, index))
    }

    pub fn release(&self, job_id: &str, phase_name: &str, index: i64) {
        self.held.lock().unwrap().remove(&Self::key(job_id, phase_name, index));
    }
}

pub struct StepContext<'a> {
    pub pool: &'a DatabasePool,
    pub cache: &'a Cache<'a>,
    pub config_version: &'a str,
}

/// Runs one phase instance. `call_provider` performs step 4 (the actual
/// external call) and must itself map provider failures onto `ExecError`
/// so this function stays provider-agnostic.
pub async fn run_step<F, Fut>(
    ctx: &StepContext<'_>,
    flags: &AdvisoryFlags,
    spec: &PhaseSpec,
    job_id: &str,
    input: PhaseInput,
    timeout: Duration,
    call_provider: F,
) -> Result<Checkpoint, ExecError>
where
    F: FnOnce(PhaseInput) -> Fut,
    Fut: Future<Output = Result<(serde_json::Value, Usage), ExecError>>,
{
    let phase_name = spec.name;
    let index = input.index;

    // Step 1
    if !flags.try_acquire(job_id, phase_name, index) {
        return Err(ExecError::Capacity(format!("{phase_name}[{index}] already running")));
    }
    let result = run_step_inner(ctx, spec, job_id, input, timeout, call_provider).await;
    // Step 8
    flags.release(job_id, phase_name, index);
    result
}

async fn run_step_inner<F, Fut>(
    ctx: &StepContext<'_>,
    spec: &PhaseSpec,
    job_id: &str,
    input: PhaseInput,
    timeout: Duration,
    call_provider: F,
) -> Result<Checkpoint, ExecError>
where
    F: FnOnce(PhaseInput) -> Fut,
    Fut: Future<Output = Result<(serde_json::Value, Usage), ExecError>>,
{
    let phase_name = spec.name;
    let index = input.index;

    // Step 3: compute fingerprint, check cache.
    let fp = fingerprint::compute(phase_name, &input.payload, ctx.config_version);
    if let Some(cached_location) = ctx
        .cache
        .lookup(&fp)
        .await
        .map_err(|e| ExecError::Consistency(format!("cache lookup failed: {e}")))?
    {
        let checkpoint = Checkpoint::new(job_id, phase_name, index, cached_location, fp);
        return persist(ctx.pool, checkpoint).await;
    }

    // Step 4: invoke provider under timeout.
    let (payload, usage) = tokio::time::timeout(timeout, call_provider(input))
        .await
        .map_err(|_| ExecError::Transient(format!("{phase_name}[{index}] timed out")))??;

    // Step 5: validate output.
    schema::validate(phase_name, &payload).map_err(ExecError::Transient)?;

    // Step 6: persist with precondition absent.
    let checkpoint = Checkpoint::new(job_id, phase_name, index, payload.to_string(), fp.clone())
        .with_usage(usage.tokens_in, usage.tokens_out, usage.cost_cents, timeout.as_millis() as i64);
    let checkpoint = persist(ctx.pool, checkpoint).await?;

    // Step 7: publish to cache.
    let location = format!("{job_id}:{phase_name}:{index}");
    ctx.cache
        .publish(&fp, &location, spec.cacheable_globally)
        .await
        .map_err(|e| ExecError::Consistency(format!("cache publish failed: {e}")))?;

    Ok(checkpoint)
}

async fn persist(pool: &DatabasePool, checkpoint: Checkpoint) -> Result<Checkpoint, ExecError> {
    CheckpointRepository::create_if_absent(pool, &checkpoint)
        .await
        .map_err(|e| ExecError::Consistency(format!("checkpoint write failed: {e}")))
}
