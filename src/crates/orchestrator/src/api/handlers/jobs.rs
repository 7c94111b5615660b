//! Job resource handlers
//!
//! Thin HTTP wrappers over `JobController`: every mutation goes through it
//! so the lease/state-machine invariants in `controller` are never
//! bypassed from the API layer.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{CheckpointListItem, CreateJobRequest, JobResponse, ManuscriptResponse};
use crate::api::routes::AppState;
use crate::db::repositories::{CheckpointRepository, ManuscriptRepository};

/// `POST /api/v1/jobs`
pub async fn create_job(
    State(app_state): State<AppState>,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<Json<JobResponse>> {
    let job = app_state.controller.create(body.into()).await?;
    let snapshot = app_state.controller.status(&job.id).await?;
    Ok(Json(snapshot.into()))
}

/// `GET /api/v1/jobs/:id`
pub async fn get_job(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let snapshot = app_state.controller.status(&id).await?;
    Ok(Json(snapshot.into()))
}

/// `POST /api/v1/jobs/:id/tick`
///
/// Drives the job forward synchronously up to its tick budget. The Worker
/// Loop calls the same `JobController::tick`; this route exists so a
/// client can force-advance a job (or a test can avoid waiting on the
/// poll interval) without a dedicated admin surface.
pub async fn tick_job(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let snapshot = app_state.controller.tick(&id).await?;
    Ok(Json(snapshot.into()))
}

/// `POST /api/v1/jobs/:id/cancel`
pub async fn cancel_job(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job = app_state.controller.cancel(&id).await?;
    Ok(Json(job.into()))
}

/// `GET /api/v1/jobs/:id/manuscript`
pub async fn get_manuscript(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ManuscriptResponse>> {
    let manuscript = ManuscriptRepository::get_by_job(app_state.controller.pool(), &id)
        .await
        .map_err(crate::db::DatabaseError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("manuscript not ready for job {id}")))?;

    let response = ManuscriptResponse::try_from(manuscript)?;
    Ok(Json(response))
}

/// `GET /api/v1/jobs/:id/checkpoints`
pub async fn list_checkpoints(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<CheckpointListItem>>> {
    let checkpoints = CheckpointRepository::list_by_job(app_state.controller.pool(), &id)
        .await
        .map_err(crate::db::DatabaseError::from)?;

    let items = checkpoints
        .into_iter()
        .map(CheckpointListItem::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(items))
}
