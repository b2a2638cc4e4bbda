use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::database::entities::story_jobs;
use crate::errors::CoreError;
use crate::server::app::AppState;

/// Job as returned to clients polling for their story
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobResponse {
    pub job_id: String,
    /// One of `pending`, `processing`, `completed`, `failed`
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub story_id: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl From<story_jobs::Model> for JobResponse {
    fn from(job: story_jobs::Model) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            created_at: job.created_at,
            story_id: job.story_id,
            completed_at: job.completed_at,
            error: job.error,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job ID returned by story creation")
    ),
    responses(
        (status = 200, description = "Current job status", body = JobResponse),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, CoreError> {
    let job = state.submissions.get_status(&job_id).await?;
    Ok(Json(job.into()))
}
