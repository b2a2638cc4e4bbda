use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::errors::CoreError;
use crate::server::app::AppState;
use crate::server::handlers::jobs::JobResponse;
use crate::server::session::{session_cookie, session_from_jar};
use crate::services::{CompleteStory, SubmissionService};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateStoryRequest {
    /// What the story should be about, e.g. "space pirates"
    pub theme: String,
}

#[utoipa::path(
    post,
    path = "/api/stories/create",
    request_body = CreateStoryRequest,
    responses(
        (status = 200, description = "Generation job accepted; poll the job for progress", body = JobResponse),
        (status = 400, description = "Theme is blank or too long")
    )
)]
pub async fn create_story(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, CoreError> {
    let existing = session_from_jar(&jar, &state.config.session);
    let (session_id, minted) = SubmissionService::resolve_session(existing);
    if minted {
        debug!("Minted session {}", session_id);
    }

    let job = state.submissions.submit(&payload.theme, &session_id).await?;
    let jar = jar.add(session_cookie(&state.config.session, session_id));

    Ok((jar, Json(JobResponse::from(job))))
}

#[utoipa::path(
    get,
    path = "/api/stories/{story_id}/complete",
    params(
        ("story_id" = i32, Path, description = "Story ID from a completed job")
    ),
    responses(
        (status = 200, description = "Full story tree", body = CompleteStory),
        (status = 404, description = "Story not found"),
        (status = 500, description = "Stored story is inconsistent")
    )
)]
pub async fn get_complete_story(
    State(state): State<AppState>,
    Path(story_id): Path<i32>,
) -> Result<Json<CompleteStory>, CoreError> {
    let story = state.stories.assemble(story_id).await?;
    Ok(Json(story))
}
