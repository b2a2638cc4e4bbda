use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    response::Json,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

use super::handlers::{health, jobs, stories};
use super::ApiDoc;
use crate::config::AppConfig;
use crate::services::{StoryService, SubmissionService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub submissions: SubmissionService,
    pub stories: StoryService,
}

pub fn create_app(state: AppState) -> Result<Router> {
    let cors = cors_layer(&state.config.allowed_origins)?;
    let prefix = state.config.api_prefix.clone();

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/api-docs/openapi.json", get(openapi_json));

    let router = if prefix == "/" {
        router.merge(api_routes())
    } else {
        router.nest(&prefix, api_routes())
    };

    Ok(router
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stories/create", post(stories::create_story))
        .route("/stories/:story_id/complete", get(stories::get_complete_story))
        .route("/jobs/:job_id", get(jobs::get_job_status))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Credentialed CORS for an explicit origin list; a `*` entry or an empty
/// list allows any origin without credentials.
fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_origin_lists_and_wildcard() {
        assert!(cors_layer(&["http://localhost:3000".to_string()]).is_ok());
        assert!(cors_layer(&["*".to_string()]).is_ok());
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
