pub mod app;
pub mod error;
pub mod handlers;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use clap::Subcommand;
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use tracing::info;
use utoipa::OpenApi;

use crate::config::AppConfig;
use crate::database::{connection::*, migrations::Migrator};
use crate::services::generators::{self, StoryGenerator};
use crate::services::{GenerationPool, GenerationWorker, JobService, StoryService, SubmissionService};
use app::AppState;

#[derive(Subcommand, Debug)]
pub enum MigrateDirection {
    Up,
    Down,
    Fresh,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::stories::create_story,
        handlers::stories::get_complete_story,
        handlers::jobs::get_job_status,
    ),
    components(schemas(
        handlers::health::HealthResponse,
        handlers::stories::CreateStoryRequest,
        handlers::jobs::JobResponse,
        crate::services::CompleteStory,
        crate::services::StoryNodeView,
        crate::story::StoredOption,
    )),
    tags((name = "stories", description = "Choose-your-own-adventure story generation"))
)]
pub struct ApiDoc;

/// Wire services and the generation pool around an open database.
pub fn build_state(
    db: DatabaseConnection,
    config: AppConfig,
    generator: Arc<dyn StoryGenerator>,
) -> AppState {
    let jobs = JobService::new(db.clone());
    let stories = StoryService::new(db);
    let worker = GenerationWorker::new(
        jobs.clone(),
        stories.clone(),
        generator,
        config.worker.job_timeout,
    );
    let pool = GenerationPool::start(worker, jobs.clone(), config.worker.clone());

    AppState {
        config: Arc::new(config),
        submissions: SubmissionService::new(jobs, pool),
        stories,
    }
}

pub async fn start_server(config: AppConfig, host: &str, port: u16) -> Result<()> {
    let database_url = get_database_url(Some(&config.database_url));
    let db = establish_connection(&database_url).await?;

    // Run migrations
    Migrator::up(&db, None).await?;
    info!("Database migrations completed");

    let generator = generators::from_config(&config.generator)?;
    info!("Story generator: {}", generator.name());

    let prefix = config.api_prefix.clone();
    let state = build_state(db, config, generator);
    let app = app::create_app(state)?;

    log_routes(&prefix);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    info!("Server running on http://{}:{}", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_routes(prefix: &str) {
    let prefix = prefix.trim_end_matches('/');
    info!("API Endpoints:");
    info!("  GET  /health                           - Health check");
    info!("  GET  /api-docs/openapi.json            - OpenAPI document");
    info!("  POST {}/stories/create                 - Request a new story", prefix);
    info!("  GET  {}/stories/{{id}}/complete          - Full story tree", prefix);
    info!("  GET  {}/jobs/{{job_id}}                  - Generation job status", prefix);
}

pub async fn migrate_database(database_url: &str, direction: MigrateDirection) -> Result<()> {
    let database_url = get_database_url(Some(database_url));
    let db = establish_connection(&database_url).await?;

    match direction {
        MigrateDirection::Up => {
            info!("Running migrations up");
            Migrator::up(&db, None).await?;
        }
        MigrateDirection::Down => {
            info!("Running migrations down");
            Migrator::down(&db, None).await?;
        }
        MigrateDirection::Fresh => {
            info!("Running fresh migrations (down then up)");
            Migrator::down(&db, None).await?;
            Migrator::up(&db, None).await?;
        }
    }

    info!("Database migration completed");
    Ok(())
}
