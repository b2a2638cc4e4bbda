//! Database functionality tests
//!
//! Migrations, cascade rules and the job/story write paths against a real
//! SQLite file.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use cyoa::config::WorkerConfig;
use cyoa::database::entities::*;
use cyoa::database::migrations::Migrator;
use cyoa::database::setup_database;
use cyoa::services::generators::TemplateStoryGenerator;
use cyoa::services::{
    GenerationPool, GenerationWorker, JobService, StoreOutcome, StoryService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Database, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, Set,
};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use tempfile::NamedTempFile;

/// Create a test database connection with migrations
async fn setup_test_db() -> Result<(DatabaseConnection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    Ok((db, temp_file))
}

#[tokio::test]
async fn test_database_migrations() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    assert_eq!(story_jobs::Entity::find().count(&db).await?, 0);
    assert_eq!(stories::Entity::find().count(&db).await?, 0);
    assert_eq!(story_nodes::Entity::find().count(&db).await?, 0);

    // Down then up again leaves a usable schema
    Migrator::down(&db, None).await?;
    Migrator::up(&db, None).await?;
    assert_eq!(story_jobs::Entity::find().count(&db).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_job_id_is_unique() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let job = story_jobs::ActiveModel {
        job_id: Set("fixed-id".to_string()),
        session_id: Set("s".to_string()),
        theme: Set("t".to_string()),
        status: Set(JobStatus::Pending.into()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    job.clone().insert(&db).await?;
    assert!(job.insert(&db).await.is_err());

    Ok(())
}

#[tokio::test]
async fn test_deleting_story_cascades_to_nodes() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;

    let story = stories::ActiveModel {
        title: Set("Cascade".to_string()),
        session_id: Set("s".to_string()),
        theme: Set("t".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    for is_root in [true, false] {
        story_nodes::ActiveModel {
            story_id: Set(story.id),
            content: Set("passage".to_string()),
            is_root: Set(is_root),
            is_ending: Set(!is_root),
            is_winning_ending: Set(false),
            options: Set(json!([])),
            ..Default::default()
        }
        .insert(&db)
        .await?;
    }

    let nodes = story.find_related(story_nodes::Entity).all(&db).await?;
    assert_eq!(nodes.len(), 2);

    story.delete(&db).await?;
    assert_eq!(story_nodes::Entity::find().count(&db).await?, 0);

    Ok(())
}

#[tokio::test]
async fn test_completion_racing_a_sweep_leaves_no_story() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let jobs = JobService::new(db.clone());
    let stories_service = StoryService::new(db.clone());

    let job = jobs.create_job("race condition", "s").await?;
    jobs.mark_processing(&job.job_id).await?;
    // The sweep gets there first
    jobs.mark_failed(&job.job_id, "Generation did not finish in time").await?;

    let story = TemplateStoryGenerator::build("race condition").validate()?;
    let outcome = stories_service
        .store_for_job(&job.job_id, "s", "race condition", &story)
        .await?;
    assert_eq!(outcome, StoreOutcome::JobNotProcessing);

    assert_eq!(stories::Entity::find().count(&db).await?, 0);
    assert_eq!(story_nodes::Entity::find().count(&db).await?, 0);

    let job = jobs.get_job(&job.job_id).await?;
    assert_eq!(job.get_status(), Some(JobStatus::Failed));
    assert!(job.story_id.is_none());

    Ok(())
}

#[tokio::test]
async fn test_startup_sweep_recovers_leftover_jobs() -> Result<()> {
    let (db, _temp_file) = setup_test_db().await?;
    let jobs = JobService::new(db.clone());

    // Leftovers from a previous process: one job mid-generation, one never picked up
    let orphan = jobs.create_job("crashed run", "s").await?;
    jobs.mark_processing(&orphan.job_id).await?;
    let waiting = jobs.create_job("queued run", "s").await?;

    let config = WorkerConfig {
        concurrency: 2,
        queue_capacity: 8,
        job_timeout: Duration::from_millis(10),
        sweep_interval: Duration::from_secs(3600),
        redispatch_after: Duration::from_millis(10),
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let worker = GenerationWorker::new(
        jobs.clone(),
        StoryService::new(db.clone()),
        Arc::new(TemplateStoryGenerator),
        Duration::from_secs(5),
    );
    let _pool = GenerationPool::start(worker, jobs.clone(), config);

    let mut waiting_status = None;
    for _ in 0..100 {
        let job = jobs.get_job(&waiting.job_id).await?;
        if job.is_terminal() {
            waiting_status = job.get_status();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(waiting_status, Some(JobStatus::Completed));

    let orphan = jobs.get_job(&orphan.job_id).await?;
    assert_eq!(orphan.get_status(), Some(JobStatus::Failed));
    assert!(orphan.story_id.is_none());

    let completed = story_jobs::Entity::find()
        .filter(story_jobs::Column::Status.eq("completed"))
        .count(&db)
        .await?;
    assert_eq!(completed, 1);

    Ok(())
}
