//! API integration tests
//!
//! Drive the HTTP surface end to end: story creation, job polling, story
//! assembly and the error contract.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use chrono::Utc;
use cyoa::config::AppConfig;
use cyoa::database::connection::setup_database;
use cyoa::database::entities::{stories, story_nodes};
use cyoa::errors::GenerationError;
use cyoa::server::{app::create_app, build_state};
use cyoa::services::generators::{StoryGenerator, TemplateStoryGenerator};
use cyoa::story::StoryDraft;
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

struct TestApp {
    server: TestServer,
    db: DatabaseConnection,
    _temp_file: NamedTempFile,
}

async fn setup_with(config: AppConfig, generator: Arc<dyn StoryGenerator>) -> Result<TestApp> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = Database::connect(&db_url).await?;
    setup_database(&db).await?;

    let app = create_app(build_state(db.clone(), config, generator))?;
    let server = TestServer::new(app)?;

    Ok(TestApp {
        server,
        db,
        _temp_file: temp_file,
    })
}

/// Test server backed by a temporary SQLite file and the template generator
async fn setup_test_server() -> Result<TestApp> {
    setup_with(AppConfig::default(), Arc::new(TemplateStoryGenerator)).await
}

struct BrokenGenerator;

#[async_trait]
impl StoryGenerator for BrokenGenerator {
    fn name(&self) -> &str {
        "broken"
    }

    async fn generate(&self, _theme: &str) -> Result<StoryDraft, GenerationError> {
        Err(GenerationError::Provider("upstream returned 503".to_string()))
    }
}

async fn poll_until_terminal(server: &TestServer, job_id: &str) -> Value {
    let mut job = Value::Null;
    for _ in 0..100 {
        let response = server.get(&format!("/api/jobs/{}", job_id)).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        job = response.json();
        if job["status"] == "completed" || job["status"] == "failed" {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never finished: {}", job_id, job);
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["service"], "cyoa-server");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_create_story_without_cookie_mints_session() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/api/stories/create")
        .json(&json!({ "theme": "space pirates" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);

    let cookie = response.header(header::SET_COOKIE);
    let cookie = cookie.to_str()?;
    assert!(cookie.starts_with("session_id="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age="));

    let job: Value = response.json();
    assert_eq!(job["status"], "pending");
    assert!(job["story_id"].is_null());
    assert!(job["completed_at"].is_null());
    assert!(job["error"].is_null());
    assert!(job["created_at"].is_string());
    assert!(uuid::Uuid::parse_str(job["job_id"].as_str().unwrap()).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_create_story_reuses_existing_session() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/api/stories/create")
        .add_header(header::COOKIE, HeaderValue::from_static("session_id=returning-reader"))
        .json(&json!({ "theme": "haunted lighthouse" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = response.header(header::SET_COOKIE);
    assert!(cookie.to_str()?.starts_with("session_id=returning-reader;"));

    let job: Value = response.json();
    let job = poll_until_terminal(&app.server, job["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");

    let story_id = job["story_id"].as_i64().unwrap();
    let story: Value = app
        .server
        .get(&format!("/api/stories/{}/complete", story_id))
        .await
        .json();
    assert_eq!(story["session_id"], "returning-reader");

    Ok(())
}

#[tokio::test]
async fn test_malformed_session_cookie_is_replaced() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/api/stories/create")
        .add_header(header::COOKIE, HeaderValue::from_static("session_id=not%20valid!"))
        .json(&json!({ "theme": "clockwork city" }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let cookie = response.header(header::SET_COOKIE);
    let cookie = cookie.to_str()?;
    let session_id = cookie
        .strip_prefix("session_id=")
        .and_then(|rest| rest.split(';').next())
        .unwrap();
    assert!(uuid::Uuid::parse_str(session_id).is_ok());

    Ok(())
}

#[tokio::test]
async fn test_invalid_theme_is_rejected() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app
        .server
        .post("/api/stories/create")
        .json(&json!({ "theme": "   " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(body["detail"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_story_generation_end_to_end() -> Result<()> {
    let app = setup_test_server().await?;

    let job: Value = app
        .server
        .post("/api/stories/create")
        .json(&json!({ "theme": "space pirates" }))
        .await
        .json();

    let job = poll_until_terminal(&app.server, job["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "completed");
    assert!(job["error"].is_null());
    assert!(job["completed_at"].is_string());

    let story_id = job["story_id"].as_i64().unwrap();
    let response = app
        .server
        .get(&format!("/api/stories/{}/complete", story_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let story: Value = response.json();
    assert_eq!(story["id"], story_id);
    assert_eq!(story["title"], "The Space Pirates Chronicle");

    let all_nodes = story["all_nodes"].as_object().unwrap();
    assert_eq!(all_nodes.len(), 8);

    let root_id = story["root_node"]["id"].as_i64().unwrap();
    assert!(all_nodes.contains_key(&root_id.to_string()));

    // Every continue option points at a node of the same story
    for node in all_nodes.values() {
        for option in node["options"].as_array().unwrap() {
            if option["kind"] == "continue" {
                let target = option["node_id"].as_i64().unwrap().to_string();
                assert!(all_nodes.contains_key(&target));
            }
        }
        if node["is_ending"] == true {
            assert!(node["options"].as_array().unwrap().is_empty());
        }
    }
    assert!(all_nodes.values().any(|n| n["is_winning_ending"] == true));

    Ok(())
}

#[tokio::test]
async fn test_generation_failure_is_reported_on_job() -> Result<()> {
    let app = setup_with(AppConfig::default(), Arc::new(BrokenGenerator)).await?;

    let job: Value = app
        .server
        .post("/api/stories/create")
        .json(&json!({ "theme": "doomed voyage" }))
        .await
        .json();

    let job = poll_until_terminal(&app.server, job["job_id"].as_str().unwrap()).await;
    assert_eq!(job["status"], "failed");
    assert!(job["story_id"].is_null());
    assert!(job["error"].as_str().unwrap().contains("upstream returned 503"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_job_returns_404() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/api/jobs/nonexistent").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["id"], "nonexistent");

    Ok(())
}

#[tokio::test]
async fn test_unknown_story_returns_404() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/api/stories/9999/complete").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_story_without_root_is_inconsistent() -> Result<()> {
    let app = setup_test_server().await?;

    let story = stories::ActiveModel {
        title: Set("Broken".to_string()),
        session_id: Set("s".to_string()),
        theme: Set("broken".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&app.db)
    .await?;

    story_nodes::ActiveModel {
        story_id: Set(story.id),
        content: Set("Orphaned passage".to_string()),
        is_root: Set(false),
        is_ending: Set(true),
        is_winning_ending: Set(false),
        options: Set(json!([])),
        ..Default::default()
    }
    .insert(&app.db)
    .await?;

    let response = app
        .server
        .get(&format!("/api/stories/{}/complete", story.id))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "INTERNAL_INCONSISTENCY");

    Ok(())
}

#[tokio::test]
async fn test_custom_api_prefix() -> Result<()> {
    let config = AppConfig {
        api_prefix: "/v2".to_string(),
        ..AppConfig::default()
    };
    let app = setup_with(config, Arc::new(TemplateStoryGenerator)).await?;

    let response = app
        .server
        .post("/v2/stories/create")
        .json(&json!({ "theme": "lost city" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let response = app.server.get("/api/jobs/anything").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_openapi_document() -> Result<()> {
    let app = setup_test_server().await?;

    let response = app.server.get("/api-docs/openapi.json").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let doc: Value = response.json();
    assert!(doc["paths"]["/api/stories/create"].is_object());
    assert!(doc["paths"]["/api/jobs/{job_id}"].is_object());

    Ok(())
}
