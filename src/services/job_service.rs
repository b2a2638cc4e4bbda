use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::database::entities::story_jobs::{self, JobStatus};
use crate::errors::{CoreError, CoreResult};

pub const MAX_THEME_CHARS: usize = 200;

/// Persistence and status transitions for story jobs.
///
/// Every transition is a conditional update keyed on the current status, so
/// concurrent writers (worker, recovery sweep, duplicate dispatches) cannot
/// move a job backwards or touch a finished one.
#[derive(Clone)]
pub struct JobService {
    db: DatabaseConnection,
}

impl JobService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Trim and check a requested theme
    pub fn validate_theme(theme: &str) -> CoreResult<String> {
        let theme = theme.trim();
        if theme.is_empty() {
            return Err(CoreError::validation("Theme cannot be empty"));
        }
        if theme.chars().count() > MAX_THEME_CHARS {
            return Err(CoreError::validation(format!(
                "Theme cannot be longer than {} characters",
                MAX_THEME_CHARS
            )));
        }
        Ok(theme.to_string())
    }

    /// Create a new pending job
    pub async fn create_job(&self, theme: &str, session_id: &str) -> CoreResult<story_jobs::Model> {
        let theme = Self::validate_theme(theme)?;

        let job = story_jobs::ActiveModel {
            job_id: Set(Uuid::new_v4().to_string()),
            session_id: Set(session_id.to_string()),
            theme: Set(theme),
            status: Set(JobStatus::Pending.into()),
            story_id: Set(None),
            error: Set(None),
            created_at: Set(Utc::now()),
            started_at: Set(None),
            completed_at: Set(None),
            ..Default::default()
        };

        job.insert(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to create story job").with_source(e))
    }

    pub async fn find_job(&self, job_id: &str) -> CoreResult<Option<story_jobs::Model>> {
        story_jobs::Entity::find()
            .filter(story_jobs::Column::JobId.eq(job_id))
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load story job").with_source(e))
    }

    /// Get a job, failing with `NotFound` when it does not exist
    pub async fn get_job(&self, job_id: &str) -> CoreResult<story_jobs::Model> {
        self.find_job(job_id)
            .await?
            .ok_or_else(|| CoreError::not_found("StoryJob", job_id))
    }

    /// `pending -> processing`. Returns `false` when the job was not pending.
    pub async fn mark_processing(&self, job_id: &str) -> CoreResult<bool> {
        let update = story_jobs::ActiveModel {
            status: Set(JobStatus::Processing.into()),
            started_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        transition(&self.db, job_id, JobStatus::Pending, update).await
    }

    /// `processing -> failed`, recording the error text.
    pub async fn mark_failed(&self, job_id: &str, error: &str) -> CoreResult<bool> {
        let update = story_jobs::ActiveModel {
            status: Set(JobStatus::Failed.into()),
            story_id: Set(None),
            error: Set(Some(error.to_string())),
            completed_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        transition(&self.db, job_id, JobStatus::Processing, update).await
    }

    /// Jobs currently in `status`, oldest first
    pub async fn list_by_status(&self, status: JobStatus) -> CoreResult<Vec<story_jobs::Model>> {
        story_jobs::Entity::find()
            .filter(story_jobs::Column::Status.eq(String::from(status)))
            .order_by_asc(story_jobs::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to list story jobs").with_source(e))
    }

    /// Processing jobs that started before `cutoff`
    pub async fn stale_processing_jobs(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<story_jobs::Model>> {
        let jobs = self.list_by_status(JobStatus::Processing).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.started_at.map_or(true, |started| started < cutoff))
            .collect())
    }

    /// Pending jobs created before `cutoff`
    pub async fn stale_pending_jobs(
        &self,
        cutoff: DateTime<Utc>,
    ) -> CoreResult<Vec<story_jobs::Model>> {
        let jobs = self.list_by_status(JobStatus::Pending).await?;
        Ok(jobs
            .into_iter()
            .filter(|job| job.created_at < cutoff)
            .collect())
    }
}

/// `processing -> completed` with the new story id.
///
/// Takes any connection so it can share the transaction that writes the story.
pub async fn mark_completed<C>(conn: &C, job_id: &str, story_id: i32) -> CoreResult<bool>
where
    C: ConnectionTrait,
{
    let update = story_jobs::ActiveModel {
        status: Set(JobStatus::Completed.into()),
        story_id: Set(Some(story_id)),
        error: Set(None),
        completed_at: Set(Some(Utc::now())),
        ..Default::default()
    };
    transition(conn, job_id, JobStatus::Processing, update).await
}

async fn transition<C>(
    conn: &C,
    job_id: &str,
    from: JobStatus,
    update: story_jobs::ActiveModel,
) -> CoreResult<bool>
where
    C: ConnectionTrait,
{
    let to = match &update.status {
        sea_orm::ActiveValue::Set(status) => status.clone(),
        _ => return Err(CoreError::internal("Job transition without a target status")),
    };
    let allowed = to
        .parse::<JobStatus>()
        .map(|next| from.can_transition_to(next))
        .unwrap_or(false);
    if !allowed {
        return Err(CoreError::conflict(format!(
            "Job cannot move from {} to {}",
            from, to
        )));
    }

    let result = story_jobs::Entity::update_many()
        .set(update)
        .filter(story_jobs::Column::JobId.eq(job_id))
        .filter(story_jobs::Column::Status.eq(String::from(from)))
        .exec(conn)
        .await
        .map_err(|e| CoreError::internal("Failed to update story job").with_source(e))?;

    if result.rows_affected == 0 {
        warn!("Job {} was not {}; {} transition skipped", job_id, from, to);
        return Ok(false);
    }

    debug!("Job {}: {} -> {}", job_id, from, to);
    Ok(true)
}
