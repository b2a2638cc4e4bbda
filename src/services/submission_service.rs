use tracing::{debug, info};
use uuid::Uuid;

use crate::database::entities::story_jobs;
use crate::errors::CoreResult;
use crate::services::generation_worker::{GenerationPool, GenerationTask};
use crate::services::JobService;

const MAX_SESSION_ID_CHARS: usize = 128;

/// Accepts story requests and reports on them.
///
/// `submit` only writes the pending job and queues it; generation happens on
/// the pool, so the caller never waits for the provider.
#[derive(Clone)]
pub struct SubmissionService {
    jobs: JobService,
    pool: GenerationPool,
}

impl SubmissionService {
    pub fn new(jobs: JobService, pool: GenerationPool) -> Self {
        Self { jobs, pool }
    }

    /// Reuse a client-supplied session id when it looks sane, otherwise mint one.
    /// The flag is `true` when a new id was minted.
    pub fn resolve_session(existing: Option<&str>) -> (String, bool) {
        match existing.map(str::trim) {
            Some(id) if is_valid_session_id(id) => (id.to_string(), false),
            _ => (Uuid::new_v4().to_string(), true),
        }
    }

    pub async fn submit(&self, theme: &str, session_id: &str) -> CoreResult<story_jobs::Model> {
        let job = self.jobs.create_job(theme, session_id).await?;
        info!("[{}] Accepted story request for session {}", job.job_id, session_id);

        if !self.pool.dispatch(GenerationTask::from(&job)) {
            debug!("[{}] Waiting for the recovery sweep", job.job_id);
        }
        Ok(job)
    }

    pub async fn get_status(&self, job_id: &str) -> CoreResult<story_jobs::Model> {
        self.jobs.get_job(job_id).await
    }
}

fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.chars().count() <= MAX_SESSION_ID_CHARS
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
