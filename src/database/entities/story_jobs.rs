use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "story_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub job_id: String,
    pub session_id: String,
    pub theme: String,
    pub status: String,
    /// Loose reference to `stories.id`; set only once the job completed.
    pub story_id: Option<i32>,
    pub error: Option<String>,
    pub created_at: ChronoDateTimeUtc,
    pub started_at: Option<ChronoDateTimeUtc>,
    pub completed_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle of a story job: `pending -> processing -> {completed, failed}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a job may move from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_ref().to_string()
    }
}

impl Model {
    /// `None` when the stored status is not one this build knows about.
    pub fn get_status(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }

    pub fn is_terminal(&self) -> bool {
        self.get_status().is_some_and(|status| status.is_terminal())
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        if let (Some(started), Some(completed)) = (&self.started_at, &self.completed_at) {
            Some((completed.timestamp() - started.timestamp()).abs())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(String::from(JobStatus::Processing), "processing");
        assert_eq!("failed".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("Failed".parse::<JobStatus>().is_err());
    }

    #[test]
    fn transitions_are_monotonic() {
        use JobStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Completed));
    }
}
