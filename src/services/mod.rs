pub mod generation_worker;
pub mod generators;
pub mod job_service;
pub mod story_service;
pub mod submission_service;

pub use generation_worker::{GenerationPool, GenerationTask, GenerationWorker};
pub use job_service::JobService;
pub use story_service::{CompleteStory, StoreOutcome, StoryNodeView, StoryService};
pub use submission_service::SubmissionService;
