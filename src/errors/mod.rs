//! Error types for the story service
//!
//! - **CoreError**: service-level failures surfaced to HTTP callers
//! - **StoryError**: story tree invariant violations
//! - **GenerationError**: failures while producing a story; only ever
//!   recorded on the job
//! - **ConfigError**: invalid start-up configuration

pub mod config;
pub mod core_error;
pub mod generation;
pub mod story;

pub use config::ConfigError;
pub use core_error::{CoreError, CoreErrorKind};
pub use generation::GenerationError;
pub use story::StoryError;

/// Result type alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type alias for story validation
pub type StoryResult<T> = Result<T, StoryError>;
