//! Errors raised while producing a story for a job
//!
//! None of these reach an HTTP caller: the worker records the display text as
//! the job's `error` and the client sees it when polling.

use std::time::Duration;

use thiserror::Error;

use super::{CoreError, StoryError};

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Story provider request failed: {0}")]
    Provider(String),

    #[error("Story provider returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Generated story is invalid: {0}")]
    InvalidStory(#[from] StoryError),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generation task aborted: {0}")]
    Aborted(String),

    #[error("Failed to store generated story: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        GenerationError::Provider(err.to_string())
    }
}

impl From<CoreError> for GenerationError {
    fn from(err: CoreError) -> Self {
        GenerationError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_keeps_sub_second_precision() {
        let err = GenerationError::Timeout(Duration::from_secs(90));
        assert_eq!(err.to_string(), "Generation timed out after 90s");

        let err = GenerationError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Generation timed out after 250ms");
    }

    #[test]
    fn story_errors_convert() {
        let err: GenerationError = StoryError::DeadEnd(3).into();
        assert_eq!(
            err.to_string(),
            "Generated story is invalid: Node 3 is not an ending but offers no options"
        );
    }
}
