use thiserror::Error;

/// Invalid values found while loading configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got '{value}'")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("{key} must be greater than zero")]
    MustBePositive { key: String },

    #[error("API prefix '{0}' must start with '/' and must not end with '/'")]
    InvalidApiPrefix(String),
}
