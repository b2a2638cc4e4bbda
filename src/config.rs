use std::collections::HashMap;
use std::time::Duration;

use crate::errors::ConfigError;

const DEFAULT_DATABASE_URL: &str = "sqlite://cyoa.db?mode=rwc";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Settings for the story generation worker pool.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Number of jobs generated concurrently.
    pub concurrency: usize,
    /// Jobs waiting for a worker before `dispatch` starts refusing them.
    pub queue_capacity: usize,
    /// Upper bound on a single generation run.
    pub job_timeout: Duration,
    /// How often the recovery sweep looks for stale jobs.
    pub sweep_interval: Duration,
    /// Age after which a job still `pending` is dispatched again.
    pub redispatch_after: Duration,
}

impl WorkerConfig {
    /// A `processing` job older than this is considered orphaned.
    pub fn stale_after(&self) -> Duration {
        self.job_timeout + self.job_timeout / 2
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: 64,
            job_timeout: Duration::from_secs(120),
            sweep_interval: Duration::from_secs(30),
            redispatch_after: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// `Max-Age` attached to the session cookie; `None` makes it a browser-session cookie.
    pub max_age: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_id".to_string(),
            max_age: Some(Duration::from_secs(30 * 24 * 60 * 60)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }
}

/// Application configuration, built once at start-up and handed to the
/// server and services.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub database_url: String,
    pub api_prefix: String,
    pub allowed_origins: Vec<String>,
    pub debug: bool,
    pub generator: GeneratorConfig,
    pub worker: WorkerConfig,
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_prefix: "/api".to_string(),
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            debug: false,
            generator: GeneratorConfig::default(),
            worker: WorkerConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `.env` first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let values: HashMap<String, String> = Self::tracked_keys()
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_map(&values)
    }

    pub fn from_map(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        fn value<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
            values
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        }

        let defaults = Self::default();

        let api_prefix = value(values, "API_PREFIX")
            .map(str::to_string)
            .unwrap_or(defaults.api_prefix);
        if !api_prefix.starts_with('/') || (api_prefix.len() > 1 && api_prefix.ends_with('/')) {
            return Err(ConfigError::InvalidApiPrefix(api_prefix));
        }

        let allowed_origins = match values.get("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(raw),
            None => defaults.allowed_origins,
        };

        let debug = match value(values, "DEBUG") {
            Some(raw) => parse_bool("DEBUG", raw)?,
            None => false,
        };

        let generator = GeneratorConfig {
            openai_api_key: value(values, "OPENAI_API_KEY").map(str::to_string),
            openai_base_url: value(values, "OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.generator.openai_base_url),
            openai_model: value(values, "CYOA_OPENAI_MODEL")
                .map(str::to_string)
                .unwrap_or(defaults.generator.openai_model),
        };

        let worker_defaults = defaults.worker;
        let worker = WorkerConfig {
            concurrency: positive(values, "CYOA_WORKER_CONCURRENCY")?
                .unwrap_or(worker_defaults.concurrency as u64) as usize,
            queue_capacity: positive(values, "CYOA_QUEUE_CAPACITY")?
                .unwrap_or(worker_defaults.queue_capacity as u64) as usize,
            job_timeout: positive(values, "CYOA_JOB_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(worker_defaults.job_timeout),
            sweep_interval: positive(values, "CYOA_SWEEP_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(worker_defaults.sweep_interval),
            redispatch_after: positive(values, "CYOA_REDISPATCH_AFTER_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(worker_defaults.redispatch_after),
        };

        // 0 disables Max-Age and leaves a browser-session cookie.
        let session = SessionConfig {
            cookie_name: defaults.session.cookie_name,
            max_age: match value(values, "CYOA_SESSION_MAX_AGE_SECS") {
                Some(raw) => match parse_u64("CYOA_SESSION_MAX_AGE_SECS", raw)? {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
                None => defaults.session.max_age,
            },
        };

        Ok(Self {
            database_url: value(values, "DATABASE_URL")
                .map(str::to_string)
                .unwrap_or(defaults.database_url),
            api_prefix,
            allowed_origins,
            debug,
            generator,
            worker,
            session,
        })
    }

    fn tracked_keys() -> Vec<&'static str> {
        vec![
            "DATABASE_URL",
            "API_PREFIX",
            "ALLOWED_ORIGINS",
            "DEBUG",
            "OPENAI_API_KEY",
            "OPENAI_BASE_URL",
            "CYOA_OPENAI_MODEL",
            "CYOA_WORKER_CONCURRENCY",
            "CYOA_QUEUE_CAPACITY",
            "CYOA_JOB_TIMEOUT_SECS",
            "CYOA_SWEEP_INTERVAL_SECS",
            "CYOA_REDISPATCH_AFTER_SECS",
            "CYOA_SESSION_MAX_AGE_SECS",
        ]
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "boolean",
        }),
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected: "non-negative integer",
    })
}

fn positive(values: &HashMap<String, String>, key: &str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = values.get(key).map(|value| value.trim()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match parse_u64(key, raw)? {
        0 => Err(ConfigError::MustBePositive {
            key: key.to_string(),
        }),
        parsed => Ok(Some(parsed)),
    }
}
