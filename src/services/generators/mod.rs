//! Story generators
//!
//! A [`StoryGenerator`] turns a theme into a [`StoryDraft`]. The worker
//! validates whatever comes back, so generators do not have to.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::errors::GenerationError;
use crate::story::StoryDraft;

pub mod openai;
pub mod template;

pub use openai::OpenAiStoryGenerator;
pub use template::TemplateStoryGenerator;

#[async_trait]
pub trait StoryGenerator: Send + Sync {
    /// Short provider name used in logs
    fn name(&self) -> &str;

    async fn generate(&self, theme: &str) -> Result<StoryDraft, GenerationError>;
}

/// Pick the generator for this configuration: the OpenAI-compatible client
/// when a key is present, the offline template generator otherwise.
pub fn from_config(config: &GeneratorConfig) -> Result<Arc<dyn StoryGenerator>, GenerationError> {
    match &config.openai_api_key {
        Some(api_key) => {
            info!(
                "Using OpenAI-compatible story generator (model {})",
                config.openai_model
            );
            Ok(Arc::new(OpenAiStoryGenerator::new(
                api_key.clone(),
                config.openai_base_url.clone(),
                config.openai_model.clone(),
            )?))
        }
        None => {
            warn!("OPENAI_API_KEY is not configured; stories will come from the offline template generator");
            Ok(Arc::new(TemplateStoryGenerator))
        }
    }
}
