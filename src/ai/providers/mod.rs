pub mod gemini;

use crate::ai::client::GenerationBackend;
use crate::config::Settings;
use anyhow::Result;
use std::sync::Arc;

pub use gemini::GeminiBackend;

/// Configure the generation backend from environment variables.
pub fn backend_from_env() -> Result<Arc<dyn GenerationBackend>> {
    backend_from_settings(&Settings::from_env())
}

pub fn backend_from_settings(settings: &Settings) -> Result<Arc<dyn GenerationBackend>> {
    if settings.api_key.is_none() {
        return Err(anyhow::anyhow!(
            "No AI provider configured. Set GEMINI_API_KEY or API_KEY"
        ));
    }
    Ok(Arc::new(GeminiBackend::from_settings(settings)?))
}
