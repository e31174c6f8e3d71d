//! Language-model provider implementations for Toolpilot.
//!
//! All providers implement the `toolpilot_core::Provider` trait.

pub mod openai_compat;

use std::sync::Arc;
use std::time::Duration;
use toolpilot_config::AppConfig;
use toolpilot_core::error::ProviderError;
use toolpilot_core::provider::Provider;

pub use openai_compat::OpenAiCompatProvider;

/// Build the provider described by the configuration.
///
/// A missing API key is sent as an empty bearer token; rejecting it is
/// left to the backend.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider = OpenAiCompatProvider::new(
        "openai-compatible",
        &config.base_url,
        config.api_key.clone().unwrap_or_default(),
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(provider))
}
