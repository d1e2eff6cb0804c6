//! Text generation service contract and adapters.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AiSettings, GeneratorBackend};

pub mod infrastructure;

/// Text produced by a [`GenerationService`] together with its cost.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub latency: Duration,
}

impl Generation {
    /// A generation with no usage information, mostly for scripted services.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Contract implemented by text generation providers.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Completes `prompt`.
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError>;
}

/// Errors surfaced by generation adapters.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// Building the provider request failed.
    #[error("failed to compose provider request: {0}")]
    Request(String),
    /// Provider returned no usable text.
    #[error("provider returned an empty response")]
    EmptyResponse,
    /// Provider interaction failed.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Error raised when building a generation adapter from configuration.
#[derive(Debug, Error)]
pub enum GeneratorInitError {
    /// Provided configuration was invalid.
    #[error("invalid generator configuration: {0}")]
    InvalidConfiguration(String),
    /// Adapter construction failed.
    #[error("failed to construct generator adapter: {0}")]
    Adapter(String),
}

/// Builds the configured generation service, if any.
///
/// # Errors
/// Returns [`GeneratorInitError`] when the backend settings are unusable.
pub fn build_generator(
    settings: &AiSettings,
) -> Result<Option<Arc<dyn GenerationService>>, GeneratorInitError> {
    match &settings.generator {
        None => Ok(None),
        Some(GeneratorBackend::OpenAi(openai)) => {
            let generator = infrastructure::openai::OpenAiGenerator::try_new(openai)?;
            Ok(Some(Arc::new(generator)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiSettings;

    #[test]
    fn no_backend_builds_nothing() {
        let generator = build_generator(&AiSettings::default()).expect("builds");
        assert!(generator.is_none());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let settings = AiSettings {
            generator: Some(GeneratorBackend::OpenAi(OpenAiSettings {
                api_key: "  ".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_base: None,
                temperature: None,
                max_tokens: None,
                system_prompt: None,
            })),
        };
        assert!(matches!(
            build_generator(&settings),
            Err(GeneratorInitError::InvalidConfiguration(_))
        ));
    }
}
