use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

use crate::{
    ai::{Generation, GenerationError, GenerationService, GeneratorInitError},
    config::OpenAiSettings,
};

/// Generation service backed by OpenAI chat completions.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
}

impl OpenAiGenerator {
    /// Instantiates a new generator using the provided configuration.
    pub fn try_new(settings: &OpenAiSettings) -> Result<Self, GeneratorInitError> {
        if settings.api_key.trim().is_empty() {
            return Err(GeneratorInitError::InvalidConfiguration(
                "`ai.generator.api_key` must be provided".to_string(),
            ));
        }
        if settings.model.trim().is_empty() {
            return Err(GeneratorInitError::InvalidConfiguration(
                "`ai.generator.model` must be provided".to_string(),
            ));
        }

        let mut config = OpenAIConfig::new().with_api_key(settings.api_key.clone());
        if let Some(base) = &settings.api_base {
            config = config.with_api_base(base.clone());
        }

        Ok(Self {
            client: Client::with_config(config),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            system_prompt: settings.system_prompt.clone(),
        })
    }

    fn build_messages(
        &self,
        prompt: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>, GenerationError> {
        let mut messages = Vec::new();
        if let Some(system_prompt) = &self.system_prompt {
            let system = ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt.clone())
                .build()
                .map_err(|err| GenerationError::Request(err.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system));
        }

        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|err| GenerationError::Request(err.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user));
        Ok(messages)
    }
}

#[async_trait]
impl GenerationService for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(self.build_messages(prompt)?);
        if let Some(max_tokens) = self.max_tokens {
            builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        let payload = builder
            .build()
            .map_err(|err| GenerationError::Request(err.to_string()))?;

        let started = Instant::now();
        let response = self
            .client
            .chat()
            .create(payload)
            .await
            .map_err(|err| GenerationError::Provider(err.to_string()))?;
        let latency = started.elapsed();

        let (prompt_tokens, completion_tokens) = response
            .usage
            .as_ref()
            .map_or((0, 0), |usage| {
                (
                    u64::from(usage.prompt_tokens),
                    u64::from(usage.completion_tokens),
                )
            });

        let text = response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(
            model = %self.model,
            prompt_tokens,
            completion_tokens,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "generation completed"
        );

        Ok(Generation {
            text,
            prompt_tokens,
            completion_tokens,
            latency,
        })
    }
}
