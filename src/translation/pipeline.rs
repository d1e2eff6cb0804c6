use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{Strategy, StrategyRegistry, TranslationError, TranslationResult};
use crate::{
    ai::GenerationService,
    config::{ConfigError, TranslationSettings},
    engine::KnowledgeEngine,
};

/// Tries strategies in order, for a bounded number of rounds, until one
/// produces syntactically valid Prolog.
///
/// Ontology membership is not checked here; that happens when the result is
/// asserted.
#[derive(Clone, Debug)]
pub struct TranslationPipeline {
    strategies: Vec<Strategy>,
    max_attempts: u32,
    retry_delay: Duration,
    operation_timeout: Option<Duration>,
}

impl TranslationPipeline {
    /// A pipeline with no strategies or zero attempts fails every translation
    /// with [`TranslationError::Exhausted`].
    #[must_use]
    pub fn new(strategies: Vec<Strategy>, max_attempts: u32) -> Self {
        Self {
            strategies,
            max_attempts,
            retry_delay: Duration::ZERO,
            operation_timeout: None,
        }
    }

    /// Builds a pipeline from configuration.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for unknown or disallowed strategy names, an
    /// empty strategy list, or zero attempts.
    pub fn from_settings(
        settings: &TranslationSettings,
        registry: &StrategyRegistry,
    ) -> Result<Self, ConfigError> {
        let mut errors = validator::ValidationErrors::new();
        if settings.strategies.is_empty() {
            errors.add("strategies", validator::ValidationError::new("length"));
        }
        if settings.max_attempts == 0 {
            errors.add("max_attempts", validator::ValidationError::new("range"));
        }
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        let pipeline = Self::new(
            registry.resolve_pipeline(&settings.strategies)?,
            settings.max_attempts,
        )
        .with_retry_delay(Duration::from_millis(settings.retry_delay_ms));
        Ok(match settings.operation_timeout_ms {
            Some(ms) => pipeline.with_operation_timeout(Duration::from_millis(ms)),
            None => pipeline,
        })
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Translates `text`, feeding each failure back into the next prompt.
    ///
    /// # Errors
    /// Returns [`TranslationError::Exhausted`] with the last feedback once
    /// every attempt failed, or [`TranslationError::Cancelled`] when `cancel`
    /// fires or the operation timeout elapses.
    pub async fn translate(
        &self,
        generator: &dyn GenerationService,
        checker: &dyn KnowledgeEngine,
        text: &str,
        ontology_terms: &[String],
        cancel: &CancellationToken,
    ) -> Result<TranslationResult, TranslationError> {
        let run = self.run(generator, checker, text, ontology_terms, cancel);
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .unwrap_or(Err(TranslationError::Cancelled)),
            None => run.await,
        }
    }

    async fn run(
        &self,
        generator: &dyn GenerationService,
        checker: &dyn KnowledgeEngine,
        text: &str,
        ontology_terms: &[String],
        cancel: &CancellationToken,
    ) -> Result<TranslationResult, TranslationError> {
        let mut feedback: Option<String> = None;

        for attempt in 1..=self.max_attempts {
            for strategy in &self.strategies {
                let outcome = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(TranslationError::Cancelled),
                    outcome = strategy.translate(generator, text, ontology_terms, feedback.as_deref()) => outcome,
                };

                match outcome {
                    Ok(result) if checker.parse_check(&result.content) => {
                        info!(
                            strategy = strategy.name(),
                            attempt,
                            kind = %result.kind,
                            "translation succeeded"
                        );
                        return Ok(result);
                    }
                    Ok(result) => {
                        warn!(
                            strategy = strategy.name(),
                            attempt,
                            output = %result.content,
                            "translation is not valid Prolog"
                        );
                        feedback = Some(format!(
                            "previous output `{}` is not valid Prolog syntax",
                            result.content
                        ));
                    }
                    Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled),
                    Err(err) => {
                        warn!(strategy = strategy.name(), attempt, error = %err, "translation attempt failed");
                        feedback = Some(err.to_string());
                    }
                }
            }

            if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(TranslationError::Cancelled),
                    () = tokio::time::sleep(self.retry_delay) => {}
                }
            }
        }

        Err(TranslationError::Exhausted {
            attempts: self.max_attempts,
            last_feedback: feedback.unwrap_or_default(),
        })
    }
}
