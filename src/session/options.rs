use std::time::Duration;

use crate::{config::TranslationSettings, ontology::OntologyConfig};

/// Per-session overrides of the manager configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Ontology the session starts with and returns to on `clear`.
    pub ontology: Option<OntologyConfig>,
    /// Clauses loaded at creation; invalid ones are skipped.
    pub program: Vec<String>,
    pub strategies: Option<Vec<String>>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub operation_timeout: Option<Duration>,
    pub max_reasoning_steps: Option<u32>,
}

impl SessionOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ontology(mut self, ontology: OntologyConfig) -> Self {
        self.ontology = Some(ontology);
        self
    }

    #[must_use]
    pub fn with_program<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.program = clauses.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_strategies<I, S>(mut self, strategies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.strategies = Some(strategies.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_reasoning_steps(mut self, max_steps: u32) -> Self {
        self.max_reasoning_steps = Some(max_steps);
        self
    }

    /// Manager translation settings with this session's overrides applied.
    #[must_use]
    pub fn translation_settings(&self, defaults: &TranslationSettings) -> TranslationSettings {
        TranslationSettings {
            strategies: self
                .strategies
                .clone()
                .unwrap_or_else(|| defaults.strategies.clone()),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            retry_delay_ms: self.retry_delay.map_or(defaults.retry_delay_ms, |delay| {
                u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
            }),
            operation_timeout_ms: self
                .operation_timeout
                .map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
                .or(defaults.operation_timeout_ms),
        }
    }
}
