//! Natural language to Prolog translation.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::{ai::GenerationError, logic::ClauseKind};

pub mod agentic;
pub mod pipeline;
pub mod prompt;
pub mod strategy;
pub mod structured;

pub use agentic::AgentAction;
pub use pipeline::TranslationPipeline;
pub use strategy::{Strategy, StrategyRegistry};

/// A candidate clause or query produced by one strategy call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub kind: ClauseKind,
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    #[serde(serialize_with = "serialize_millis")]
    pub latency: Duration,
    pub strategy: Strategy,
}

fn serialize_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    #[error("malformed generation output ({reason}): {raw}")]
    MalformedOutput { reason: String, raw: String },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("strategy `{0}` cannot translate single statements")]
    Unsupported(&'static str),

    #[error("no valid translation after {attempts} attempt(s); last feedback: {last_feedback}")]
    Exhausted { attempts: u32, last_feedback: String },

    #[error("translation was cancelled")]
    Cancelled,

    #[error("no generation service is configured")]
    MissingGenerator,
}
