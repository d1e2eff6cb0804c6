use serde::Serialize;

use crate::{
    engine::Solution,
    errors::{Error, Failure},
    translation::TranslationResult,
};

pub const PROVEN: &str = "Directly proven from knowledge graph.";
pub const NOT_PROVEN: &str = "No direct proof found in knowledge graph.";
pub const SYMBOLIC_CONFIDENCE: f64 = 1.0;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Outcome of an assertion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub success: bool,
    /// Normalized clause text, when one was produced.
    pub clause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl AssertionResult {
    pub(crate) fn asserted(clause: impl Into<String>) -> Self {
        Self {
            success: true,
            clause: Some(clause.into()),
            translation: None,
            error: None,
        }
    }

    pub(crate) fn failed(clause: Option<String>, err: &Error) -> Self {
        Self {
            success: false,
            clause,
            translation: None,
            error: Some(err.to_failure()),
        }
    }

    pub(crate) fn with_translation(mut self, translation: TranslationResult) -> Self {
        self.translation = Some(translation);
        self
    }
}

/// Where an answer came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Proven by the knowledge engine.
    Symbolic,
    /// Produced by the generation service after symbolic resolution failed.
    SubSymbolic,
}

/// Outcome of a query.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    pub query: Option<String>,
    pub solutions: Vec<Solution>,
    /// 1.0 when proven, 0.5 for a fallback answer, 0.0 otherwise.
    pub confidence: f64,
    pub source: AnswerSource,
    pub explanation: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
}

impl QueryResult {
    pub(crate) fn proven(query: &str, solutions: Vec<Solution>) -> Self {
        let explanation = solutions
            .iter()
            .map(|solution| {
                if solution.is_empty() {
                    PROVEN.to_string()
                } else {
                    format!("Derived: {solution}")
                }
            })
            .collect();
        Self {
            success: true,
            query: Some(query.to_string()),
            solutions,
            confidence: SYMBOLIC_CONFIDENCE,
            source: AnswerSource::Symbolic,
            explanation,
            fallback_answer: None,
            translation: None,
            error: None,
        }
    }

    pub(crate) fn failed(query: Option<String>, err: &Error) -> Self {
        Self {
            success: false,
            query,
            solutions: Vec::new(),
            confidence: 0.0,
            source: AnswerSource::Symbolic,
            explanation: vec![NOT_PROVEN.to_string()],
            fallback_answer: None,
            translation: None,
            error: Some(err.to_failure()),
        }
    }

    pub(crate) fn with_fallback(mut self, answer: String) -> Self {
        self.success = true;
        self.confidence = FALLBACK_CONFIDENCE;
        self.source = AnswerSource::SubSymbolic;
        self.explanation = vec![answer.clone()];
        self.fallback_answer = Some(answer);
        self.error = None;
        self
    }

    pub(crate) fn with_translation(mut self, translation: TranslationResult) -> Self {
        self.translation = Some(translation);
        self
    }

    /// Bindings of every solution, e.g. `X = tweety; X = polly`.
    #[must_use]
    pub fn bindings_text(&self) -> String {
        self.solutions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Per query behavior switches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Ask the generation service when nothing can be proven.
    pub allow_sub_symbolic_fallback: bool,
}

impl QueryOptions {
    #[must_use]
    pub fn with_fallback(mut self) -> Self {
        self.allow_sub_symbolic_fallback = true;
        self
    }
}

/// A clause dropped during revalidation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DroppedClause {
    pub clause: String,
    pub reason: Failure,
}

/// Clauses kept and dropped when a program is checked against a new
/// ontology.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RevalidationReport {
    pub kept: Vec<String>,
    pub dropped: Vec<DroppedClause>,
}

impl RevalidationReport {
    #[must_use]
    pub fn dropped_clauses(&self) -> Vec<&str> {
        self.dropped.iter().map(|entry| entry.clause.as_str()).collect()
    }
}
