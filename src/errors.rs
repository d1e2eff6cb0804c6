//! Crate-wide error type and the flat failure taxonomy reported in results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ai::GenerationError,
    config::ConfigError,
    engine::EngineError,
    logic::ParseError,
    ontology::OntologyError,
    translation::TranslationError,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Ontology(#[from] OntologyError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("`{0}` is not an assertion: facts and rules end with a period")]
    NotAnAssertion(String),

    #[error("`{0}` is not a query")]
    NotAQuery(String),

    #[error("no solution found for `{0}`")]
    NoSolution(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Flat classification of failures as reported in session results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPredicateName,
    ArityMismatch,
    UndefinedPredicate,
    UndefinedConstraint,
    MalformedClauseSyntax,
    MalformedOutput,
    TranslationExhausted,
    NotAnAssertion,
    NotAQuery,
    NoSolutionFound,
    Cancelled,
    ProviderError,
    EngineFailure,
    InvalidInput,
    Configuration,
    Serialization,
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Ontology(err) => match err {
                OntologyError::InvalidPredicateName { .. } => ErrorKind::InvalidPredicateName,
                OntologyError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
                OntologyError::UndefinedPredicate { .. } => ErrorKind::UndefinedPredicate,
                OntologyError::UndefinedConstraint { .. } => ErrorKind::UndefinedConstraint,
                OntologyError::UnsupportedGoal { .. } | OntologyError::Syntax(_) => {
                    ErrorKind::MalformedClauseSyntax
                }
            },
            Self::Parse(_) => ErrorKind::MalformedClauseSyntax,
            Self::Engine(err) => match err {
                EngineError::MalformedQuery(_) | EngineError::MalformedClause { .. } => {
                    ErrorKind::MalformedClauseSyntax
                }
                EngineError::Task(_) | EngineError::Backend(_) => ErrorKind::EngineFailure,
            },
            Self::Generation(_) => ErrorKind::ProviderError,
            Self::Translation(err) => match err {
                TranslationError::MalformedOutput { .. } => ErrorKind::MalformedOutput,
                TranslationError::Generation(_) => ErrorKind::ProviderError,
                TranslationError::Exhausted { .. } => ErrorKind::TranslationExhausted,
                TranslationError::Cancelled => ErrorKind::Cancelled,
                TranslationError::Unsupported(_) | TranslationError::MissingGenerator => {
                    ErrorKind::Configuration
                }
            },
            Self::Config(_) => ErrorKind::Configuration,
            Self::Json(_) => ErrorKind::Serialization,
            Self::NotAnAssertion(_) => ErrorKind::NotAnAssertion,
            Self::NotAQuery(_) => ErrorKind::NotAQuery,
            Self::NoSolution(_) => ErrorKind::NoSolutionFound,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Suggested replacement terms for undefined predicates.
    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Ontology(err) => err.suggestions().to_vec(),
            _ => Vec::new(),
        }
    }

    #[must_use]
    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            message: self.to_string(),
            suggestions: self.suggestions(),
        }
    }
}

/// Structured description of a failed operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        err.to_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_predicate_failure_carries_suggestions() {
        let err = Error::from(OntologyError::UndefinedPredicate {
            predicate: "bir".to_string(),
            suggestions: vec!["bird".to_string()],
        });
        let failure = err.to_failure();
        assert_eq!(failure.kind, ErrorKind::UndefinedPredicate);
        assert_eq!(failure.suggestions, ["bird".to_string()]);
        assert!(failure.message.contains("Did you mean: bird?"));
    }

    #[test]
    fn translation_errors_map_to_kinds() {
        assert_eq!(
            Error::from(TranslationError::Cancelled).kind(),
            ErrorKind::Cancelled
        );
        assert_eq!(
            Error::from(TranslationError::Exhausted {
                attempts: 2,
                last_feedback: String::new()
            })
            .kind(),
            ErrorKind::TranslationExhausted
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::NoSolutionFound).expect("serializes"),
            "\"no_solution_found\""
        );
    }
}
