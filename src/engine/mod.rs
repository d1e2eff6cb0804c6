//! Knowledge engine contract.
//!
//! A session rebuilds its engine theory from the whole program after every
//! mutation, so engines only need to support replacing the theory wholesale
//! and answering queries against it.

use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::ParseError;

pub mod memory;

pub use memory::{InMemoryEngine, InMemoryEngineFactory};

/// Errors surfaced by knowledge engine implementations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("query is malformed: {0}")]
    MalformedQuery(#[source] ParseError),

    #[error("clause `{clause}` is malformed: {source}")]
    MalformedClause {
        clause: String,
        #[source]
        source: ParseError,
    },

    #[error("resolution task failed: {0}")]
    Task(String),

    #[error("engine error: {0}")]
    Backend(String),
}

/// A single variable binding of a solution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub variable: String,
    pub value: String,
}

/// Bindings of one solution, in the order variables appear in the query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Solution {
    bindings: Vec<Binding>,
}

impl Solution {
    #[must_use]
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    #[must_use]
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|binding| binding.variable == variable)
            .map(|binding| binding.value.as_str())
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl FromIterator<(String, String)> for Solution {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            bindings: iter
                .into_iter()
                .map(|(variable, value)| Binding { variable, value })
                .collect(),
        }
    }
}

impl Display for Solution {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.bindings.is_empty() {
            return f.write_str("true");
        }
        for (index, binding) in self.bindings.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", binding.variable, binding.value)?;
        }
        Ok(())
    }
}

/// Every solution found for a query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Solutions {
    pub solutions: Vec<Solution>,
    /// Set when the search hit a depth or solution bound, so more answers may
    /// exist.
    pub truncated: bool,
}

/// Contract for clause storage and resolution.
#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    /// Replaces the whole theory with `clauses`, in order.
    ///
    /// The previous theory is kept when any clause fails to load.
    async fn assert_all(&mut self, clauses: &[String]) -> Result<(), EngineError>;

    /// Solves `query` against the current theory, collecting every solution.
    async fn solve(&self, query: &str) -> Result<Solutions, EngineError>;

    /// Returns `true` when `text` is a well formed clause or query.
    fn parse_check(&self, text: &str) -> bool;

    /// Textual rendering of the loaded theory.
    fn render_theory(&self) -> String;

    /// Drops every clause.
    async fn clear(&mut self) -> Result<(), EngineError>;
}

/// Creates fresh engine instances for new sessions.
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Box<dyn KnowledgeEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Box<dyn KnowledgeEngine> + Send + Sync,
{
    fn create(&self) -> Box<dyn KnowledgeEngine> {
        self()
    }
}
