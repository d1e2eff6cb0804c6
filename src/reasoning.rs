//! Bounded multi-step reasoning driven by the agentic strategy.
//!
//! Each step asks the generation service for one action. Queries and
//! assertions run against the session and their outcome becomes the feedback
//! for the next step; a conclusion ends the loop. Running out of steps ends it
//! as inconclusive.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    errors::Result,
    session::{QueryOptions, Session},
    translation::{
        agentic::{self, AgentAction},
        prompt::AgenticContext,
        TranslationError,
    },
};

/// One executed reasoning step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReasoningStep {
    /// 1-based position in the loop.
    pub index: u32,
    /// The action chosen, or `None` when the service produced no usable one.
    pub action: Option<AgentAction>,
    pub success: bool,
    /// What happened, as reported back to the service.
    pub outcome: String,
}

impl ReasoningStep {
    /// One line summary used in later prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.action {
            Some(AgentAction::Query { content } | AgentAction::Assert { content }) => format!(
                "Step {}: {} `{}` -> {}",
                self.index,
                self.action.as_ref().map_or("", AgentAction::name),
                content,
                self.outcome
            ),
            Some(AgentAction::Conclude { answer, .. }) => {
                format!("Step {}: conclude -> {answer}", self.index)
            }
            None => format!("Step {}: no action -> {}", self.index, self.outcome),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReasoningOutcome {
    Concluded {
        answer: String,
        explanation: Option<String>,
    },
    Inconclusive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReasoningResult {
    pub outcome: ReasoningOutcome,
    pub steps: Vec<ReasoningStep>,
}

impl ReasoningResult {
    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        match &self.outcome {
            ReasoningOutcome::Concluded { answer, .. } => Some(answer),
            ReasoningOutcome::Inconclusive => None,
        }
    }

    #[must_use]
    pub fn is_concluded(&self) -> bool {
        matches!(self.outcome, ReasoningOutcome::Concluded { .. })
    }
}

/// Per call reasoning settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReasonOptions {
    /// Overrides the session's step bound.
    pub max_steps: Option<u32>,
}

impl ReasonOptions {
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

#[derive(Default)]
struct LoopState {
    step_index: u32,
    feedback: Option<String>,
    bindings: Vec<String>,
    steps: Vec<ReasoningStep>,
}

impl LoopState {
    fn record(&mut self, action: Option<AgentAction>, success: bool, outcome: String) {
        self.feedback = Some(outcome.clone());
        self.steps.push(ReasoningStep {
            index: self.step_index,
            action,
            success,
            outcome,
        });
    }
}

pub struct ReasoningLoop<'a> {
    session: &'a Session,
    max_steps: u32,
}

impl<'a> ReasoningLoop<'a> {
    #[must_use]
    pub fn new(session: &'a Session, max_steps: u32) -> Self {
        Self { session, max_steps }
    }

    /// Runs the loop for `task`.
    ///
    /// # Errors
    /// Returns [`TranslationError::MissingGenerator`] when the session has no
    /// generation service and [`TranslationError::Cancelled`] when the
    /// session's pending operations are cancelled. Failed steps do not end the
    /// loop.
    pub async fn run(&self, task: &str) -> Result<ReasoningResult> {
        let generator = self
            .session
            .generator()
            .ok_or(TranslationError::MissingGenerator)?;
        let cancel = self.session.cancellation();
        let mut state = LoopState::default();

        while state.step_index < self.max_steps {
            state.step_index += 1;
            let program = self.session.program().await;
            let terms = self.session.ontology_terms().await;
            let previous: Vec<String> = state.steps.iter().map(ReasoningStep::describe).collect();
            let bindings = state.bindings.join("; ");
            let context = AgenticContext {
                task,
                ontology_terms: &terms,
                program: &program,
                previous_steps: &previous,
                bindings: &bindings,
                feedback: state.feedback.as_deref(),
            };

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(TranslationError::Cancelled),
                next = agentic::next_action(generator, &context) => next,
            };

            let action = match next {
                Ok((action, _)) => action,
                Err(TranslationError::Cancelled) => return Err(TranslationError::Cancelled.into()),
                Err(err) => {
                    warn!(session = self.session.id(), step = state.step_index, error = %err, "reasoning step failed");
                    state.record(None, false, err.to_string());
                    continue;
                }
            };

            match action {
                AgentAction::Conclude {
                    answer,
                    explanation,
                } => {
                    info!(session = self.session.id(), steps = state.step_index, "reasoning concluded");
                    state.record(
                        Some(AgentAction::Conclude {
                            answer: answer.clone(),
                            explanation: explanation.clone(),
                        }),
                        true,
                        "concluded".to_string(),
                    );
                    return Ok(ReasoningResult {
                        outcome: ReasoningOutcome::Concluded {
                            answer,
                            explanation,
                        },
                        steps: state.steps,
                    });
                }
                AgentAction::Query { content } => {
                    let result = self.session.query(&content, QueryOptions::default()).await;
                    let outcome = if result.success {
                        let bindings = result.bindings_text();
                        if !result.solutions.iter().all(|solution| solution.is_empty()) {
                            state.bindings.push(bindings.clone());
                        }
                        format!("query succeeded: {bindings}")
                    } else {
                        let reason = result
                            .error
                            .as_ref()
                            .map_or_else(|| "no solution found".to_string(), |err| err.message.clone());
                        format!("query failed: {reason}")
                    };
                    state.record(Some(AgentAction::Query { content }), result.success, outcome);
                }
                AgentAction::Assert { content } => {
                    let result = self.session.assert_prolog(&content).await;
                    let outcome = match &result.error {
                        None => "assertion successful".to_string(),
                        Some(err) => format!("assertion failed: {}", err.message),
                    };
                    state.record(Some(AgentAction::Assert { content }), result.success, outcome);
                }
            }
        }

        info!(session = self.session.id(), steps = self.max_steps, "reasoning inconclusive");
        Ok(ReasoningResult {
            outcome: ReasoningOutcome::Inconclusive,
            steps: state.steps,
        })
    }
}
