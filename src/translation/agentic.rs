//! Actions chosen by the agentic strategy during a reasoning loop.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    prompt::{self, AgenticContext},
    structured::extract_json,
    TranslationError,
};
use crate::ai::{Generation, GenerationService};

/// The next step of a reasoning loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentAction {
    /// Run a Prolog query.
    Query { content: String },
    /// Add a clause to the program.
    Assert { content: String },
    /// Finish with an answer.
    Conclude {
        answer: String,
        #[serde(default)]
        explanation: Option<String>,
    },
}

impl AgentAction {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Query { .. } => "query",
            Self::Assert { .. } => "assert",
            Self::Conclude { .. } => "conclude",
        }
    }
}

/// Parses a raw agentic response.
///
/// # Errors
/// Returns [`TranslationError::MalformedOutput`] when the text is not a JSON
/// object with a known action type and its required fields.
pub fn parse_action(raw: &str) -> Result<AgentAction, TranslationError> {
    let json = extract_json(raw).ok_or_else(|| TranslationError::MalformedOutput {
        reason: "no JSON object found".to_string(),
        raw: raw.to_string(),
    })?;
    let action: AgentAction =
        serde_json::from_str(json).map_err(|err| TranslationError::MalformedOutput {
            reason: err.to_string(),
            raw: raw.to_string(),
        })?;
    match &action {
        AgentAction::Query { content } | AgentAction::Assert { content }
            if content.trim().is_empty() =>
        {
            Err(TranslationError::MalformedOutput {
                reason: format!("`{}` action without content", action.name()),
                raw: raw.to_string(),
            })
        }
        _ => Ok(action),
    }
}

/// Asks the generation service for the next reasoning action.
///
/// # Errors
/// Propagates generation failures and malformed responses.
pub async fn next_action(
    generator: &dyn GenerationService,
    context: &AgenticContext<'_>,
) -> Result<(AgentAction, Generation), TranslationError> {
    let prompt = prompt::agentic(context);
    debug!(task = context.task, "requesting next reasoning action");
    let generation = generator.generate(&prompt).await?;
    let action = parse_action(&generation.text)?;
    Ok((action, generation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        r#"{"type": "query", "content": "can_fly(X)."}"#,
        AgentAction::Query { content: "can_fly(X).".to_string() }
    )]
    #[case(
        r#"{"type": "assert", "content": "bird(tweety)."}"#,
        AgentAction::Assert { content: "bird(tweety).".to_string() }
    )]
    #[case(
        r#"Sure: {"type": "conclude", "answer": "Yes."}"#,
        AgentAction::Conclude { answer: "Yes.".to_string(), explanation: None }
    )]
    fn parses_actions(#[case] raw: &str, #[case] expected: AgentAction) {
        assert_eq!(parse_action(raw).expect("valid action"), expected);
    }

    #[rstest]
    #[case(r#"{"type": "guess", "content": "x"}"#)]
    #[case(r#"{"type": "query"}"#)]
    #[case(r#"{"type": "assert", "content": "  "}"#)]
    #[case("conclude: yes")]
    fn rejects_invalid_actions(#[case] raw: &str) {
        assert!(matches!(
            parse_action(raw),
            Err(TranslationError::MalformedOutput { .. })
        ));
    }
}
