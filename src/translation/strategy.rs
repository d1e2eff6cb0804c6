use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{prompt, structured, TranslationError, TranslationResult};
use crate::{ai::GenerationService, config::ConfigError, logic::ClauseKind};

/// Ways of turning natural language into Prolog text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Ask for Prolog directly and use the trimmed output verbatim.
    Direct,
    /// Ask for a JSON clause description and render it.
    Structured,
    /// Like [`Strategy::Direct`] with worked examples in the prompt.
    FewShot,
    /// Chooses query/assert/conclude actions; only used by the reasoning loop.
    Agentic,
}

impl Strategy {
    pub const ALL: [Self; 4] = [Self::Direct, Self::Structured, Self::FewShot, Self::Agentic];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Structured => "structured",
            Self::FewShot => "few-shot",
            Self::Agentic => "agentic",
        }
    }

    /// Translates `text` with one generation call.
    ///
    /// # Errors
    /// Returns [`TranslationError::Unsupported`] for [`Strategy::Agentic`],
    /// generation failures, and malformed structured output.
    pub async fn translate(
        self,
        generator: &dyn GenerationService,
        text: &str,
        ontology_terms: &[String],
        feedback: Option<&str>,
    ) -> Result<TranslationResult, TranslationError> {
        let prompt = match self {
            Self::Direct => prompt::direct(text, ontology_terms, feedback),
            Self::FewShot => prompt::few_shot(text, ontology_terms, feedback),
            Self::Structured => prompt::structured(text, ontology_terms, feedback),
            Self::Agentic => return Err(TranslationError::Unsupported(self.name())),
        };
        debug!(strategy = self.name(), prompt = %prompt, "requesting translation");

        let generation = generator.generate(&prompt).await?;
        let content = match self {
            Self::Structured => structured::to_prolog(&generation.text)?,
            _ => generation.text.trim().to_string(),
        };

        Ok(TranslationResult {
            kind: ClauseKind::of_text(&content),
            content,
            prompt_tokens: generation.prompt_tokens,
            completion_tokens: generation.completion_tokens,
            latency: generation.latency,
            strategy: self,
        })
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyRegistry::new().resolve(s)
    }
}

/// Name to strategy lookup built once at startup.
#[derive(Clone, Debug)]
pub struct StrategyRegistry {
    entries: BTreeMap<String, Strategy>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        let mut entries: BTreeMap<String, Strategy> = Strategy::ALL
            .iter()
            .map(|strategy| (strategy.name().to_string(), *strategy))
            .collect();
        entries.insert("json".to_string(), Strategy::Structured);
        entries.insert("few_shot".to_string(), Strategy::FewShot);
        entries.insert("fewshot".to_string(), Strategy::FewShot);
        Self { entries }
    }

    /// Registered names, aliases included.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Looks up a strategy by name, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownStrategy`] for unregistered names.
    pub fn resolve(&self, name: &str) -> Result<Strategy, ConfigError> {
        self.entries
            .get(&name.trim().to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ConfigError::UnknownStrategy(name.to_string()))
    }

    /// Resolves an ordered translation strategy list.
    ///
    /// # Errors
    /// Fails on unknown names and on [`Strategy::Agentic`], which cannot
    /// produce a single clause.
    pub fn resolve_pipeline(&self, names: &[String]) -> Result<Vec<Strategy>, ConfigError> {
        names
            .iter()
            .map(|name| match self.resolve(name)? {
                Strategy::Agentic => Err(ConfigError::StrategyNotAllowed(name.clone())),
                strategy => Ok(strategy),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("direct", Strategy::Direct)]
    #[case("json", Strategy::Structured)]
    #[case(" Structured ", Strategy::Structured)]
    #[case("few_shot", Strategy::FewShot)]
    #[case("few-shot", Strategy::FewShot)]
    #[case("agentic", Strategy::Agentic)]
    fn resolves_names_and_aliases(#[case] name: &str, #[case] expected: Strategy) {
        assert_eq!(StrategyRegistry::new().resolve(name).expect("known"), expected);
    }

    #[test]
    fn unknown_and_agentic_pipeline_names_are_rejected() {
        let registry = StrategyRegistry::new();
        assert!(matches!(
            registry.resolve("telepathy"),
            Err(ConfigError::UnknownStrategy(name)) if name == "telepathy"
        ));
        assert!(matches!(
            registry.resolve_pipeline(&["direct".to_string(), "agentic".to_string()]),
            Err(ConfigError::StrategyNotAllowed(_))
        ));
    }
}
