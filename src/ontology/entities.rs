use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ontology definition supplied by callers and persisted with session state.
///
/// Serialized as `{types, relationships, constraints, synonyms}` where
/// `synonyms` maps an alternative term onto its canonical term.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    pub types: Vec<String>,
    pub relationships: Vec<String>,
    pub constraints: Vec<String>,
    pub synonyms: BTreeMap<String, String>,
}

impl OntologyConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds type names (unary predicates).
    #[must_use]
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types.extend(types.into_iter().map(Into::into));
        self
    }

    /// Adds relationship names (predicates of arity two or more).
    #[must_use]
    pub fn with_relationships<I, S>(mut self, relationships: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships
            .extend(relationships.into_iter().map(Into::into));
        self
    }

    /// Adds constraint names.
    #[must_use]
    pub fn with_constraints<I, S>(mut self, constraints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.constraints
            .extend(constraints.into_iter().map(Into::into));
        self
    }

    /// Maps `term` onto `canonical`.
    #[must_use]
    pub fn with_synonym(mut self, term: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.synonyms.insert(term.into(), canonical.into());
        self
    }

    /// Parses the JSON configuration format.
    ///
    /// # Errors
    /// Returns the underlying [`serde_json::Error`] for malformed documents.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::OntologyConfig;

    #[test]
    fn missing_sections_default_to_empty() {
        let config = OntologyConfig::from_json(r#"{"types":["pet"]}"#).expect("valid json");
        assert_eq!(config, OntologyConfig::new().with_types(["pet"]));
    }

    #[test]
    fn synonyms_round_trip_through_json() {
        let config = OntologyConfig::new()
            .with_types(["person"])
            .with_synonym("human", "person");
        let json = serde_json::to_string(&config).expect("serialize");
        assert_eq!(OntologyConfig::from_json(&json).expect("parse"), config);
    }
}
