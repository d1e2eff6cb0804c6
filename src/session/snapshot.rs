use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ontology::OntologyConfig;

/// Persisted session state: `{sessionId, program, ontology}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    #[serde(default)]
    pub program: Vec<String>,
    #[serde(default)]
    pub ontology: OntologyConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    /// # Errors
    /// Returns the serialization error.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// # Errors
    /// Returns the parse error for malformed documents.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Rendering of a session's knowledge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    /// Program clauses, one per line.
    #[default]
    Prolog,
    /// `{facts, rules, entities, relationships, constraints}`.
    Json,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub facts: Vec<String>,
    pub rules: Vec<String>,
    pub entities: Vec<String>,
    pub relationships: Vec<String>,
    pub constraints: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let snapshot = SessionSnapshot {
            session_id: "s-1".to_string(),
            program: vec!["pet(rex).".to_string()],
            ontology: OntologyConfig::new().with_types(["pet"]),
            saved_at: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().expect("serializes")).expect("json");
        assert_eq!(json["sessionId"], "s-1");
        assert_eq!(json["program"][0], "pet(rex).");
        assert_eq!(json["ontology"]["types"][0], "pet");
        assert!(json.get("savedAt").is_none());
    }
}
