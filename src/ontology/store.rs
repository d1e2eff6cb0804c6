use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use thiserror::Error;
use tracing::debug;

use super::{
    entities::OntologyConfig,
    value_objects::{is_valid_predicate_name, PredicateNameError},
};
use crate::logic::{parse_clause, Clause, Goal, ParseError, Term};

/// Number of leading characters compared when looking for similar terms.
const SUGGESTION_PREFIX_LEN: usize = 3;

/// Arity a predicate is required to have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArityRule {
    Exactly(usize),
    AtLeast(usize),
}

impl Display for ArityRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exactly(n) => write!(f, "exactly {n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Renders the suggestion list the way it is reported to callers.
#[must_use]
pub fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        "No similar terms found".to_string()
    } else {
        format!("Did you mean: {}?", suggestions.join(", "))
    }
}

/// Errors raised while validating clauses against the ontology.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum OntologyError {
    #[error("invalid predicate name `{name}`: predicates start with a lowercase letter followed by letters, digits or underscores")]
    InvalidPredicateName { name: String },

    #[error("`{predicate}` expects {expected} argument(s) but received {actual}")]
    ArityMismatch {
        predicate: String,
        expected: ArityRule,
        actual: usize,
    },

    #[error("predicate `{predicate}` is not defined in the ontology. {}", format_suggestions(.suggestions))]
    UndefinedPredicate {
        predicate: String,
        suggestions: Vec<String>,
    },

    #[error("constraint `{name}` is not defined in the ontology")]
    UndefinedConstraint { name: String },

    #[error("unsupported goal `{goal}` in rule body")]
    UnsupportedGoal { goal: String },

    #[error("malformed clause: {0}")]
    Syntax(#[from] ParseError),
}

impl From<PredicateNameError> for OntologyError {
    fn from(err: PredicateNameError) -> Self {
        match err {
            PredicateNameError::Invalid { value } => Self::InvalidPredicateName { name: value },
        }
    }
}

impl OntologyError {
    /// Suggested replacement terms, when the error carries any.
    #[must_use]
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::UndefinedPredicate { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

/// Ontology owned by a single session: the vocabulary clauses are checked
/// against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OntologyStore {
    types: BTreeSet<String>,
    relationships: BTreeSet<String>,
    constraints: BTreeSet<String>,
    synonyms: BTreeMap<String, String>,
}

impl OntologyStore {
    #[must_use]
    pub fn new(config: &OntologyConfig) -> Self {
        Self {
            types: config.types.iter().cloned().collect(),
            relationships: config.relationships.iter().cloned().collect(),
            constraints: config.constraints.iter().cloned().collect(),
            synonyms: config.synonyms.clone(),
        }
    }

    /// Owned snapshot suitable for persistence.
    #[must_use]
    pub fn config(&self) -> OntologyConfig {
        OntologyConfig {
            types: self.types.iter().cloned().collect(),
            relationships: self.relationships.iter().cloned().collect(),
            constraints: self.constraints.iter().cloned().collect(),
            synonyms: self.synonyms.clone(),
        }
    }

    #[must_use]
    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    #[must_use]
    pub fn relationships(&self) -> &BTreeSet<String> {
        &self.relationships
    }

    #[must_use]
    pub fn constraints(&self) -> &BTreeSet<String> {
        &self.constraints
    }

    #[must_use]
    pub fn synonyms(&self) -> &BTreeMap<String, String> {
        &self.synonyms
    }

    /// Maps a term onto its canonical form; unmapped terms are returned as is.
    #[must_use]
    pub fn resolve_synonym<'a>(&'a self, term: &'a str) -> &'a str {
        self.synonyms.get(term).map_or(term, String::as_str)
    }

    #[must_use]
    pub fn is_valid_predicate_name(&self, name: &str) -> bool {
        is_valid_predicate_name(name)
    }

    /// Returns `true` when the synonym-resolved name is a type or a
    /// relationship.
    #[must_use]
    pub fn is_defined(&self, predicate: &str) -> bool {
        let resolved = self.resolve_synonym(predicate);
        self.types.contains(resolved) || self.relationships.contains(resolved)
    }

    /// Validates a fact `predicate(args...)`.
    ///
    /// # Errors
    /// Returns the first violated rule: naming, then type arity, then
    /// relationship arity, then definedness.
    pub fn validate_fact(&self, predicate: &str, args: &[String]) -> Result<(), OntologyError> {
        self.check_predicate(predicate, args.len(), true)
    }

    /// Candidate terms close to `predicate`, in types, relationships, synonyms
    /// order.
    #[must_use]
    pub fn similar_terms(&self, predicate: &str) -> Vec<String> {
        let prefix: String = predicate.chars().take(SUGGESTION_PREFIX_LEN).collect();
        let mut seen: BTreeSet<&String> = BTreeSet::new();
        self.types
            .iter()
            .chain(self.relationships.iter())
            .chain(self.synonyms.keys())
            .filter(|term| term.starts_with(&prefix) || term.contains(predicate))
            .filter(|term| seen.insert(*term))
            .cloned()
            .collect()
    }

    /// Human readable "did you mean" hint for an unknown predicate.
    #[must_use]
    pub fn suggest(&self, predicate: &str) -> String {
        format_suggestions(&self.similar_terms(predicate))
    }

    /// Parses clause text and validates it against the ontology.
    ///
    /// # Errors
    /// Returns [`OntologyError::Syntax`] for malformed text or the first
    /// ontology violation found in the head or body.
    pub fn validate_clause(&self, text: &str) -> Result<Clause, OntologyError> {
        let clause = parse_clause(text)?;
        self.validate_parsed(&clause)?;
        Ok(clause)
    }

    /// Validates an already parsed clause.
    ///
    /// Facts get the full arity rules. Rule heads must respect type arity and
    /// be defined, but may use a relationship name with fewer arguments to
    /// derive a unary property.
    ///
    /// # Errors
    /// See [`OntologyStore::validate_clause`].
    pub fn validate_parsed(&self, clause: &Clause) -> Result<(), OntologyError> {
        let (name, arity) = head_functor(&clause.head)?;
        let is_fact = clause.body.is_empty();
        self.check_predicate(name, arity, is_fact)?;
        for goal in &clause.body {
            self.check_body_goal(goal)?;
        }
        debug!(clause = %clause, "clause validated");
        Ok(())
    }

    /// Checks that a named constraint exists, after synonym resolution.
    ///
    /// # Errors
    /// Returns [`OntologyError::UndefinedConstraint`] for unknown names.
    pub fn validate_constraint(&self, name: &str) -> Result<(), OntologyError> {
        if self.constraints.contains(self.resolve_synonym(name)) {
            Ok(())
        } else {
            Err(OntologyError::UndefinedConstraint {
                name: name.to_string(),
            })
        }
    }

    /// Terms shown to the generation service as the allowed vocabulary.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        let mut seen: BTreeSet<&String> = BTreeSet::new();
        self.types
            .iter()
            .chain(self.relationships.iter())
            .chain(self.synonyms.keys())
            .filter(|term| seen.insert(*term))
            .cloned()
            .collect()
    }

    pub fn add_type(&mut self, name: impl Into<String>) -> bool {
        self.types.insert(name.into())
    }

    pub fn add_relationship(&mut self, name: impl Into<String>) -> bool {
        self.relationships.insert(name.into())
    }

    pub fn add_constraint(&mut self, name: impl Into<String>) -> bool {
        self.constraints.insert(name.into())
    }

    /// Maps `term` onto `canonical`; returns the previous mapping if any.
    pub fn add_synonym(
        &mut self,
        term: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Option<String> {
        self.synonyms.insert(term.into(), canonical.into())
    }

    fn check_predicate(
        &self,
        predicate: &str,
        arity: usize,
        strict_relationships: bool,
    ) -> Result<(), OntologyError> {
        let resolved = self.resolve_synonym(predicate);
        if !is_valid_predicate_name(resolved) {
            return Err(OntologyError::InvalidPredicateName {
                name: resolved.to_string(),
            });
        }
        if self.types.contains(resolved) && arity != 1 {
            return Err(OntologyError::ArityMismatch {
                predicate: resolved.to_string(),
                expected: ArityRule::Exactly(1),
                actual: arity,
            });
        }
        if strict_relationships && self.relationships.contains(resolved) && arity < 2 {
            return Err(OntologyError::ArityMismatch {
                predicate: resolved.to_string(),
                expected: ArityRule::AtLeast(2),
                actual: arity,
            });
        }
        if !self.is_defined(resolved) {
            return Err(self.undefined(predicate));
        }
        Ok(())
    }

    fn check_body_goal(&self, goal: &Goal) -> Result<(), OntologyError> {
        match goal {
            Goal::Call(term) => {
                let (name, _) = term.functor().ok_or_else(|| OntologyError::UnsupportedGoal {
                    goal: term.to_string(),
                })?;
                if !is_valid_predicate_name(name) {
                    return Err(OntologyError::InvalidPredicateName {
                        name: name.to_string(),
                    });
                }
                if !self.is_defined(name) {
                    return Err(self.undefined(name));
                }
                Ok(())
            }
            Goal::Not(inner) => self.check_body_goal(inner),
            Goal::Unify(..) | Goal::NotUnify(..) => Err(OntologyError::UnsupportedGoal {
                goal: goal.to_string(),
            }),
        }
    }

    fn undefined(&self, predicate: &str) -> OntologyError {
        OntologyError::UndefinedPredicate {
            predicate: predicate.to_string(),
            suggestions: self.similar_terms(predicate),
        }
    }
}

impl From<&OntologyConfig> for OntologyStore {
    fn from(config: &OntologyConfig) -> Self {
        Self::new(config)
    }
}

fn head_functor(head: &Term) -> Result<(&str, usize), OntologyError> {
    head.functor()
        .ok_or_else(|| OntologyError::Syntax(ParseError::InvalidHead {
            found: head.to_string(),
        }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn animals() -> OntologyStore {
        OntologyStore::new(
            &OntologyConfig::new()
                .with_types(["bird", "canary", "pet", "person"])
                .with_relationships(["has_wings", "likes", "owns"])
                .with_constraints(["unique_owner"])
                .with_synonym("human", "person"),
        )
    }

    #[rstest]
    #[case("bird(tweety).", None)]
    #[case("likes(alice, pizza).", None)]
    #[case("owns(alice, rex, since(2020)).", None)]
    #[case("bird(a, b).", Some(ArityRule::Exactly(1)))]
    #[case("bird.", Some(ArityRule::Exactly(1)))]
    #[case("likes(alice).", Some(ArityRule::AtLeast(2)))]
    fn fact_arity_rules(#[case] text: &str, #[case] expected: Option<ArityRule>) {
        let result = animals().validate_clause(text);
        match expected {
            None => assert!(result.is_ok(), "{text}: {result:?}"),
            Some(rule) => assert!(
                matches!(result, Err(OntologyError::ArityMismatch { expected, .. }) if expected == rule),
                "{text}: {result:?}"
            ),
        }
    }

    #[test]
    fn synonyms_validate_like_their_canonical_term() {
        let store = animals();
        assert_eq!(
            store.validate_clause("human(bob).").is_ok(),
            store.validate_clause("person(bob).").is_ok()
        );
        assert!(store.is_defined("human"));
        assert_eq!(store.resolve_synonym("robot"), "robot");
    }

    #[test]
    fn undefined_predicate_carries_suggestions() {
        let err = animals()
            .validate_clause("bir(tweety).")
            .expect_err("undefined predicate");
        assert_eq!(err.suggestions(), ["bird".to_string()]);
        assert_eq!(
            err.to_string(),
            "predicate `bir` is not defined in the ontology. Did you mean: bird?"
        );
    }

    #[test]
    fn suggest_reports_when_nothing_is_close() {
        assert_eq!(animals().suggest("zebra"), "No similar terms found");
        assert_eq!(animals().suggest("hum"), "Did you mean: human?");
    }

    #[test]
    fn invalid_names_are_rejected_before_lookup() {
        let store = animals();
        assert!(matches!(
            store.validate_fact("Bird", &["tweety".to_string()]),
            Err(OntologyError::InvalidPredicateName { .. })
        ));
    }

    #[test]
    fn rule_bodies_are_checked_for_definedness() {
        let store = animals();
        assert!(store
            .validate_clause("has_wings(X) :- bird(X).")
            .is_ok());
        assert!(store
            .validate_clause("pet(X) :- likes(Y, X), \\+ bird(X).")
            .is_ok());
        let err = store
            .validate_clause("bird(X) :- flies(X).")
            .expect_err("undefined body goal");
        assert!(matches!(err, OntologyError::UndefinedPredicate { predicate, .. } if predicate == "flies"));
    }

    #[test]
    fn rule_heads_respect_type_arity() {
        assert!(matches!(
            animals().validate_clause("bird(X, Y) :- likes(X, Y)."),
            Err(OntologyError::ArityMismatch { .. })
        ));
    }

    #[test]
    fn nested_arguments_do_not_split_goals() {
        let store = animals();
        let clause = store
            .validate_clause("owns(X, pair(a, b)) :- likes(X, f(g(a, b), c)), pet(X).")
            .expect("valid rule");
        assert_eq!(clause.body.len(), 2);
    }

    #[test]
    fn constraints_and_terms() {
        let mut store = animals();
        assert!(store.validate_constraint("unique_owner").is_ok());
        assert!(store.validate_constraint("nope").is_err());
        store.add_type("fish");
        assert!(store.terms().contains(&"fish".to_string()));
        assert!(store.terms().contains(&"human".to_string()));
    }

    #[test]
    fn constraint_synonyms_resolve() {
        let mut store = animals();
        store.add_synonym("single_owner", "unique_owner");
        assert!(store.validate_constraint("single_owner").is_ok());
        store.add_synonym("one_owner", "nope");
        assert!(matches!(
            store.validate_constraint("one_owner"),
            Err(OntologyError::UndefinedConstraint { name }) if name == "one_owner"
        ));
    }
}
