//! Ontology domain: the vocabulary a session's logic program must respect.
//!
//! [`OntologyConfig`] is the serializable definition supplied by callers and
//! persisted with session snapshots. [`OntologyStore`] is the validating form
//! each session owns, answering naming, arity and definedness questions for
//! clauses before they reach the knowledge engine.

pub mod entities;
pub mod store;
pub mod value_objects;

pub use entities::OntologyConfig;
pub use store::{format_suggestions, ArityRule, OntologyError, OntologyStore};
pub use value_objects::{is_valid_predicate_name, PredicateName, PredicateNameError};
