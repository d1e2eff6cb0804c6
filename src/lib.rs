#![allow(clippy::module_name_repetitions)]
#![doc = "Ontology-constrained natural language to logic program translation, with sessions that keep a Prolog program consistent with an ontology."]

pub use self::errors::Error;

pub mod ai;
pub mod config;
pub mod engine;
pub mod errors;
pub mod logger;
pub mod logic;
pub mod manager;
pub mod ontology;
pub mod reasoning;
pub mod session;
pub mod translation;
pub mod usage;

#[cfg(any(test, feature = "testing"))]
pub mod tests_cfg;

pub use manager::Mcr;

/// Application results options list
pub type Result<T, E = Error> = std::result::Result<T, E>;
