//! Test support: scripted generation, sample ontologies and configuration.

pub mod config;
pub mod generator;
pub mod ontology;

pub use generator::ScriptedGenerator;
