//! Provider adapters implementing [`crate::ai::GenerationService`].

pub mod openai;
