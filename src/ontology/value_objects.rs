use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

fn predicate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z][a-zA-Z0-9_]*$").expect("predicate name pattern"))
}

/// Returns `true` when `name` follows the predicate naming convention: a
/// lowercase first letter followed by letters, digits or underscores.
#[must_use]
pub fn is_valid_predicate_name(name: &str) -> bool {
    predicate_pattern().is_match(name)
}

/// Value object ensuring that supplied text is a legal predicate name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PredicateName {
    value: String,
}

impl PredicateName {
    /// Validates and constructs a new [`PredicateName`].
    pub fn new(value: impl Into<String>) -> Result<Self, PredicateNameError> {
        let value = value.into();
        if !is_valid_predicate_name(&value) {
            return Err(PredicateNameError::Invalid { value });
        }
        Ok(Self { value })
    }

    /// Returns the underlying textual representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }
}

impl Display for PredicateName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl FromStr for PredicateName {
    type Err = PredicateNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for PredicateName {
    type Error = PredicateNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Errors produced when validating a [`PredicateName`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PredicateNameError {
    /// The provided text does not follow the naming convention.
    #[error("invalid predicate name: {value}")]
    Invalid { value: String },
}
