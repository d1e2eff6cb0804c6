//! Logic program primitives shared by the ontology validator and the
//! knowledge engine: terms, clauses, the clause parser and unification.

pub mod parser;
pub mod term;
pub mod unify;

pub use parser::{is_well_formed, parse_clause, parse_query, ParseError};
pub use term::{Clause, ClauseKind, Goal, Query, Term};
pub use unify::Substitution;
