use std::collections::HashMap;

use super::term::{Goal, Term};

/// Variable bindings accumulated during resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Substitution {
    bindings: HashMap<String, Term>,
}

impl Substitution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Follows variable chains until an unbound variable or a non-variable.
    #[must_use]
    pub fn walk<'a>(&'a self, term: &'a Term) -> &'a Term {
        let mut current = term;
        while let Term::Var(name) = current {
            match self.bindings.get(name) {
                Some(next) => current = next,
                None => break,
            }
        }
        current
    }

    /// Applies the substitution throughout a term.
    #[must_use]
    pub fn resolve(&self, term: &Term) -> Term {
        match self.walk(term) {
            Term::Compound(name, args) => {
                Term::Compound(name.clone(), args.iter().map(|arg| self.resolve(arg)).collect())
            }
            other => other.clone(),
        }
    }

    fn occurs(&self, var: &str, term: &Term) -> bool {
        match self.walk(term) {
            Term::Var(name) => name == var,
            Term::Compound(_, args) => args.iter().any(|arg| self.occurs(var, arg)),
            _ => false,
        }
    }

    fn bind(&mut self, var: &str, term: Term) -> bool {
        if self.occurs(var, &term) {
            return false;
        }
        self.bindings.insert(var.to_string(), term);
        true
    }

    /// Unifies two terms, extending the substitution in place.
    ///
    /// On failure the substitution may hold partial bindings; callers unify
    /// against a clone when they need to backtrack.
    pub fn unify(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.walk(left).clone();
        let right = self.walk(right).clone();
        match (&left, &right) {
            (Term::Var(a), Term::Var(b)) if a == b => true,
            (Term::Var(a), _) => self.bind(a, right.clone()),
            (_, Term::Var(b)) => self.bind(b, left.clone()),
            (Term::Compound(f, fargs), Term::Compound(g, gargs)) => {
                f == g
                    && fargs.len() == gargs.len()
                    && fargs
                        .iter()
                        .zip(gargs.iter())
                        .all(|(a, b)| self.unify(a, b))
            }
            (a, b) => a == b,
        }
    }
}

/// Renames every variable of a term with the given suffix.
#[must_use]
pub fn rename_term(term: &Term, suffix: usize) -> Term {
    match term {
        Term::Var(name) => Term::Var(format!("{name}#{suffix}")),
        Term::Compound(name, args) => Term::Compound(
            name.clone(),
            args.iter().map(|arg| rename_term(arg, suffix)).collect(),
        ),
        other => other.clone(),
    }
}

/// Renames every variable of a goal with the given suffix.
#[must_use]
pub fn rename_goal(goal: &Goal, suffix: usize) -> Goal {
    match goal {
        Goal::Call(term) => Goal::Call(rename_term(term, suffix)),
        Goal::Not(inner) => Goal::Not(Box::new(rename_goal(inner, suffix))),
        Goal::Unify(left, right) => {
            Goal::Unify(rename_term(left, suffix), rename_term(right, suffix))
        }
        Goal::NotUnify(left, right) => {
            Goal::NotUnify(rename_term(left, suffix), rename_term(right, suffix))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_nested_structures() {
        let mut subst = Substitution::new();
        let left = Term::compound("likes", vec![Term::var("X"), Term::atom("pizza")]);
        let right = Term::compound("likes", vec![Term::atom("alice"), Term::var("Y")]);
        assert!(subst.unify(&left, &right));
        assert_eq!(subst.resolve(&Term::var("X")), Term::atom("alice"));
        assert_eq!(subst.resolve(&Term::var("Y")), Term::atom("pizza"));
    }

    #[test]
    fn occurs_check_prevents_cyclic_terms() {
        let mut subst = Substitution::new();
        let cyclic = Term::compound("f", vec![Term::var("X")]);
        assert!(!subst.unify(&Term::var("X"), &cyclic));
    }

    #[test]
    fn renaming_keeps_atoms() {
        let renamed = rename_term(&Term::compound("p", vec![Term::var("X"), Term::atom("a")]), 7);
        assert_eq!(renamed.to_string(), "p(X#7, a)");
    }
}
