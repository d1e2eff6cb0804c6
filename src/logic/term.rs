use std::fmt::{self, Display, Formatter};

/// Functor used for list cells, rendered back with bracket notation.
pub const LIST_CONS: &str = "[|]";
/// Atom representing the empty list.
pub const LIST_NIL: &str = "[]";

/// A first-order term of the logic language.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Constant symbol such as `tweety` or `'New York'`.
    Atom(String),
    /// Logic variable such as `X` or `_Tail`.
    Var(String),
    /// Numeric literal kept in its source spelling.
    Number(String),
    /// Double quoted string literal.
    Str(String),
    /// Structure `name(arg, ...)`, including list cells.
    Compound(String, Vec<Term>),
}

impl Term {
    /// Builds an atom term.
    #[must_use]
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(name.into())
    }

    /// Builds a variable term.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// Builds a compound term.
    #[must_use]
    pub fn compound(name: impl Into<String>, args: Vec<Term>) -> Self {
        Self::Compound(name.into(), args)
    }

    /// Builds a proper list, or a partial list when `tail` is supplied.
    #[must_use]
    pub fn list(items: Vec<Term>, tail: Option<Term>) -> Self {
        let mut list = tail.unwrap_or_else(|| Self::atom(LIST_NIL));
        for item in items.into_iter().rev() {
            list = Self::Compound(LIST_CONS.to_string(), vec![item, list]);
        }
        list
    }

    /// Returns the predicate indicator `name/arity` when the term is callable.
    #[must_use]
    pub fn functor(&self) -> Option<(&str, usize)> {
        match self {
            Self::Atom(name) => Some((name, 0)),
            Self::Compound(name, args) => Some((name, args.len())),
            _ => None,
        }
    }

    /// Returns the arguments of a callable term.
    #[must_use]
    pub fn args(&self) -> &[Term] {
        match self {
            Self::Compound(_, args) => args,
            _ => &[],
        }
    }

    /// Collects variable names in order of first appearance.
    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Self::Var(name) => {
                if !out.iter().any(|seen| seen == name) {
                    out.push(name.clone());
                }
            }
            Self::Compound(_, args) => {
                for arg in args {
                    arg.collect_vars(out);
                }
            }
            _ => {}
        }
    }
}

fn is_plain_atom(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn write_atom(f: &mut Formatter<'_>, name: &str) -> fmt::Result {
    if is_plain_atom(name) || name == LIST_NIL {
        f.write_str(name)
    } else {
        write!(f, "'{}'", name.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

fn write_list(f: &mut Formatter<'_>, head: &Term, tail: &Term) -> fmt::Result {
    write!(f, "[{head}")?;
    let mut rest = tail;
    loop {
        match rest {
            Term::Compound(name, args) if name == LIST_CONS && args.len() == 2 => {
                write!(f, ", {}", args[0])?;
                rest = &args[1];
            }
            Term::Atom(name) if name == LIST_NIL => break,
            other => {
                write!(f, "|{other}")?;
                break;
            }
        }
    }
    f.write_str("]")
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(name) => write_atom(f, name),
            Self::Var(name) if name.starts_with("_#") => f.write_str("_"),
            Self::Var(name) => f.write_str(name),
            Self::Number(value) => f.write_str(value),
            Self::Str(value) => write!(
                f,
                "\"{}\"",
                value.replace('\\', "\\\\").replace('"', "\\\"")
            ),
            Self::Compound(name, args) if name == LIST_CONS && args.len() == 2 => {
                write_list(f, &args[0], &args[1])
            }
            Self::Compound(name, args) => {
                write_atom(f, name)?;
                f.write_str("(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A single goal inside a rule body or query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Goal {
    /// Call a user predicate or one of `true` / `fail`.
    Call(Term),
    /// Negation as failure: `\+ Goal`.
    Not(Box<Goal>),
    /// Unification `A = B`.
    Unify(Term, Term),
    /// Non-unifiability `A \= B`.
    NotUnify(Term, Term),
}

impl Goal {
    /// Collects variable names in order of first appearance.
    pub fn collect_vars(&self, out: &mut Vec<String>) {
        match self {
            Self::Call(term) => term.collect_vars(out),
            Self::Not(inner) => inner.collect_vars(out),
            Self::Unify(left, right) | Self::NotUnify(left, right) => {
                left.collect_vars(out);
                right.collect_vars(out);
            }
        }
    }
}

impl Display for Goal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call(term) => write!(f, "{term}"),
            Self::Not(inner) => write!(f, "\\+ {inner}"),
            Self::Unify(left, right) => write!(f, "{left} = {right}"),
            Self::NotUnify(left, right) => write!(f, "{left} \\= {right}"),
        }
    }
}

/// Classification of a parsed clause text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseKind {
    Fact,
    Rule,
    Query,
}

impl ClauseKind {
    /// Classifies clause text.
    ///
    /// Text ending in a period is an assertion, anything else is a query.
    /// Assertions that parse are classified by their body; for text that
    /// does not parse a top level `:-` outside quotes marks a rule.
    #[must_use]
    pub fn of_text(text: &str) -> Self {
        let text = text.trim();
        if !text.ends_with('.') {
            return Self::Query;
        }
        match super::parse_clause(text) {
            Ok(clause) => clause.kind(),
            Err(_) if has_unquoted_neck(text) => Self::Rule,
            Err(_) => Self::Fact,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Rule => "rule",
            Self::Query => "query",
        }
    }
}

fn has_unquoted_neck(text: &str) -> bool {
    let mut quote = None;
    let mut previous = None;
    for c in text.chars() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c == '-' && previous == Some(':') => return true,
            None => {}
        }
        previous = Some(c);
    }
    false
}

impl Display for ClauseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A program clause: a fact when `body` is empty, a rule otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub head: Term,
    pub body: Vec<Goal>,
}

impl Clause {
    #[must_use]
    pub fn kind(&self) -> ClauseKind {
        if self.body.is_empty() {
            ClauseKind::Fact
        } else {
            ClauseKind::Rule
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            f.write_str(" :- ")?;
            write_goals(f, &self.body)?;
        }
        f.write_str(".")
    }
}

/// A conjunctive query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub goals: Vec<Goal>,
}

impl Query {
    /// Names of the variables a caller can observe, in order of appearance.
    ///
    /// Variables starting with an underscore are treated as don't-care.
    #[must_use]
    pub fn visible_vars(&self) -> Vec<String> {
        let mut vars = Vec::new();
        for goal in &self.goals {
            goal.collect_vars(&mut vars);
        }
        vars.retain(|name| !name.starts_with('_'));
        vars
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write_goals(f, &self.goals)
    }
}

fn write_goals(f: &mut Formatter<'_>, goals: &[Goal]) -> fmt::Result {
    for (index, goal) in goals.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{goal}")?;
    }
    Ok(())
}
