//! Tokenizer and recursive-descent parser for clause and query text.
//!
//! The grammar covers the subset of Prolog the pipeline produces and the
//! in-memory engine evaluates:
//!
//! ```text
//! clause := term [ ":-" goals ] "."
//! query  := goals [ "." ]
//! goals  := goal { "," goal }
//! goal   := "\+" goal | term [ ("=" | "\=") term ]
//! term   := atom [ "(" term { "," term } ")" ] | var | number | string
//!         | "[" [ term { "," term } [ "|" term ] ] "]" | "(" term ")"
//! ```
//!
//! Argument lists are parsed structurally, so commas nested inside arguments
//! never split goals.

use thiserror::Error;

use super::term::{Clause, Goal, Query, Term};

/// Errors produced while parsing clause or query text.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("clause text is empty")]
    Empty,
    #[error("unexpected character `{ch}` at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },
    #[error("expected {expected} but found {found} at offset {offset}")]
    Expected {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("rule body cannot be empty")]
    EmptyBody,
    #[error("clause must end with a period")]
    MissingPeriod,
    #[error("`{found}` cannot be used as a clause head")]
    InvalidHead { found: String },
    #[error("`{found}` is not a callable goal")]
    NotCallable { found: String },
    #[error("terms nest deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}

/// Deepest nesting of compound terms, lists, parentheses and negations.
const MAX_NESTING: usize = 256;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Atom(String),
    Var(String),
    Number(String),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Bar,
    Neck,
    End,
    Not,
    Eq,
    NotEq,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Atom(name) => format!("atom `{name}`"),
            Self::Var(name) => format!("variable `{name}`"),
            Self::Number(value) => format!("number `{value}`"),
            Self::Str(value) => format!("string \"{value}\""),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::LBracket => "`[`".to_string(),
            Self::RBracket => "`]`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Bar => "`|`".to_string(),
            Self::Neck => "`:-`".to_string(),
            Self::End => "`.`".to_string(),
            Self::Not => "`\\+`".to_string(),
            Self::Eq => "`=`".to_string(),
            Self::NotEq => "`\\=`".to_string(),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.src.len(), |(offset, _)| *offset)
    }

    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !keep(c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        out
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let offset = self.offset();
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }
            if c == '%' {
                self.take_while(|c| c != '\n');
                continue;
            }
            let token = match c {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                ',' => self.single(Token::Comma),
                '|' => self.single(Token::Bar),
                ':' if self.peek_at(1) == Some('-') => {
                    self.pos += 2;
                    Token::Neck
                }
                '.' => match self.peek_at(1) {
                    None => self.single(Token::End),
                    Some(next) if next.is_whitespace() || next == '%' => self.single(Token::End),
                    Some(_) => return Err(ParseError::UnexpectedChar { ch: c, offset }),
                },
                '\\' => match self.peek_at(1) {
                    Some('+') => {
                        self.pos += 2;
                        Token::Not
                    }
                    Some('=') => {
                        self.pos += 2;
                        Token::NotEq
                    }
                    _ => return Err(ParseError::UnexpectedChar { ch: c, offset }),
                },
                '=' if self.peek_at(1) != Some('=') => self.single(Token::Eq),
                '-' if self.peek_at(1).is_some_and(|next| next.is_ascii_digit()) => {
                    self.pos += 1;
                    Token::Number(format!("-{}", self.number()))
                }
                '\'' => Token::Atom(self.quoted('\'', "quoted atom", offset)?),
                '"' => Token::Str(self.quoted('"', "string", offset)?),
                c if c.is_ascii_digit() => Token::Number(self.number()),
                c if c.is_ascii_lowercase() => {
                    Token::Atom(self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'))
                }
                c if c.is_ascii_uppercase() || c == '_' => {
                    Token::Var(self.take_while(|c| c.is_ascii_alphanumeric() || c == '_'))
                }
                other => return Err(ParseError::UnexpectedChar { ch: other, offset }),
            };
            tokens.push((token, offset));
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn number(&mut self) -> String {
        let mut value = self.take_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            value.push('.');
            value.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        value
    }

    fn quoted(
        &mut self,
        quote: char,
        what: &'static str,
        offset: usize,
    ) -> Result<String, ParseError> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::Unterminated { what, offset }),
                Some('\\') => {
                    let Some(escaped) = self.peek_at(1) else {
                        return Err(ParseError::Unterminated { what, offset });
                    };
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                    self.pos += 2;
                }
                Some(c) if c == quote => {
                    if self.peek_at(1) == Some(quote) {
                        out.push(quote);
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        return Ok(out);
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end_offset: usize,
    anonymous: usize,
    depth: usize,
}

impl Parser {
    fn new(text: &str) -> Result<Self, ParseError> {
        let tokens = Lexer::new(text).tokenize()?;
        if tokens.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(Self {
            tokens,
            pos: 0,
            end_offset: text.len(),
            anonymous: 0,
            depth: 0,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end_offset, |(_, offset)| *offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expected(&self, expected: &'static str) -> ParseError {
        ParseError::Expected {
            expected,
            found: self
                .peek()
                .map_or_else(|| "end of input".to_string(), Token::describe),
            offset: self.offset(),
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.expected("end of input"))
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::TooDeep {
                limit: MAX_NESTING,
                offset: self.offset(),
            });
        }
        self.depth += 1;
        let parsed = parse(self);
        self.depth -= 1;
        parsed
    }

    fn clause(&mut self) -> Result<Clause, ParseError> {
        let head = self.term()?;
        if head.functor().is_none() {
            return Err(ParseError::InvalidHead {
                found: head.to_string(),
            });
        }
        let body = if self.eat(&Token::Neck) {
            if matches!(self.peek(), None | Some(Token::End)) {
                return Err(ParseError::EmptyBody);
            }
            self.goals()?
        } else {
            Vec::new()
        };
        match self.peek() {
            None => return Err(ParseError::MissingPeriod),
            Some(Token::End) => self.pos += 1,
            Some(_) => return Err(self.expected("`,` or `.`")),
        }
        self.finish()?;
        Ok(Clause { head, body })
    }

    fn query(&mut self) -> Result<Query, ParseError> {
        let goals = self.goals()?;
        self.eat(&Token::End);
        self.finish()?;
        Ok(Query { goals })
    }

    fn goals(&mut self) -> Result<Vec<Goal>, ParseError> {
        let mut goals = vec![self.goal()?];
        while self.eat(&Token::Comma) {
            goals.push(self.goal()?);
        }
        Ok(goals)
    }

    fn goal(&mut self) -> Result<Goal, ParseError> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::goal)?;
            return Ok(Goal::Not(Box::new(inner)));
        }
        let term = self.term()?;
        if self.eat(&Token::Eq) {
            return Ok(Goal::Unify(term, self.term()?));
        }
        if self.eat(&Token::NotEq) {
            return Ok(Goal::NotUnify(term, self.term()?));
        }
        if term.functor().is_none() {
            return Err(ParseError::NotCallable {
                found: term.to_string(),
            });
        }
        Ok(Goal::Call(term))
    }

    fn term(&mut self) -> Result<Term, ParseError> {
        self.nested(Self::simple_term)
    }

    fn simple_term(&mut self) -> Result<Term, ParseError> {
        let offset = self.offset();
        match self.next() {
            Some(Token::Atom(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments(&Token::RParen, "`,` or `)`")?;
                    Ok(Term::Compound(name, args))
                } else {
                    Ok(Term::Atom(name))
                }
            }
            Some(Token::Var(name)) if name == "_" => {
                self.anonymous += 1;
                Ok(Term::Var(format!("_#{}", self.anonymous)))
            }
            Some(Token::Var(name)) => Ok(Term::Var(name)),
            Some(Token::Number(value)) => Ok(Term::Number(value)),
            Some(Token::Str(value)) => Ok(Term::Str(value)),
            Some(Token::LBracket) => self.list(),
            Some(Token::LParen) => {
                let inner = self.term()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(other) => Err(ParseError::Expected {
                expected: "a term",
                found: other.describe(),
                offset,
            }),
            None => Err(ParseError::Expected {
                expected: "a term",
                found: "end of input".to_string(),
                offset,
            }),
        }
    }

    fn arguments(&mut self, close: &Token, expected: &'static str) -> Result<Vec<Term>, ParseError> {
        let mut args = vec![self.term()?];
        loop {
            if self.eat(&Token::Comma) {
                args.push(self.term()?);
            } else if self.eat(close) {
                return Ok(args);
            } else {
                return Err(self.expected(expected));
            }
        }
    }

    fn list(&mut self) -> Result<Term, ParseError> {
        if self.eat(&Token::RBracket) {
            return Ok(Term::list(Vec::new(), None));
        }
        let mut items = vec![self.term()?];
        while self.eat(&Token::Comma) {
            items.push(self.term()?);
        }
        let tail = if self.eat(&Token::Bar) {
            Some(self.term()?)
        } else {
            None
        };
        self.expect(&Token::RBracket, "`,`, `|` or `]`")?;
        Ok(Term::list(items, tail))
    }
}

/// Parses a fact or rule terminated by a period.
///
/// # Errors
/// Returns a [`ParseError`] describing the first syntax problem found.
pub fn parse_clause(text: &str) -> Result<Clause, ParseError> {
    Parser::new(text)?.clause()
}

/// Parses a conjunctive query; a trailing period is accepted.
///
/// # Errors
/// Returns a [`ParseError`] describing the first syntax problem found.
pub fn parse_query(text: &str) -> Result<Query, ParseError> {
    Parser::new(text)?.query()
}

/// Returns `true` when the text is either a well formed clause or query.
#[must_use]
pub fn is_well_formed(text: &str) -> bool {
    parse_clause(text).is_ok() || parse_query(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn parses_fact_with_nested_arguments() {
        let clause = parse_clause("likes(alice, pair(pizza, pasta)).").expect("clause");
        assert_eq!(clause.head.functor(), Some(("likes", 2)));
        assert_eq!(clause.head.args()[1].to_string(), "pair(pizza, pasta)");
        assert!(clause.body.is_empty());
    }

    #[test]
    fn rule_body_is_split_on_top_level_commas_only() {
        let clause =
            parse_clause("collector(X) :- owns(X, item(a, [b, c])), person(X).").expect("rule");
        assert_eq!(clause.body.len(), 2);
        assert_eq!(clause.body[0].to_string(), "owns(X, item(a, [b, c]))");
        assert_eq!(clause.body[1].to_string(), "person(X)");
    }

    #[test]
    fn parses_builtin_goals_in_queries() {
        let query = parse_query("bird(X), \\+ penguin(X), X \\= tweety").expect("query");
        assert_eq!(query.goals.len(), 3);
        assert!(matches!(query.goals[1], Goal::Not(_)));
        assert!(matches!(query.goals[2], Goal::NotUnify(_, _)));
        assert_eq!(query.visible_vars(), vec!["X".to_string()]);
    }

    #[test]
    fn anonymous_variables_are_distinct() {
        let clause = parse_clause("pair(_, _).").expect("clause");
        assert_ne!(clause.head.args()[0], clause.head.args()[1]);
    }

    #[test]
    fn anonymous_variables_never_alias_named_ones() {
        let query = parse_query("pair(_, _1), pair(_2, _)").expect("query");
        let mut vars = Vec::new();
        for goal in &query.goals {
            goal.collect_vars(&mut vars);
        }
        assert_eq!(vars.len(), 4);
        assert!(vars.contains(&"_1".to_string()));
        assert!(vars.contains(&"_2".to_string()));
        assert_eq!(query.to_string(), "pair(_, _1), pair(_2, _)");
    }

    #[test]
    fn nesting_is_bounded() {
        let depth = 50_000;
        let deep = format!("bird({}a{}).", "(".repeat(depth), ")".repeat(depth));
        assert!(matches!(
            parse_clause(&deep),
            Err(ParseError::TooDeep { limit: MAX_NESTING, .. })
        ));
        assert!(!is_well_formed(&deep));

        let negations = format!("{}bird(X)", "\\+ ".repeat(depth));
        assert!(matches!(parse_query(&negations), Err(ParseError::TooDeep { .. })));

        let lists = format!("p({}{}).", "[".repeat(depth), "]".repeat(depth));
        assert!(matches!(parse_clause(&lists), Err(ParseError::TooDeep { .. })));

        let shallow = format!("bird({}a{}).", "(".repeat(16), ")".repeat(16));
        assert!(parse_clause(&shallow).is_ok());
    }

    #[test]
    fn quoted_atoms_and_numbers() {
        let clause = parse_clause("lives_in('Mary Ann', 'New York', -3.5).").expect("clause");
        assert_eq!(
            clause.to_string(),
            "lives_in('Mary Ann', 'New York', -3.5)."
        );
    }

    #[test]
    fn query_accepts_optional_period() {
        assert!(parse_query("has_wings(tweety).").is_ok());
        assert!(parse_query("has_wings(tweety)").is_ok());
    }

    #[rstest]
    #[case("", ParseError::Empty)]
    #[case("bird(tweety)", ParseError::MissingPeriod)]
    #[case("bird(X) :- .", ParseError::EmptyBody)]
    #[case("X :- bird(X).", ParseError::InvalidHead { found: "X".to_string() })]
    fn rejects_malformed_clauses(#[case] text: &str, #[case] expected: ParseError) {
        assert_eq!(parse_clause(text).expect_err("should fail"), expected);
    }

    #[rstest]
    #[case("bird(tweety")]
    #[case("bird(tweety)) .")]
    #[case("Tweety is a bird.")]
    #[case("bird() .")]
    #[case("'unterminated(x).")]
    fn well_formedness_rejects_garbage(#[case] text: &str) {
        assert!(!is_well_formed(text));
    }
}
