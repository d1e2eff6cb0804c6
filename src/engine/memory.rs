use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{EngineError, EngineFactory, KnowledgeEngine, Solution, Solutions};
use crate::{
    config::EngineSettings,
    logic::{
        is_well_formed, parse_clause, parse_query,
        unify::{rename_goal, rename_term},
        Clause, Goal, Query, Substitution, Term,
    },
};

#[derive(Debug, Default)]
struct Theory {
    texts: Vec<String>,
    clauses: Vec<Clause>,
    index: HashMap<(String, usize), Vec<usize>>,
}

impl Theory {
    fn load(texts: &[String]) -> Result<Self, EngineError> {
        let mut theory = Self::default();
        for text in texts {
            let clause = parse_clause(text).map_err(|source| EngineError::MalformedClause {
                clause: text.clone(),
                source,
            })?;
            if let Some((name, arity)) = clause.head.functor() {
                theory
                    .index
                    .entry((name.to_string(), arity))
                    .or_default()
                    .push(theory.clauses.len());
            }
            theory.texts.push(text.trim().to_string());
            theory.clauses.push(clause);
        }
        Ok(theory)
    }
}

/// Knowledge engine holding the theory in memory and answering queries by
/// depth-first SLD resolution.
///
/// Supports conjunction, `\+` negation as failure, `=` and `\=`, and the
/// `true`/`fail` builtins. Search is bounded by the configured depth,
/// solution count and inference count; resolution runs on the blocking pool
/// and stops early once the calling future is dropped.
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    settings: EngineSettings,
    theory: Arc<Theory>,
}

impl InMemoryEngine {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            theory: Arc::default(),
        }
    }

    /// Number of loaded clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.theory.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.theory.clauses.is_empty()
    }
}

#[async_trait]
impl KnowledgeEngine for InMemoryEngine {
    async fn assert_all(&mut self, clauses: &[String]) -> Result<(), EngineError> {
        self.theory = Arc::new(Theory::load(clauses)?);
        debug!(clauses = clauses.len(), "theory rebuilt");
        Ok(())
    }

    async fn solve(&self, query: &str) -> Result<Solutions, EngineError> {
        let query = parse_query(query).map_err(EngineError::MalformedQuery)?;
        let theory = Arc::clone(&self.theory);
        let settings = self.settings.clone();
        let guard = AbortOnDrop(Arc::new(AtomicBool::new(false)));
        let abort = Arc::clone(&guard.0);
        let solutions = tokio::task::spawn_blocking(move || {
            Resolver::new(&theory, &settings, &abort).run(&query)
        })
        .await
        .map_err(|err| EngineError::Task(err.to_string()))?;
        drop(guard);
        if solutions.truncated {
            warn!(
                max_depth = self.settings.max_depth,
                max_solutions = self.settings.max_solutions,
                max_inferences = self.settings.max_inferences,
                "resolution stopped at a search bound"
            );
        }
        Ok(solutions)
    }

    fn parse_check(&self, text: &str) -> bool {
        is_well_formed(text)
    }

    fn render_theory(&self) -> String {
        self.theory.texts.join("\n")
    }

    async fn clear(&mut self) -> Result<(), EngineError> {
        self.theory = Arc::default();
        Ok(())
    }
}

/// Builds [`InMemoryEngine`] instances sharing one set of search bounds.
#[derive(Clone, Debug, Default)]
pub struct InMemoryEngineFactory {
    settings: EngineSettings,
}

impl InMemoryEngineFactory {
    #[must_use]
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for InMemoryEngineFactory {
    fn create(&self) -> Box<dyn KnowledgeEngine> {
        Box::new(InMemoryEngine::new(self.settings.clone()))
    }
}

/// Raises the flag when a pending `solve` is dropped, so the blocking
/// resolver gives up instead of running to its bounds.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

enum Flow {
    Continue,
    Stop,
}

struct Resolver<'a> {
    theory: &'a Theory,
    abort: &'a AtomicBool,
    max_depth: usize,
    max_solutions: usize,
    max_inferences: usize,
    inferences: usize,
    renames: usize,
    truncated: bool,
}

impl<'a> Resolver<'a> {
    fn new(theory: &'a Theory, settings: &EngineSettings, abort: &'a AtomicBool) -> Self {
        Self {
            theory,
            abort,
            max_depth: settings.max_depth,
            max_solutions: settings.max_solutions,
            max_inferences: settings.max_inferences,
            inferences: 0,
            renames: 0,
            truncated: false,
        }
    }

    fn run(mut self, query: &Query) -> Solutions {
        let variables = query.visible_vars();
        let max_solutions = self.max_solutions;
        let mut solutions = Vec::new();
        let mut emit = |subst: &Substitution| {
            solutions.push(
                variables
                    .iter()
                    .map(|name| (name.clone(), render_value(&subst.resolve(&Term::var(name)))))
                    .collect::<Solution>(),
            );
            if solutions.len() >= max_solutions {
                Flow::Stop
            } else {
                Flow::Continue
            }
        };
        let flow = self.prove(&query.goals, &Substitution::new(), 0, &mut emit);
        let truncated = self.truncated || matches!(flow, Flow::Stop);
        Solutions {
            solutions,
            truncated,
        }
    }

    fn prove(
        &mut self,
        goals: &[Goal],
        subst: &Substitution,
        depth: usize,
        emit: &mut dyn FnMut(&Substitution) -> Flow,
    ) -> Flow {
        let Some((first, rest)) = goals.split_first() else {
            return emit(subst);
        };
        if depth > self.max_depth {
            self.truncated = true;
            return Flow::Continue;
        }
        match first {
            Goal::Unify(left, right) => {
                let mut next = subst.clone();
                if next.unify(left, right) {
                    self.prove(rest, &next, depth, emit)
                } else {
                    Flow::Continue
                }
            }
            Goal::NotUnify(left, right) => {
                let mut probe = subst.clone();
                if probe.unify(left, right) {
                    Flow::Continue
                } else {
                    self.prove(rest, subst, depth, emit)
                }
            }
            Goal::Not(inner) => {
                let mut proven = false;
                self.prove(
                    std::slice::from_ref(inner.as_ref()),
                    subst,
                    depth + 1,
                    &mut |_: &Substitution| {
                        proven = true;
                        Flow::Stop
                    },
                );
                if proven {
                    Flow::Continue
                } else {
                    self.prove(rest, subst, depth, emit)
                }
            }
            Goal::Call(term) => self.call(&subst.resolve(term), rest, subst, depth, emit),
        }
    }

    fn call(
        &mut self,
        goal: &Term,
        rest: &[Goal],
        subst: &Substitution,
        depth: usize,
        emit: &mut dyn FnMut(&Substitution) -> Flow,
    ) -> Flow {
        let Some((name, arity)) = goal.functor() else {
            return Flow::Continue;
        };
        self.inferences += 1;
        if self.inferences > self.max_inferences || self.abort.load(Ordering::Relaxed) {
            self.truncated = true;
            return Flow::Stop;
        }
        match (name, arity) {
            ("true", 0) => return self.prove(rest, subst, depth, emit),
            ("fail" | "false", 0) => return Flow::Continue,
            _ => {}
        }
        let theory = self.theory;
        let Some(candidates) = theory.index.get(&(name.to_string(), arity)) else {
            return Flow::Continue;
        };
        for &position in candidates {
            let clause = &theory.clauses[position];
            self.renames += 1;
            let suffix = self.renames;
            let mut next = subst.clone();
            if !next.unify(goal, &rename_term(&clause.head, suffix)) {
                continue;
            }
            let mut goals: Vec<Goal> = clause
                .body
                .iter()
                .map(|body_goal| rename_goal(body_goal, suffix))
                .collect();
            goals.extend_from_slice(rest);
            if let Flow::Stop = self.prove(&goals, &next, depth + 1, emit) {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }
}

fn anonymize(term: &Term) -> Term {
    match term {
        Term::Var(_) => Term::var("_"),
        Term::Compound(name, args) => Term::Compound(name.clone(), args.iter().map(anonymize).collect()),
        other => other.clone(),
    }
}

fn render_value(term: &Term) -> String {
    anonymize(term).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max_depth: usize, max_solutions: usize) -> EngineSettings {
        EngineSettings {
            max_depth,
            max_solutions,
            ..EngineSettings::default()
        }
    }

    async fn engine_with(clauses: &[&str]) -> InMemoryEngine {
        let mut engine = InMemoryEngine::new(EngineSettings::default());
        let clauses: Vec<String> = clauses.iter().map(|c| (*c).to_string()).collect();
        engine.assert_all(&clauses).await.expect("theory loads");
        engine
    }

    #[tokio::test]
    async fn derives_through_rule_chain() {
        let engine = engine_with(&[
            "canary(tweety).",
            "bird(X) :- canary(X).",
            "has_wings(X) :- bird(X).",
        ])
        .await;
        let answer = engine.solve("has_wings(tweety)").await.expect("solves");
        assert_eq!(answer.solutions, vec![Solution::default()]);

        let answer = engine.solve("has_wings(Who).").await.expect("solves");
        assert_eq!(answer.solutions.len(), 1);
        assert_eq!(answer.solutions[0].get("Who"), Some("tweety"));
    }

    #[tokio::test]
    async fn collects_every_solution_in_order() {
        let engine = engine_with(&["likes(alice, pizza).", "likes(bob, pasta).", "likes(carol, pizza)."]).await;
        let answer = engine.solve("likes(Who, pizza)").await.expect("solves");
        let who: Vec<_> = answer
            .solutions
            .iter()
            .filter_map(|solution| solution.get("Who"))
            .collect();
        assert_eq!(who, ["alice", "carol"]);
        assert!(!answer.truncated);
    }

    #[tokio::test]
    async fn negation_and_disequality() {
        let engine = engine_with(&[
            "bird(tweety).",
            "bird(pingu).",
            "penguin(pingu).",
            "flies(X) :- bird(X), \\+ penguin(X).",
        ])
        .await;
        let answer = engine.solve("flies(X)").await.expect("solves");
        assert_eq!(answer.solutions.len(), 1);
        assert_eq!(answer.solutions[0].get("X"), Some("tweety"));

        let answer = engine.solve("bird(X), X \\= tweety").await.expect("solves");
        assert_eq!(answer.solutions[0].get("X"), Some("pingu"));
    }

    #[tokio::test]
    async fn left_recursion_is_bounded() {
        let mut engine = InMemoryEngine::new(settings(32, 256));
        engine
            .assert_all(&[
                "ancestor(X, Y) :- parent(X, Y).".to_string(),
                "ancestor(X, Y) :- ancestor(X, Z), parent(Z, Y).".to_string(),
                "parent(ann, bob).".to_string(),
                "parent(bob, cid).".to_string(),
            ])
            .await
            .expect("theory loads");
        let answer = engine.solve("ancestor(ann, Y)").await.expect("solves");
        let found: Vec<_> = answer
            .solutions
            .iter()
            .filter_map(|solution| solution.get("Y"))
            .collect();
        assert_eq!(found, ["bob", "cid"]);
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn doubly_recursive_rule_stops_at_the_inference_bound() {
        let engine = engine_with(&[
            "ancestor(X, Y) :- parent(X, Y).",
            "ancestor(X, Y) :- ancestor(X, Z), ancestor(Z, Y).",
            "parent(ann, bob).",
            "parent(bob, cid).",
        ])
        .await;
        let answer = tokio::time::timeout(
            std::time::Duration::from_secs(60),
            engine.solve("ancestor(ann, Y)"),
        )
        .await
        .expect("search terminates")
        .expect("solves");
        assert!(answer.truncated);
        let found: Vec<_> = answer
            .solutions
            .iter()
            .filter_map(|solution| solution.get("Y"))
            .collect();
        assert_eq!(found.first(), Some(&"bob"));
        assert!(found.contains(&"cid"));
    }

    #[tokio::test]
    async fn inference_bound_is_configurable() {
        let mut engine = InMemoryEngine::new(EngineSettings {
            max_inferences: 2,
            ..EngineSettings::default()
        });
        engine
            .assert_all(&[
                "a :- b.".to_string(),
                "b :- c.".to_string(),
                "c.".to_string(),
            ])
            .await
            .expect("theory loads");
        let answer = engine.solve("a").await.expect("solves");
        assert!(answer.solutions.is_empty());
        assert!(answer.truncated);
    }

    #[test]
    fn raised_abort_flag_stops_resolution() {
        let theory = Theory::load(&["p(a).".to_string()]).expect("theory loads");
        let abort = AtomicBool::new(true);
        let query = parse_query("p(X)").expect("query parses");
        let answer = Resolver::new(&theory, &EngineSettings::default(), &abort).run(&query);
        assert!(answer.solutions.is_empty());
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn solution_bound_truncates() {
        let mut engine = InMemoryEngine::new(settings(64, 1));
        engine
            .assert_all(&["p(a).".to_string(), "p(b).".to_string()])
            .await
            .expect("theory loads");
        let answer = engine.solve("p(X)").await.expect("solves");
        assert_eq!(answer.solutions.len(), 1);
        assert!(answer.truncated);
    }

    #[tokio::test]
    async fn failed_load_keeps_previous_theory() {
        let mut engine = engine_with(&["p(a)."]).await;
        let err = engine
            .assert_all(&["p(b).".to_string(), "p(".to_string()])
            .await
            .expect_err("malformed clause");
        assert!(matches!(err, EngineError::MalformedClause { .. }));
        assert_eq!(engine.render_theory(), "p(a).");
    }

    #[tokio::test]
    async fn unbound_results_are_anonymous() {
        let engine = engine_with(&["owner(X, rex) :- true."]).await;
        let answer = engine.solve("owner(Who, rex)").await.expect("solves");
        assert_eq!(answer.solutions[0].get("Who"), Some("_"));
    }

    #[tokio::test]
    async fn clear_and_parse_check() {
        let mut engine = engine_with(&["p(a)."]).await;
        assert!(engine.parse_check("p(X)"));
        assert!(engine.parse_check("p(a)."));
        assert!(!engine.parse_check("p(a"));
        engine.clear().await.expect("clears");
        assert!(engine.is_empty());
        assert!(engine.solve("p(X)").await.expect("solves").solutions.is_empty());
    }
}
