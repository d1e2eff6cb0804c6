//! Sessions: an ordered logic program kept consistent with an ontology.
//!
//! All program, ontology and engine state sits behind one async mutex, so
//! mutations and queries on a session are serialized. Translation runs
//! without the lock held; only the ontology terms are read up front.

use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    ai::GenerationService,
    engine::KnowledgeEngine,
    errors::{Error, Result},
    logic::{parse_clause, ClauseKind},
    ontology::{OntologyConfig, OntologyError, OntologyStore, PredicateName},
    reasoning::{ReasonOptions, ReasoningLoop, ReasoningResult},
    translation::{prompt, TranslationError, TranslationPipeline, TranslationResult},
    usage::{UsageMetrics, UsageTracker},
};

mod options;
mod results;
mod snapshot;

pub use options::SessionOptions;
pub use results::{
    AnswerSource, AssertionResult, DroppedClause, QueryOptions, QueryResult, RevalidationReport,
};
pub use snapshot::{GraphFormat, KnowledgeGraph, SessionSnapshot};

struct SessionState {
    program: Vec<String>,
    ontology: OntologyStore,
    engine: Box<dyn KnowledgeEngine>,
}

impl SessionState {
    async fn rebuild(&mut self) -> Result<()> {
        self.engine.assert_all(&self.program).await?;
        Ok(())
    }

    /// Installs `ontology` and the clauses of `candidates` that satisfy it.
    /// Nothing changes when the engine rejects the surviving program.
    async fn replace(
        &mut self,
        ontology: OntologyStore,
        candidates: &[String],
    ) -> Result<RevalidationReport> {
        let report = revalidate(&ontology, candidates);
        self.engine.assert_all(&report.kept).await?;
        self.ontology = ontology;
        self.program = report.kept.clone();
        Ok(report)
    }
}

fn revalidate(ontology: &OntologyStore, clauses: &[String]) -> RevalidationReport {
    let mut report = RevalidationReport::default();
    for clause in clauses {
        let clause = clause.trim();
        match ontology.validate_clause(clause) {
            Ok(_) => report.kept.push(clause.to_string()),
            Err(err) => {
                warn!(clause, error = %err, "dropping clause that no longer validates");
                report.dropped.push(DroppedClause {
                    clause: clause.to_string(),
                    reason: Error::from(err).to_failure(),
                });
            }
        }
    }
    report
}

/// Collaborators and settings a session is created with.
pub(crate) struct SessionParts {
    pub id: String,
    pub ontology: Option<OntologyConfig>,
    pub engine: Box<dyn KnowledgeEngine>,
    pub checker: Arc<dyn KnowledgeEngine>,
    pub pipeline: TranslationPipeline,
    pub generator: Option<Arc<dyn GenerationService>>,
    pub usage: UsageTracker,
    pub max_reasoning_steps: u32,
    pub shutdown: CancellationToken,
}

/// A knowledge session owned by one caller.
pub struct Session {
    id: String,
    state: tokio::sync::Mutex<SessionState>,
    initial_ontology: Option<OntologyConfig>,
    pipeline: TranslationPipeline,
    generator: Option<Arc<dyn GenerationService>>,
    checker: Arc<dyn KnowledgeEngine>,
    usage: UsageTracker,
    max_reasoning_steps: u32,
    shutdown: CancellationToken,
    cancel: Mutex<CancellationToken>,
}

impl Session {
    /// Builds a session and loads `program`, skipping invalid clauses.
    pub(crate) async fn create(parts: SessionParts, program: &[String]) -> Result<Self> {
        let ontology = parts
            .ontology
            .as_ref()
            .map(OntologyStore::new)
            .unwrap_or_default();
        let session = Self {
            state: tokio::sync::Mutex::new(SessionState {
                program: Vec::new(),
                ontology: ontology.clone(),
                engine: parts.engine,
            }),
            id: parts.id,
            initial_ontology: parts.ontology,
            pipeline: parts.pipeline,
            generator: parts.generator,
            checker: parts.checker,
            usage: parts.usage,
            max_reasoning_steps: parts.max_reasoning_steps,
            cancel: Mutex::new(parts.shutdown.child_token()),
            shutdown: parts.shutdown,
        };
        if !program.is_empty() {
            let report = session.state.lock().await.replace(ontology, program).await?;
            info!(
                session = %session.id,
                loaded = report.kept.len(),
                skipped = report.dropped.len(),
                "initial program loaded"
            );
        }
        Ok(session)
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Generation usage recorded by this session.
    #[must_use]
    pub fn usage(&self) -> UsageMetrics {
        self.usage.session()
    }

    #[must_use]
    pub fn max_reasoning_steps(&self) -> u32 {
        self.max_reasoning_steps
    }

    pub(crate) fn generator(&self) -> Option<&dyn GenerationService> {
        self.generator.as_deref()
    }

    /// Token observed by operations started from now on.
    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Cancels every in-flight translation, fallback and reasoning loop of
    /// this session. Later operations are unaffected.
    pub fn cancel_pending(&self) {
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        current.cancel();
        *current = self.shutdown.child_token();
        info!(session = %self.id, "pending operations cancelled");
    }

    /// Ordered program clauses.
    pub async fn program(&self) -> Vec<String> {
        self.state.lock().await.program.clone()
    }

    /// Copy of the session's current ontology.
    pub async fn ontology(&self) -> OntologyConfig {
        self.state.lock().await.ontology.config()
    }

    /// Terms offered to the generation service as vocabulary.
    pub async fn ontology_terms(&self) -> Vec<String> {
        self.state.lock().await.ontology.terms()
    }

    /// Validates a fact or rule against the ontology and appends it.
    pub async fn assert_prolog(&self, clause: &str) -> AssertionResult {
        let text = clause.trim();
        match self.assert_clause(text).await {
            Ok(clause) => AssertionResult::asserted(clause),
            Err(err) => {
                warn!(session = %self.id, clause = text, error = %err, "assertion rejected");
                AssertionResult::failed((!text.is_empty()).then(|| text.to_string()), &err)
            }
        }
    }

    async fn assert_clause(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Err(Error::InvalidInput("clause text is empty".to_string()));
        }
        if ClauseKind::of_text(text) == ClauseKind::Query {
            return Err(Error::NotAnAssertion(text.to_string()));
        }
        let mut state = self.state.lock().await;
        state.ontology.validate_clause(text)?;
        state.program.push(text.to_string());
        if let Err(err) = state.rebuild().await {
            state.program.pop();
            return Err(err);
        }
        info!(session = %self.id, clause = text, "clause asserted");
        Ok(text.to_string())
    }

    /// Translates a natural language statement and asserts the result.
    pub async fn assert_statement(&self, statement: &str) -> AssertionResult {
        let translation = match self.translate(statement).await {
            Ok(translation) => translation,
            Err(err) => return AssertionResult::failed(None, &err),
        };
        if translation.kind == ClauseKind::Query {
            let err = Error::NotAnAssertion(translation.content.clone());
            return AssertionResult::failed(Some(translation.content.clone()), &err)
                .with_translation(translation);
        }
        self.assert_prolog(&translation.content)
            .await
            .with_translation(translation)
    }

    /// Solves `query`, collecting every solution.
    ///
    /// A trailing period is accepted. When nothing is proven and
    /// [`QueryOptions::allow_sub_symbolic_fallback`] is set, the generation
    /// service is asked to answer from the rendered knowledge graph.
    pub async fn query(&self, query: &str, options: QueryOptions) -> QueryResult {
        let text = query.trim();
        if text.is_empty() {
            let err = Error::InvalidInput("query text is empty".to_string());
            return QueryResult::failed(None, &err);
        }
        if is_rule_text(text) {
            return QueryResult::failed(Some(text.to_string()), &Error::NotAQuery(text.to_string()));
        }

        let cancel = self.cancellation();
        let (outcome, knowledge) = {
            let state = self.state.lock().await;
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    warn!(session = %self.id, query = text, "query cancelled");
                    let err = Error::from(TranslationError::Cancelled);
                    return QueryResult::failed(Some(text.to_string()), &err);
                }
                solved = state.engine.solve(text) => solved,
            };
            let unproven = matches!(&outcome, Ok(found) if found.solutions.is_empty());
            let knowledge = (unproven
                && options.allow_sub_symbolic_fallback
                && self.generator.is_some())
            .then(|| state.engine.render_theory());
            (outcome, knowledge)
        };

        let failed = match outcome {
            Ok(found) if !found.solutions.is_empty() => {
                return QueryResult::proven(text, found.solutions);
            }
            Ok(_) => QueryResult::failed(Some(text.to_string()), &Error::NoSolution(text.to_string())),
            Err(err) => return QueryResult::failed(Some(text.to_string()), &Error::from(err)),
        };

        match (knowledge, self.generator.as_deref()) {
            (Some(knowledge), Some(generator)) => {
                self.fallback(generator, text, &knowledge, failed).await
            }
            _ => failed,
        }
    }

    async fn fallback(
        &self,
        generator: &dyn GenerationService,
        question: &str,
        knowledge: &str,
        mut failed: QueryResult,
    ) -> QueryResult {
        let cancel = self.cancellation();
        let prompt = prompt::fallback(question, knowledge);
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::from(TranslationError::Cancelled)),
            generation = generator.generate(&prompt) => generation.map_err(Error::from),
        };
        match outcome {
            Ok(generation) if !generation.text.trim().is_empty() => {
                info!(session = %self.id, query = question, "answered by fallback");
                failed.with_fallback(generation.text.trim().to_string())
            }
            Ok(_) => {
                failed
                    .explanation
                    .push("Fallback answer unavailable: empty response".to_string());
                failed
            }
            Err(err) => {
                warn!(session = %self.id, error = %err, "fallback answer failed");
                failed
                    .explanation
                    .push(format!("Fallback answer unavailable: {err}"));
                failed
            }
        }
    }

    /// Translates a natural language question and runs it as a query.
    pub async fn nquery(&self, question: &str, options: QueryOptions) -> QueryResult {
        let translation = match self.translate(question).await {
            Ok(translation) => translation,
            Err(err) => return QueryResult::failed(None, &err),
        };
        if translation.kind != ClauseKind::Query {
            let err = Error::NotAQuery(translation.content.clone());
            return QueryResult::failed(Some(translation.content.clone()), &err)
                .with_translation(translation);
        }
        self.query(&translation.content, options)
            .await
            .with_translation(translation)
    }

    async fn translate(&self, text: &str) -> Result<TranslationResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("statement text is empty".to_string()));
        }
        let generator = self
            .generator
            .as_deref()
            .ok_or(TranslationError::MissingGenerator)?;
        let terms = self.ontology_terms().await;
        let cancel = self.cancellation();
        let translation = self
            .pipeline
            .translate(generator, self.checker.as_ref(), text, &terms, &cancel)
            .await?;
        Ok(translation)
    }

    /// Works towards an answer for `task` through a bounded sequence of
    /// generated query, assert and conclude actions.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for an empty task or a zero step bound,
    /// and the loop errors described on [`ReasoningLoop::run`].
    pub async fn reason(&self, task: &str, options: ReasonOptions) -> Result<ReasoningResult> {
        let task = task.trim();
        if task.is_empty() {
            return Err(Error::InvalidInput("task text is empty".to_string()));
        }
        let max_steps = options.max_steps.unwrap_or(self.max_reasoning_steps);
        if max_steps == 0 {
            return Err(Error::InvalidInput(
                "reasoning needs at least one step".to_string(),
            ));
        }
        ReasoningLoop::new(self, max_steps).run(task).await
    }

    /// Replaces the ontology and drops every clause that no longer validates,
    /// keeping the order of the survivors.
    ///
    /// # Errors
    /// Returns an engine error when the surviving program cannot be loaded;
    /// the session is left unchanged in that case.
    pub async fn reload_ontology(&self, config: OntologyConfig) -> Result<RevalidationReport> {
        let mut state = self.state.lock().await;
        let program = state.program.clone();
        let report = state.replace(OntologyStore::new(&config), &program).await?;
        info!(
            session = %self.id,
            kept = report.kept.len(),
            dropped = report.dropped.len(),
            "ontology reloaded"
        );
        Ok(report)
    }

    /// Empties the program, resets the engine and restores the ontology the
    /// session was created with, if any.
    ///
    /// # Errors
    /// Returns an engine error when the engine cannot be reset.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.engine.clear().await?;
        state.program.clear();
        if let Some(config) = &self.initial_ontology {
            state.ontology = OntologyStore::new(config);
        }
        info!(session = %self.id, "session cleared");
        Ok(())
    }

    /// Snapshot of the program and ontology.
    pub async fn save_state(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            program: state.program.clone(),
            ontology: state.ontology.config(),
            saved_at: Some(chrono::Utc::now()),
        }
    }

    /// Replaces program and ontology with `snapshot`. Clauses that fail to
    /// parse or validate are skipped and listed in the report. The session
    /// keeps its own id.
    ///
    /// # Errors
    /// Returns an engine error when the program cannot be loaded.
    pub async fn load_state(&self, snapshot: &SessionSnapshot) -> Result<RevalidationReport> {
        let mut state = self.state.lock().await;
        let report = state
            .replace(OntologyStore::new(&snapshot.ontology), &snapshot.program)
            .await?;
        info!(
            session = %self.id,
            from = %snapshot.session_id,
            loaded = report.kept.len(),
            skipped = report.dropped.len(),
            "state loaded"
        );
        Ok(report)
    }

    /// Removes the first clause equal to `clause`, by text or by parsed form.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInput`] for empty text, or an engine error when
    /// the remaining program cannot be reloaded.
    pub async fn retract_prolog(&self, clause: &str) -> Result<bool> {
        let target = clause.trim();
        if target.is_empty() {
            return Err(Error::InvalidInput("clause text is empty".to_string()));
        }
        let parsed = parse_clause(target).ok();
        let mut state = self.state.lock().await;
        let position = state.program.iter().position(|existing| {
            existing == target
                || parsed
                    .as_ref()
                    .is_some_and(|parsed| parse_clause(existing).ok().as_ref() == Some(parsed))
        });
        let Some(position) = position else {
            return Ok(false);
        };
        let removed = state.program.remove(position);
        if let Err(err) = state.rebuild().await {
            state.program.insert(position, removed);
            return Err(err);
        }
        info!(session = %self.id, clause = %removed, "clause retracted");
        Ok(true)
    }

    /// Asserts `type_name(entity).`
    pub async fn add_fact(&self, entity: &str, type_name: &str) -> AssertionResult {
        self.assert_prolog(&format!("{}({}).", type_name.trim(), entity.trim()))
            .await
    }

    /// Asserts `relation(subject, object).`
    pub async fn add_relationship(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> AssertionResult {
        self.assert_prolog(&format!(
            "{}({}, {}).",
            relation.trim(),
            subject.trim(),
            object.trim()
        ))
        .await
    }

    /// Asserts a rule; facts and queries are rejected.
    pub async fn add_rule(&self, rule: &str) -> AssertionResult {
        let text = rule.trim();
        if ClauseKind::of_text(text) != ClauseKind::Rule {
            let err = Error::InvalidInput(format!("`{text}` is not a rule"));
            return AssertionResult::failed(Some(text.to_string()), &err);
        }
        self.assert_prolog(text).await
    }

    /// # Errors
    /// See [`Session::retract_prolog`].
    pub async fn remove_fact(&self, entity: &str, type_name: &str) -> Result<bool> {
        self.retract_prolog(&format!("{}({}).", type_name.trim(), entity.trim()))
            .await
    }

    /// # Errors
    /// See [`Session::retract_prolog`].
    pub async fn remove_relationship(
        &self,
        subject: &str,
        relation: &str,
        object: &str,
    ) -> Result<bool> {
        self.retract_prolog(&format!(
            "{}({}, {}).",
            relation.trim(),
            subject.trim(),
            object.trim()
        ))
        .await
    }

    /// # Errors
    /// See [`Session::retract_prolog`].
    pub async fn remove_rule(&self, rule: &str) -> Result<bool> {
        self.retract_prolog(rule).await
    }

    /// Renders the program, or the program and ontology as JSON.
    ///
    /// # Errors
    /// Returns a serialization error for [`GraphFormat::Json`].
    pub async fn knowledge_graph(&self, format: GraphFormat) -> Result<String> {
        let state = self.state.lock().await;
        match format {
            GraphFormat::Prolog => Ok(state.program.join("\n")),
            GraphFormat::Json => {
                let (rules, facts): (Vec<String>, Vec<String>) = state
                    .program
                    .iter()
                    .cloned()
                    .partition(|clause| ClauseKind::of_text(clause) == ClauseKind::Rule);
                let graph = KnowledgeGraph {
                    facts,
                    rules,
                    entities: state.ontology.types().iter().cloned().collect(),
                    relationships: state.ontology.relationships().iter().cloned().collect(),
                    constraints: state.ontology.constraints().iter().cloned().collect(),
                };
                Ok(serde_json::to_string(&graph)?)
            }
        }
    }

    /// Adds a type to this session's ontology and drops the clauses it
    /// invalidates, such as relationship facts sharing the name.
    ///
    /// # Errors
    /// Returns [`OntologyError::InvalidPredicateName`] for illegal names, or
    /// an engine error when the surviving program cannot be loaded.
    pub async fn add_type(&self, name: &str) -> Result<RevalidationReport> {
        let name = checked_name(name)?;
        self.update_ontology(|ontology| ontology.add_type(name)).await
    }

    /// Adds a relationship to this session's ontology and drops the clauses
    /// it invalidates.
    ///
    /// # Errors
    /// See [`Session::add_type`].
    pub async fn add_relationship_type(&self, name: &str) -> Result<RevalidationReport> {
        let name = checked_name(name)?;
        self.update_ontology(|ontology| ontology.add_relationship(name))
            .await
    }

    /// Adds a constraint to this session's ontology.
    ///
    /// # Errors
    /// See [`Session::add_type`].
    pub async fn add_constraint(&self, name: &str) -> Result<RevalidationReport> {
        let name = checked_name(name)?;
        self.update_ontology(|ontology| ontology.add_constraint(name))
            .await
    }

    /// Maps `term` onto `canonical` in this session's ontology, replacing any
    /// earlier mapping of `term`. Clauses that no longer validate under the
    /// new mapping are dropped.
    ///
    /// # Errors
    /// See [`Session::add_type`].
    pub async fn add_synonym(&self, term: &str, canonical: &str) -> Result<RevalidationReport> {
        let term = checked_name(term)?;
        let canonical = checked_name(canonical)?;
        self.update_ontology(|ontology| {
            ontology.add_synonym(term, canonical.clone()).as_ref() != Some(&canonical)
        })
        .await
    }

    /// Applies `change` to a copy of the ontology and installs it with the
    /// program revalidated. `change` reports whether anything changed.
    async fn update_ontology(
        &self,
        change: impl FnOnce(&mut OntologyStore) -> bool + Send,
    ) -> Result<RevalidationReport> {
        let mut state = self.state.lock().await;
        let program = state.program.clone();
        let mut ontology = state.ontology.clone();
        if !change(&mut ontology) {
            return Ok(RevalidationReport {
                kept: program,
                dropped: Vec::new(),
            });
        }
        let report = state.replace(ontology, &program).await?;
        info!(
            session = %self.id,
            kept = report.kept.len(),
            dropped = report.dropped.len(),
            "ontology updated"
        );
        Ok(report)
    }
}

fn checked_name(name: &str) -> Result<String> {
    let name = PredicateName::new(name.trim()).map_err(OntologyError::from)?;
    Ok(name.into_string())
}

/// Whether query text is really a rule, with or without its period.
fn is_rule_text(text: &str) -> bool {
    ClauseKind::of_text(&format!("{}.", text.trim_end_matches('.'))) == ClauseKind::Rule
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("strategies", &self.pipeline.strategies())
            .field("max_reasoning_steps", &self.max_reasoning_steps)
            .finish_non_exhaustive()
    }
}
