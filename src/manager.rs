//! Process-wide owner of configuration, collaborators and sessions.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    ai::{build_generator, GenerationService},
    config::{Config, ConfigError},
    engine::{EngineFactory, InMemoryEngineFactory, KnowledgeEngine},
    errors::{Error, Result},
    session::{Session, SessionOptions, SessionParts},
    translation::{StrategyRegistry, TranslationPipeline},
    usage::{MeteredGenerator, UsageCounters, UsageMetrics, UsageTracker},
};

/// Creates sessions and aggregates their generation usage.
///
/// The manager keeps only weak handles to sessions; a session lives as long
/// as its caller holds it.
pub struct Mcr {
    config: Config,
    generator: Option<Arc<dyn GenerationService>>,
    engine_factory: Arc<dyn EngineFactory>,
    registry: StrategyRegistry,
    usage: Arc<UsageCounters>,
    sessions: DashMap<String, Weak<Session>>,
    shutdown: CancellationToken,
}

impl Mcr {
    /// Builds a manager with the configured generation service and the
    /// in-memory knowledge engine.
    ///
    /// # Errors
    /// Returns a configuration error when settings are invalid or the
    /// generation backend cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate().map_err(ConfigError::from)?;
        let generator = build_generator(&config.ai).map_err(ConfigError::from)?;
        let engine_factory = Arc::new(InMemoryEngineFactory::new(config.engine.clone()));
        info!(
            generator = generator.is_some(),
            strategies = ?config.translation.strategies,
            "manager initialized"
        );
        Ok(Self {
            config,
            generator,
            engine_factory,
            registry: StrategyRegistry::new(),
            usage: Arc::new(UsageCounters::new()),
            sessions: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Replaces the generation service used by sessions created afterwards.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn GenerationService>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Replaces the knowledge engine used by sessions created afterwards.
    #[must_use]
    pub fn with_engine_factory(mut self, factory: impl EngineFactory + 'static) -> Self {
        self.engine_factory = Arc::new(factory);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Creates a session and registers it by id.
    ///
    /// # Errors
    /// Returns a configuration error for unknown strategy names or zero
    /// bounds, and [`Error::InvalidInput`] after [`Mcr::shutdown`].
    pub async fn create_session(&self, options: SessionOptions) -> Result<Arc<Session>> {
        if self.shutdown.is_cancelled() {
            return Err(Error::InvalidInput("manager has been shut down".to_string()));
        }
        let settings = options.translation_settings(&self.config.translation);
        let pipeline = TranslationPipeline::from_settings(&settings, &self.registry)?;
        let max_reasoning_steps = options
            .max_reasoning_steps
            .unwrap_or(self.config.reasoning.max_steps);
        if max_reasoning_steps == 0 {
            let mut errors = validator::ValidationErrors::new();
            errors.add("max_reasoning_steps", validator::ValidationError::new("range"));
            return Err(ConfigError::Invalid(errors).into());
        }

        let id = Uuid::new_v4().to_string();
        let usage = UsageTracker::new(Arc::clone(&self.usage));
        let generator = self.generator.as_ref().map(|inner| {
            Arc::new(MeteredGenerator::new(Arc::clone(inner), usage.clone()))
                as Arc<dyn GenerationService>
        });
        let checker: Arc<dyn KnowledgeEngine> = Arc::from(self.engine_factory.create());
        let parts = SessionParts {
            id: id.clone(),
            ontology: options.ontology.clone(),
            engine: self.engine_factory.create(),
            checker,
            pipeline,
            generator,
            usage,
            max_reasoning_steps,
            shutdown: self.shutdown.clone(),
        };

        let session = Arc::new(Session::create(parts, &options.program).await?);
        self.sessions.insert(id.clone(), Arc::downgrade(&session));
        info!(session = %id, "session created");
        Ok(session)
    }

    /// Looks up a live session.
    #[must_use]
    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.get(id).and_then(|entry| entry.upgrade());
        if session.is_none() {
            self.sessions.remove_if(id, |_, weak| weak.strong_count() == 0);
        }
        session
    }

    /// Ids of sessions that are still alive.
    #[must_use]
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.retain(|_, weak| weak.strong_count() > 0);
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Unregisters a session and cancels its in-flight operations.
    pub fn release_session(&self, id: &str) -> bool {
        let Some((_, weak)) = self.sessions.remove(id) else {
            return false;
        };
        if let Some(session) = weak.upgrade() {
            session.cancel_pending();
        }
        info!(session = %id, "session released");
        true
    }

    /// Usage summed over every session's generation calls.
    #[must_use]
    pub fn usage(&self) -> UsageMetrics {
        self.usage.snapshot()
    }

    /// Cancels every in-flight session operation and forgets all sessions.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.sessions.clear();
        info!("manager shut down");
    }
}

impl std::fmt::Debug for Mcr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mcr")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}
