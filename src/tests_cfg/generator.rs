use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::ai::{Generation, GenerationError, GenerationService};

type Responder = Box<dyn Fn(&str) -> Result<String, GenerationError> + Send + Sync>;

enum Script {
    Queue(Mutex<VecDeque<Result<String, GenerationError>>>),
    Repeat(Result<String, GenerationError>),
    Respond(Responder),
}

/// Generation service that replays canned responses and records prompts.
pub struct ScriptedGenerator {
    script: Script,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl ScriptedGenerator {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }

    /// Answers with `responses` in order, then fails with a provider error.
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|text| Ok(text.into())))
    }

    #[must_use]
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = Result<String, GenerationError>>,
    {
        Self::with_script(Script::Queue(Mutex::new(results.into_iter().collect())))
    }

    /// Answers every prompt with `text`.
    #[must_use]
    pub fn repeating(text: impl Into<String>) -> Self {
        Self::with_script(Script::Repeat(Ok(text.into())))
    }

    /// Fails every call with `error`.
    #[must_use]
    pub fn failing(error: GenerationError) -> Self {
        Self::with_script(Script::Repeat(Err(error)))
    }

    /// Answers by calling `respond` with the prompt.
    #[must_use]
    pub fn from_fn<F>(respond: F) -> Self
    where
        F: Fn(&str) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self::with_script(Script::Respond(Box::new(respond)))
    }

    /// Waits `delay` before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Reports the given token usage on every answer.
    #[must_use]
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next(&self, prompt: &str) -> Result<String, GenerationError> {
        match &self.script {
            Script::Queue(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Provider("script exhausted".to_string()))),
            Script::Repeat(result) => result.clone(),
            Script::Respond(respond) => respond(prompt),
        }
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = self.next(prompt)?;
        Ok(Generation {
            text,
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            latency: self.delay.unwrap_or(Duration::from_millis(1)),
        })
    }
}
