//! Generation usage accounting.
//!
//! Every generation call is recorded twice: once on the session's counters and
//! once on the manager's global counters. The global totals are therefore the
//! sum of every session's contributions and are never recomputed.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::{Generation, GenerationError, GenerationService};

/// Point in time copy of usage counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_latency_ms: u64,
}

impl UsageMetrics {
    #[must_use]
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    #[must_use]
    pub fn total_latency(&self) -> Duration {
        Duration::from_millis(self.total_latency_ms)
    }
}

impl std::ops::Add for UsageMetrics {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            calls: self.calls + other.calls,
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_latency_ms: self.total_latency_ms + other.total_latency_ms,
        }
    }
}

/// Lock-free usage counters.
#[derive(Debug, Default)]
pub struct UsageCounters {
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl UsageCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, generation: &Generation) {
        let latency_ms = u64::try_from(generation.latency.as_millis()).unwrap_or(u64::MAX);
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(generation.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(generation.completion_tokens, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> UsageMetrics {
        UsageMetrics {
            calls: self.calls.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::Relaxed),
        }
    }
}

/// Records each generation on a session's counters and the global counters.
#[derive(Clone, Debug)]
pub struct UsageTracker {
    session: Arc<UsageCounters>,
    global: Arc<UsageCounters>,
}

impl UsageTracker {
    #[must_use]
    pub fn new(global: Arc<UsageCounters>) -> Self {
        Self {
            session: Arc::new(UsageCounters::new()),
            global,
        }
    }

    pub fn record(&self, generation: &Generation) {
        self.session.record(generation);
        self.global.record(generation);
    }

    #[must_use]
    pub fn session(&self) -> UsageMetrics {
        self.session.snapshot()
    }

    #[must_use]
    pub fn global(&self) -> UsageMetrics {
        self.global.snapshot()
    }
}

/// Wraps a generation service so every successful call is recorded.
pub struct MeteredGenerator {
    inner: Arc<dyn GenerationService>,
    tracker: UsageTracker,
}

impl MeteredGenerator {
    #[must_use]
    pub fn new(inner: Arc<dyn GenerationService>, tracker: UsageTracker) -> Self {
        Self { inner, tracker }
    }
}

#[async_trait]
impl GenerationService for MeteredGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let generation = self.inner.generate(prompt).await?;
        self.tracker.record(&generation);
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generation(prompt_tokens: u64, completion_tokens: u64, latency_ms: u64) -> Generation {
        Generation {
            text: String::new(),
            prompt_tokens,
            completion_tokens,
            latency: Duration::from_millis(latency_ms),
        }
    }

    #[test]
    fn global_counters_sum_sessions() {
        let global = Arc::new(UsageCounters::new());
        let first = UsageTracker::new(Arc::clone(&global));
        let second = UsageTracker::new(Arc::clone(&global));

        first.record(&generation(10, 5, 100));
        second.record(&generation(3, 2, 40));
        second.record(&generation(1, 1, 10));

        assert_eq!(first.session().calls, 1);
        assert_eq!(second.session().calls, 2);
        assert_eq!(global.snapshot(), first.session() + second.session());
        assert_eq!(global.snapshot().total_tokens(), 22);
        assert_eq!(global.snapshot().total_latency(), Duration::from_millis(150));
    }
}
