//! Prioritized failover across generation backends.
//!
//! Each backend gets a bounded number of attempts, every attempt is wrapped
//! in a timeout, and retryable failures back off exponentially with jitter
//! before the next attempt. A backend that fails for good hands over to the
//! next one in priority order.

use crate::{Error, GenerationOptions, TextGenerator};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries per backend (0 = a single attempt).
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap on the exponential delay.
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0) applied around each delay.
    pub jitter_factor: f64,
    /// Upper bound on a single attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            jitter_factor: 0.2,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.max_delay.as_millis() as u64);

        let jitter_range = (capped as f64 * self.jitter_factor) as i64;
        let millis = if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        };
        Duration::from_millis(millis)
    }
}

/// Walks a prioritized list of backends until one produces text.
pub struct FailoverClient {
    backends: Vec<Arc<dyn TextGenerator>>,
    config: RetryConfig,
}

impl FailoverClient {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            backends: Vec::new(),
            config,
        }
    }

    /// Append a backend at the lowest priority so far.
    pub fn with_backend(mut self, backend: Arc<dyn TextGenerator>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    async fn attempt(
        &self,
        backend: &dyn TextGenerator,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, Error> {
        match tokio::time::timeout(self.config.attempt_timeout, backend.generate(prompt, options))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.config.attempt_timeout)),
        }
    }

    async fn try_backend(
        &self,
        backend: &dyn TextGenerator,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, Error> {
        let mut attempt = 0;
        loop {
            match self.attempt(backend, prompt, options).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!(
                            backend = backend.name(),
                            attempt = attempt + 1,
                            "Generation succeeded after retry"
                        );
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.delay_for(attempt);
                    tracing::warn!(
                        backend = backend.name(),
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl TextGenerator for FailoverClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String, Error> {
        if self.backends.is_empty() {
            return Err(Error::NoBackends);
        }

        let mut failures = Vec::new();
        for backend in &self.backends {
            match self.try_backend(backend.as_ref(), prompt, options).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(backend = backend.name(), error = %e, "Backend failed, trying next");
                    failures.push(format!("{}: {e}", backend.name()));
                }
            }
        }

        tracing::error!(backends = failures.len(), "All generation backends failed");
        Err(Error::Exhausted(failures))
    }

    fn name(&self) -> &str {
        "failover"
    }
}
