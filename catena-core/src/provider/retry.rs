//! Retry policy for provider transports
//!
//! Retries live outside the adapters and chains: [`RetryingClient`] wraps
//! any [`ProviderClient`] and retries transient failures with exponential
//! backoff. Decode errors and cancellation are never retried.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::client::{ChunkStream, ProviderClient};
use crate::error::Result;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Randomize delays by up to 25%
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    fn schedule(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(self.backoff_multiplier)
            .with_randomization_factor(if self.add_jitter { 0.25 } else { 0.0 })
            .with_max_elapsed_time(None)
            .build()
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0usize;

    backoff::future::retry(config.schedule(), || {
        attempt += 1;
        let current = attempt;
        let fut = operation();
        async move {
            fut.await.map_err(|e| {
                if current < max_attempts && e.is_retryable() {
                    tracing::debug!(attempt = current, error = %e, "Retrying provider call");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        }
    })
    .await
}

/// [`ProviderClient`] decorator that retries transient failures
pub struct RetryingClient {
    inner: Arc<dyn ProviderClient>,
    config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ProviderClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl ProviderClient for RetryingClient {
    async fn invoke(&self, request: Vec<u8>) -> Result<Vec<u8>> {
        with_retry(&self.config, || self.inner.invoke(request.clone())).await
    }

    /// Only establishing the stream is retried; a stream that fails midway
    /// surfaces its error to the consumer.
    async fn invoke_streaming(&self, request: Vec<u8>) -> Result<ChunkStream> {
        with_retry(&self.config, || self.inner.invoke_streaming(request.clone())).await
    }
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("config", &self.config)
            .finish()
    }
}
