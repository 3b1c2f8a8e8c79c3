//! Bounded retry with exponential backoff.
//!
//! [`RetryProvider`] wraps any provider and retries transient failures
//! (network errors, timeouts, HTTP 429 and 5xx). Each attempt gets its own
//! timeout, so one hung request cannot eat the whole budget.

use async_trait::async_trait;
use replyline_core::error::ProviderError;
use replyline_core::provider::{Provider, ProviderRequest, ProviderResponse};
use std::time::Duration;
use tracing::{debug, warn};

/// Retry behaviour.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first (default: 2, i.e. 3 attempts).
    pub max_retries: u32,
    /// Delay before the first retry; doubled on every subsequent one.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
    /// Per-attempt timeout. `None` leaves timing to the inner provider.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Backoff before retry number `attempt` (0-indexed): `base * 2^attempt`,
/// capped at `max_delay`.
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    config
        .base_delay
        .saturating_mul(factor)
        .min(config.max_delay)
}

/// A provider wrapper that retries transient failures.
pub struct RetryProvider<P> {
    inner: P,
    config: RetryConfig,
}

impl<P: Provider> RetryProvider<P> {
    pub fn new(inner: P, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.config
    }

    async fn attempt(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        match self.config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.inner.complete(request))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::Timeout(format!(
                        "no reply within {}ms",
                        limit.as_millis()
                    )))
                }),
            None => self.inner.complete(request).await,
        }
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(
                            provider = %self.inner.name(),
                            model = %request.model,
                            attempt,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let computed = compute_delay(&self.config, attempt);
                    let delay = match &err {
                        ProviderError::RateLimited { retry_after_secs } => {
                            computed.max(Duration::from_secs(*retry_after_secs))
                        }
                        _ => computed,
                    };

                    warn!(
                        provider = %self.inner.name(),
                        model = %request.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
