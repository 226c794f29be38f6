//! Transient-failure retry with exponential backoff
//!
//! The orchestrator never retries. Callers that want retries wrap their
//! provider in [`RetryingService`] before handing it over.

use crate::generation::{GenerationError, GenerationRequest, GenerationService};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Wraps a service and retries `Transient` failures
pub struct RetryingService {
    inner: Arc<dyn GenerationService>,
    policy: RetryPolicy,
}

impl RetryingService {
    /// Wrap `inner` with `policy`
    pub fn new(inner: Arc<dyn GenerationService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl GenerationService for RetryingService {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut retry = 0;
        loop {
            match self.inner.generate(request).await {
                Err(err) if err.is_transient() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    tracing::warn!(
                        retry,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient generation failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}
