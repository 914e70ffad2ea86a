//! Resilient LLM client wrapper with exponential-backoff retry.
//!
//! Wraps any `LlmClient` port implementation with a `TransientUpstream`
//! retry policy: capped exponential backoff with jitter, skipping retry
//! for auth and bad-request failures.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::config::RetryConfig;
use crate::ports::{CompletionParams, LlmClient, LlmError};

pub struct ResilientLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl ResilientLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn calculate_delay(&self, attempt: u32) -> u64 {
        let base = self.config.base_delay_ms;
        let exponential = base.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exponential.min(self.config.max_delay_ms);

        let jitter_range = (capped as f64 * self.config.jitter_factor) as i64;
        if jitter_range > 0 {
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped as i64 + jitter).max(0) as u64
        } else {
            capped
        }
    }

    /// Non-retryable: auth and bad-request failures. Everything else
    /// (network hiccups, malformed-but-probably-transient responses) is
    /// retried.
    fn is_retryable(error: &LlmError) -> bool {
        match error {
            LlmError::RequestFailed(msg) => {
                !msg.contains("401") && !msg.contains("403") && !msg.contains("400") && !msg.contains("Invalid")
            }
            LlmError::InvalidResponse(_) => true,
        }
    }

    async fn execute_with_retry<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LlmError>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(attempt = attempt + 1, operation = operation_name, "LLM request succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let retryable = Self::is_retryable(&e);
                    if attempt < self.config.max_retries && retryable {
                        let delay = self.calculate_delay(attempt + 1);
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_retries = self.config.max_retries,
                            delay_ms = delay,
                            error = %e,
                            operation = operation_name,
                            "LLM request failed, retrying"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    } else if !retryable {
                        tracing::error!(error = %e, operation = operation_name, "LLM request failed with non-retryable error");
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| LlmError::RequestFailed("unknown error".to_string()));
        tracing::error!(attempts = self.config.max_retries + 1, error = %error, operation = operation_name, "LLM request failed after all retry attempts");
        Err(error)
    }
}

#[async_trait]
impl LlmClient for ResilientLlmClient {
    async fn complete(&self, prompt: String, params: CompletionParams) -> Result<String, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete", || {
            let inner = Arc::clone(&inner);
            let prompt = prompt.clone();
            let params = params.clone();
            async move { inner.complete(prompt, params).await }
        })
        .await
    }

    async fn complete_structured(
        &self,
        prompt: String,
        schema: serde_json::Value,
        params: CompletionParams,
    ) -> Result<serde_json::Value, LlmError> {
        let inner = Arc::clone(&self.inner);
        self.execute_with_retry("complete_structured", || {
            let inner = Arc::clone(&inner);
            let prompt = prompt.clone();
            let schema = schema.clone();
            let params = params.clone();
            async move { inner.complete_structured(prompt, schema, params).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingMockLlm {
        failures_remaining: AtomicU32,
        error: LlmError,
    }

    impl FailingMockLlm {
        fn new(failure_count: u32, error: LlmError) -> Self {
            Self {
                failures_remaining: AtomicU32::new(failure_count),
                error,
            }
        }
    }

    #[async_trait]
    impl LlmClient for FailingMockLlm {
        async fn complete(&self, _prompt: String, _params: CompletionParams) -> Result<String, LlmError> {
            let remaining = self.failures_remaining.fetch_sub(1, Ordering::SeqCst);
            if remaining > 0 {
                Err(self.error.clone())
            } else {
                Ok("success".to_string())
            }
        }

        async fn complete_structured(
            &self,
            prompt: String,
            _schema: serde_json::Value,
            params: CompletionParams,
        ) -> Result<serde_json::Value, LlmError> {
            self.complete(prompt, params).await.map(serde_json::Value::String)
        }
    }

    #[tokio::test]
    async fn succeeds_after_retry() {
        let mock = Arc::new(FailingMockLlm::new(2, LlmError::RequestFailed("transient".into())));
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        };
        let client = ResilientLlmClient::new(mock, config);
        let result = client.complete("hi".into(), CompletionParams::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn does_not_retry_auth_errors() {
        let mock = Arc::new(FailingMockLlm::new(10, LlmError::RequestFailed("401 Unauthorized".into())));
        let mock_ref = Arc::clone(&mock);
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 10,
            jitter_factor: 0.0,
        };
        let client = ResilientLlmClient::new(mock, config);
        let result = client.complete("hi".into(), CompletionParams::default()).await;
        assert!(result.is_err());
        assert_eq!(mock_ref.failures_remaining.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn exponential_backoff_caps_at_max_delay() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_factor: 0.0,
        };
        let client = ResilientLlmClient::new(
            Arc::new(FailingMockLlm::new(0, LlmError::RequestFailed(String::new()))),
            config,
        );
        assert_eq!(client.calculate_delay(1), 1000);
        assert_eq!(client.calculate_delay(2), 2000);
        assert_eq!(client.calculate_delay(6), 30_000);
    }
}
