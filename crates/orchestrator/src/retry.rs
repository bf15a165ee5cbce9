//! Retry executor: drives one backend through bounded attempts with
//! exponential backoff.
//!
//! Each attempt runs under the backend's per-call timeout. Permanent
//! failures abort at once; retryable ones back off and try again until the
//! backend's `max_retries` is spent. A cancellation token aborts both the
//! in-flight call and the backoff sleep.

use std::time::Duration;

use helix_core::backend::Backend;
use helix_core::error::ProviderError;
use helix_core::provider::{ProviderRequest, ProviderResponse};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Doubling stops past this exponent so delays cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("request has no prompt")]
    InvalidRequest,

    #[error("backend '{backend}' rejected the request (attempt {attempts}): {source}")]
    Permanent {
        backend: String,
        attempts: u32,
        source: ProviderError,
    },

    #[error("backend '{backend}' failed after {attempts} attempts: {source}")]
    Exhausted {
        backend: String,
        attempts: u32,
        source: ProviderError,
    },

    #[error("call to backend '{backend}' was cancelled")]
    Cancelled { backend: String },
}

impl RetryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Number of calls actually made to the backend.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
            Self::InvalidRequest | Self::Cancelled { .. } => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryExecutor {
    backoff_base: Duration,
}

impl RetryExecutor {
    pub fn new(backoff_base: Duration) -> Self {
        Self { backoff_base }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_EXPONENT))
    }

    pub async fn call(
        &self,
        backend: &Backend,
        request: ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderResponse, RetryError> {
        if !request.is_well_formed() {
            return Err(RetryError::InvalidRequest);
        }

        let name = backend.name();
        let max_retries = backend.descriptor.max_retries.max(1);
        let timeout = backend.descriptor.timeout;
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled {
                    backend: name.to_string(),
                });
            }

            debug!(backend = %name, attempt, max_retries, "Calling backend");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    info!(backend = %name, attempt, "Backend call cancelled");
                    return Err(RetryError::Cancelled { backend: name.to_string() });
                }
                outcome = tokio::time::timeout(timeout, backend.provider.send(request.clone())) => outcome,
            };

            let error = match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(e)) => e,
                Err(_) => ProviderError::Timeout(format!(
                    "backend '{}' did not answer within {}s",
                    name,
                    timeout.as_secs()
                )),
            };

            if error.is_permanent() {
                warn!(backend = %name, attempt, error = %error, "Permanent failure, not retrying");
                return Err(RetryError::Permanent {
                    backend: name.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            if attempt >= max_retries {
                warn!(backend = %name, attempts = attempt, error = %error, "Retries exhausted");
                return Err(RetryError::Exhausted {
                    backend: name.to_string(),
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.delay_for(attempt);
            info!(
                backend = %name,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable failure, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(backend = %name, attempt, "Backoff cancelled");
                    return Err(RetryError::Cancelled { backend: name.to_string() });
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helix_core::backend::BackendDescriptor;
    use helix_core::message::Message;
    use helix_core::provider::Provider;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    /// Replays a fixed script of results, then keeps failing with 503.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<&'static str, ProviderError>>>,
        call_count: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<&'static str, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            *self.call_count.lock().unwrap() += 1;
            let next = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(ProviderError::ApiError {
                    status_code: 503,
                    message: "unavailable".into(),
                })
            });
            next.map(|text| ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: "test-model".into(),
            })
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(ProviderError::Network("unreachable".into()))
        }
    }

    fn backend(provider: Arc<dyn Provider>, max_retries: u32) -> Backend {
        Backend::new(
            BackendDescriptor::new("primary", 1)
                .with_max_retries(max_retries)
                .with_timeout(Duration::from_secs(10)),
            "test-model",
            provider,
        )
    }

    fn request(prompt: &str) -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            messages: vec![Message::user(prompt)],
            temperature: 0.7,
            max_tokens: Some(256),
        }
    }

    fn server_error() -> ProviderError {
        ProviderError::ApiError {
            status_code: 500,
            message: "Internal Server Error".into(),
        }
    }

    #[test]
    fn backoff_doubles() {
        let exec = RetryExecutor::new(Duration::from_millis(100));
        assert_eq!(exec.delay_for(1), Duration::from_millis(200));
        assert_eq!(exec.delay_for(2), Duration::from_millis(400));
        assert_eq!(exec.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn backoff_saturates() {
        let exec = RetryExecutor::new(Duration::from_secs(1));
        assert_eq!(exec.delay_for(100), exec.delay_for(MAX_BACKOFF_EXPONENT));
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("answer")]));
        let backend = backend(provider.clone(), 3);

        let response = RetryExecutor::default()
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.message.content, "answer");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::InvalidRequest("malformed".into()),
        )]));
        let backend = backend(provider.clone(), 5);

        let err = RetryExecutor::default()
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Permanent { attempts: 1, .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn content_rejection_is_permanent() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::ContentRejected("policy".into()),
        )]));
        let backend = backend(provider.clone(), 3);

        let err = RetryExecutor::default()
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::Permanent { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_final_allowed_attempt() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(server_error()),
            Err(ProviderError::Timeout("slow".into())),
            Ok("finally"),
        ]));
        let backend = backend(provider.clone(), 3);

        let response = RetryExecutor::default()
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.message.content, "finally");
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_retries_with_backoff() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let backend = backend(provider.clone(), 3);
        let start = Instant::now();

        let err = RetryExecutor::new(Duration::from_secs(1))
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(err.attempts(), 3);
        assert_eq!(provider.calls(), 3);
        // 2s after the first failure, 4s after the second, none after the last.
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(6));
        assert!(waited < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_is_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::RateLimited { retry_after_secs: 1 }),
            Ok("ok"),
        ]));
        let backend = backend(provider.clone(), 2);

        let result = RetryExecutor::default()
            .call(&backend, request("hi"), &CancellationToken::new())
            .await;
        assert!(result.is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_timeout_is_retryable() {
        let backend = backend(Arc::new(HangingProvider), 2);

        let err = RetryExecutor::new(Duration::from_millis(10))
            .call(&backend, request("hi"), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            RetryError::Exhausted { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(source, ProviderError::Timeout(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_in_flight_call() {
        let backend = backend(Arc::new(HangingProvider), 3);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = RetryExecutor::default()
            .call(&backend, request("hi"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_backoff() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let backend = backend(provider.clone(), 5);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            trigger.cancel();
        });

        let err = RetryExecutor::new(Duration::from_secs(10))
            .call(&backend, request("hi"), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn blank_prompt_never_reaches_backend() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok("unused")]));
        let backend = backend(provider.clone(), 3);

        let err = RetryExecutor::default()
            .call(&backend, request("   "), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RetryError::InvalidRequest));
        assert_eq!(provider.calls(), 0);
    }
}
