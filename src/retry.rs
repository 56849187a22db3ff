//! Bounded retry with exponential backoff, applied as a client decorator.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use crate::embedder::{Embedder, EmbeddingVector};
use crate::error::{EmbeddingError, GenerationError, IndexError, Transient};
use crate::questions::QuestionModel;
use crate::vector_store::{IndexRecord, QueryMatch, VectorIndex};

/// Attempts made per remote call unless configured otherwise.
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

const MAX_BACKOFF_EXPONENT: u32 = 5;

/// How many times to try a call and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// Builds a policy; `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt, no retries.
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts per call.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_EXPONENT);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Runs `call` until it succeeds, fails permanently, or attempts run out.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        E: Transient + Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1usize;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps a client so each remote call goes through a [`RetryPolicy`].
///
/// Upserts are retried per batch; upsert-by-id makes a repeated batch harmless.
#[derive(Debug, Clone)]
pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> Retrying<T> {
    /// Decorates `inner` with `policy`.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The policy applied to every call.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl<T: Embedder> Embedder for Retrying<T> {
    async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        self.policy.run("embed", || self.inner.embed(text)).await
    }

    fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }
}

#[async_trait]
impl<T: VectorIndex> VectorIndex for Retrying<T> {
    async fn upsert_batch(&self, records: &[IndexRecord]) -> Result<(), IndexError> {
        self.policy
            .run("upsert", || self.inner.upsert_batch(records))
            .await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>, IndexError> {
        self.policy
            .run("query", || self.inner.query(vector, top_k, include_metadata))
            .await
    }
}

#[async_trait]
impl<T: QuestionModel> QuestionModel for Retrying<T> {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        self.policy
            .run("complete", || self.inner.complete(prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        error: fn() -> EmbeddingError,
    }

    impl Flaky {
        fn new(failures: usize, error: fn() -> EmbeddingError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                error,
            }
        }
    }

    #[async_trait]
    impl Embedder for Flaky {
        async fn embed(&self, _text: &str) -> Result<EmbeddingVector, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(vec![1.0, 2.0])
            }
        }
    }

    fn rate_limited() -> EmbeddingError {
        EmbeddingError::Api {
            status: 429,
            body: "slow down".into(),
        }
    }

    fn unauthorized() -> EmbeddingError {
        EmbeddingError::Api {
            status: 401,
            body: "bad key".into(),
        }
    }

    fn instant(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn recovers_from_transient_failures() {
        let client = Retrying::new(Flaky::new(2, rate_limited), instant(3));
        assert_eq!(client.embed("x").await.unwrap(), vec![1.0, 2.0]);
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let client = Retrying::new(Flaky::new(10, rate_limited), instant(3));
        let err = client.embed("x").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status: 429, .. }));
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let client = Retrying::new(Flaky::new(10, unauthorized), instant(3));
        assert!(client.embed("x").await.is_err());
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_policy_tries_once() {
        let client = Retrying::new(Flaky::new(1, rate_limited), RetryPolicy::disabled());
        assert!(client.embed("x").await.is_err());
        assert_eq!(client.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(9), Duration::from_millis(3200));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }
}
