use maestro_core::MaestroError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Upper bound of the random jitter, as a fraction of the computed delay.
const MAX_JITTER_FRACTION: f64 = 0.3;

/// Exponential backoff settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Cap applied before jitter.
    pub max_delay_ms: u64,
    /// Growth factor per attempt.
    pub exponential_base: f64,
    /// Add up to 30% random delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the failed `attempt` (0-based), without
    /// jitter: `min(max_delay, base_delay * exponential_base ^ attempt)`.
    pub fn base_backoff(&self, attempt: u32) -> Duration {
        let factor = self.exponential_base.powi(attempt.min(i32::MAX as u32) as i32);
        let delay = (self.base_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(delay.max(0.0) as u64)
    }

    /// [`base_backoff`](Self::base_backoff) plus jitter when enabled.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=MAX_JITTER_FRACTION);
        base + base.mul_f64(extra)
    }
}

/// Bookkeeping for one retried operation.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// The attempt that just failed, 0-based.
    pub attempt: u32,
    /// Configured retry budget.
    pub max_retries: u32,
    /// When the first attempt started.
    pub start_time: Instant,
    /// Error of the attempt that just failed.
    pub last_error: Option<String>,
}

impl RetryState {
    fn new(max_retries: u32) -> Self {
        Self {
            attempt: 0,
            max_retries,
            start_time: Instant::now(),
            last_error: None,
        }
    }

    /// Time since the first attempt.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Runs fallible async operations with exponential backoff.
///
/// Knows nothing about what the operation does; callers decide what to
/// mutate on final failure.
pub struct RetryManager {
    policy: RetryPolicy,
    /// Injectable sleep function for testing (allows skipping real delays).
    #[cfg(test)]
    sleep_fn: Option<SleepFn>,
}

/// Type alias for the injectable sleep function used in tests.
#[cfg(test)]
type SleepFn = Box<
    dyn Fn(Duration) -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync,
>;

impl RetryManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            #[cfg(test)]
            sleep_fn: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn do_sleep(&self, delay: Duration) {
        #[cfg(test)]
        if let Some(ref f) = self.sleep_fn {
            f(delay).await;
            return;
        }
        tokio::time::sleep(delay).await;
    }

    /// Retry `op` on every error.
    pub async fn retry_with_backoff<T, E, F, Fut>(&self, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.retry_with_backoff_if(op, |_| true, |_| {}).await
    }

    /// Retry `op` while `should_retry` accepts the error.
    ///
    /// `on_retry` sees the state of the failed attempt before the backoff
    /// sleep. The last error is returned unchanged.
    pub async fn retry_with_backoff_if<T, E, F, Fut, P, O>(
        &self,
        mut op: F,
        should_retry: P,
        mut on_retry: O,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
        O: FnMut(&RetryState),
    {
        let mut state = RetryState::new(self.policy.max_retries);
        loop {
            match op().await {
                Ok(value) => {
                    if state.attempt > 0 {
                        info!(attempts = state.attempt + 1, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    state.last_error = Some(e.to_string());
                    if state.attempt >= self.policy.max_retries || !should_retry(&e) {
                        warn!(
                            attempt = state.attempt,
                            elapsed_ms = state.elapsed().as_millis() as u64,
                            error = %e,
                            "Giving up"
                        );
                        return Err(e);
                    }
                    let delay = self.policy.backoff(state.attempt);
                    info!(
                        attempt = state.attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retryable error, backing off"
                    );
                    on_retry(&state);
                    self.do_sleep(delay).await;
                    state.attempt += 1;
                }
            }
        }
    }
}

/// Whether a model or transport error is transient.
///
/// Rate limits, timeouts and server errors are retryable; client errors are
/// not.
pub fn is_retryable(err: &MaestroError) -> bool {
    if !matches!(
        err,
        MaestroError::Http(_) | MaestroError::Model(_) | MaestroError::Dispatch(_)
    ) {
        return false;
    }
    let lower = err.to_string().to_lowercase();

    if lower.contains("400") || lower.contains("401") || lower.contains("403") {
        return false;
    }

    lower.contains("429")
        || lower.contains("rate limit")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("connection")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn instant(policy: RetryPolicy) -> RetryManager {
        RetryManager {
            policy,
            sleep_fn: Some(Box::new(|_| Box::pin(async {}))),
        }
    }

    fn no_jitter(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            exponential_base: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let p = no_jitter(10);
        assert_eq!(p.backoff(0), Duration::from_millis(100));
        assert_eq!(p.backoff(1), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(800));
        assert_eq!(p.backoff(4), Duration::from_millis(1_000));
        assert_eq!(p.backoff(30), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_thirty_percent() {
        let p = RetryPolicy {
            jitter: true,
            ..no_jitter(3)
        };
        for _ in 0..200 {
            let d = p.backoff(1).as_millis();
            assert!((200..=260).contains(&d), "delay {d} out of range");
        }
    }

    #[tokio::test]
    async fn max_retries_two_means_three_attempts_and_original_error() {
        let calls = AtomicU32::new(0);
        let manager = instant(no_jitter(2));

        let result: Result<(), MaestroError> = manager
            .retry_with_backoff(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(MaestroError::Http("503 Service Unavailable".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            MaestroError::Http(msg) => assert_eq!(msg, "503 Service Unavailable"),
            other => panic!("Expected original Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_try() {
        let calls = AtomicU32::new(0);
        let manager = instant(no_jitter(3));

        let result = manager
            .retry_with_backoff(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(MaestroError::Http("429 Too Many Requests".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_returns_immediately() {
        let calls = AtomicU32::new(0);
        let manager = instant(no_jitter(5));

        let result: Result<(), MaestroError> = manager
            .retry_with_backoff_if(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(MaestroError::Model("400 Bad Request".into())) }
                },
                is_retryable,
                |_| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn observer_and_sleeps_see_each_backoff() {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let slept_clone = slept.clone();
        let manager = RetryManager {
            policy: no_jitter(3),
            sleep_fn: Some(Box::new(move |d| {
                slept_clone.lock().unwrap().push(d);
                Box::pin(async {})
            })),
        };
        let mut seen = Vec::new();

        let _: Result<(), String> = manager
            .retry_with_backoff_if(
                || async { Err("down".to_string()) },
                |_| true,
                |state| seen.push((state.attempt, state.last_error.clone())),
            )
            .await;

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], (2, Some("down".to_string())));
        assert_eq!(
            *slept.lock().unwrap(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400)
            ]
        );
    }

    #[test]
    fn classifies_errors() {
        assert!(is_retryable(&MaestroError::Http("429 Too Many Requests".into())));
        assert!(is_retryable(&MaestroError::Model("upstream 502".into())));
        assert!(is_retryable(&MaestroError::Http("request timed out".into())));
        assert!(!is_retryable(&MaestroError::Http("400 Bad Request".into())));
        assert!(!is_retryable(&MaestroError::Config("500".into())));
    }
}
