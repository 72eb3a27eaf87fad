//! Quota-enforcing resilient call wrapper.
//!
//! [`RateLimitedClient::call`] executes a caller-supplied async operation
//! under quota control with bounded retries, then degrades to cached or
//! caller-supplied fallback data instead of raising. Its worst case is a
//! tagged [`CallOutcome::Failed`], never an error - callers that only need
//! best-effort data never handle exceptions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{ResponseCache, DEFAULT_TTL};
use crate::errors::{FeedError, RetryClass};
use crate::quota::{QuotaTracker, RateLimitResult};

/// Fixed cooldown applied when the provider's own rate limit trips.
const PROVIDER_COOLDOWN: Duration = Duration::from_secs(60);

/// Exponential backoff base and cap.
const BASE_BACKOFF_MS: u64 = 1_000;
const MAX_BACKOFF_MS: u64 = 30_000;

fn backoff_delay(attempt: u32) -> Duration {
    let exp = attempt.min(5); // 1000 << 5 already exceeds the cap
    Duration::from_millis((BASE_BACKOFF_MS << exp).min(MAX_BACKOFF_MS))
}

/// Options for one wrapped call.
#[derive(Clone, Debug)]
pub struct CallOptions<T> {
    /// Provider to charge the call against
    pub provider: String,
    /// Endpoint, used only to scope the cache key
    pub endpoint: Option<String>,
    /// Retries after the initial attempt (default 3)
    pub max_retries: u32,
    /// Whether the fallback path may serve cached data (default true)
    pub fallback_to_cache: bool,
    /// Caller-supplied default served when no live or cached data exists
    pub fallback_data: Option<T>,
    /// Overall deadline for the call, waits included
    pub deadline: Option<Duration>,
}

impl<T> CallOptions<T> {
    /// Options with defaults: 3 retries, cache fallback on, no deadline.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            endpoint: None,
            max_retries: 3,
            fallback_to_cache: true,
            fallback_data: None,
            deadline: None,
        }
    }

    /// Scope the cache key with an endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the retry budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Disable serving cached data on the fallback path.
    pub fn no_cache_fallback(mut self) -> Self {
        self.fallback_to_cache = false;
        self
    }

    /// Provide default data for the fallback path.
    pub fn fallback_data(mut self, data: T) -> Self {
        self.fallback_data = Some(data);
        self
    }

    /// Bound the whole call, quota waits and backoffs included.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Tagged outcome of a wrapped call.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The operation ran and succeeded
    Fresh {
        data: T,
        /// Quota state observed when the call was admitted
        rate_limit: Option<RateLimitResult>,
    },
    /// Live data was unavailable; an unexpired cache entry was served
    Cached { data: T },
    /// Live and cached data were unavailable; caller-supplied default served
    Fallback { data: T },
    /// Nothing to serve; carries the last error and quota state
    Failed {
        error: String,
        rate_limit: Option<RateLimitResult>,
    },
}

impl<T> CallOutcome<T> {
    /// True unless the outcome is [`Failed`](Self::Failed).
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// True only when cached data was served.
    pub fn from_cache(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }

    /// The carried data, if any.
    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Fresh { data, .. } | Self::Cached { data } | Self::Fallback { data } => {
                Some(data)
            }
            Self::Failed { .. } => None,
        }
    }

    /// Consume the outcome, yielding the carried data.
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Fresh { data, .. } | Self::Cached { data } | Self::Fallback { data } => {
                Some(data)
            }
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Default)]
struct LastFailure {
    error: Option<String>,
    rate_limit: Option<RateLimitResult>,
}

/// Generic rate-limited API client.
///
/// Shares a [`QuotaTracker`] and a [`ResponseCache`] with the rest of the
/// application; construct one at startup and pass it by reference.
pub struct RateLimitedClient {
    quota: Arc<QuotaTracker>,
    cache: Arc<ResponseCache>,
}

impl RateLimitedClient {
    /// Create a client over shared quota and cache state.
    pub fn new(quota: Arc<QuotaTracker>, cache: Arc<ResponseCache>) -> Self {
        Self { quota, cache }
    }

    /// The shared quota tracker.
    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    /// The shared response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Execute `operation` under quota control with bounded retries.
    ///
    /// Attempt loop (`0..=max_retries`):
    /// 1. Ask the quota tracker for a decision. A denial with a known wait
    ///    sleeps and retries - a deferred attempt, not a failure.
    /// 2. A denial with no attempts left (or no wait) exits to the fallback
    ///    path.
    /// 3. An admitted operation that succeeds is written through to the
    ///    cache under `provider:endpoint` and returned as
    ///    [`CallOutcome::Fresh`].
    /// 4. An operation error classified [`RetryClass::Never`] exits to the
    ///    fallback path immediately; one signalling the provider's own rate
    ///    limit sleeps the provider cooldown; anything else sleeps
    ///    exponential backoff.
    ///
    /// The fallback path serves an unexpired cache entry, then
    /// caller-supplied fallback data, then a tagged failure. When
    /// `options.deadline` is set the whole call is bounded by it; a deadline
    /// elapsing mid-wait lands on the fallback path rather than blocking.
    pub async fn call<T, F, Fut>(&self, operation: F, mut options: CallOptions<T>) -> CallOutcome<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let fallback_data = options.fallback_data.take();
        let key = cache_key(&options.provider, options.endpoint.as_deref());

        let attempted = match options.deadline {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.attempt_loop(&operation, &options, &key))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LastFailure {
                        error: Some(format!(
                            "call not allowed: deadline of {:?} elapsed while waiting on '{}'",
                            deadline, options.provider
                        )),
                        rate_limit: None,
                    }),
                }
            }
            None => self.attempt_loop(&operation, &options, &key).await,
        };

        match attempted {
            Ok(outcome) => outcome,
            Err(last) => self.fall_back(&options, &key, fallback_data, last),
        }
    }

    async fn attempt_loop<T, F, Fut>(
        &self,
        operation: &F,
        options: &CallOptions<T>,
        key: &str,
    ) -> Result<CallOutcome<T>, LastFailure>
    where
        T: Serialize,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        let mut last = LastFailure::default();

        for attempt in 0..=options.max_retries {
            let decision = self
                .quota
                .check_and_consume(&options.provider, options.endpoint.as_deref());

            if !decision.allowed {
                match decision.wait {
                    Some(wait) if attempt < options.max_retries => {
                        // Deferred attempt, not a call failure.
                        debug!(
                            "quota denied for '{}', waiting {:?} (attempt {})",
                            options.provider, wait, attempt
                        );
                        last.rate_limit = Some(decision);
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    _ => {
                        last.error = Some(decision.reason.clone());
                        last.rate_limit = Some(decision);
                        break;
                    }
                }
            }

            match operation().await {
                Ok(data) => {
                    // Write-through: every successful call refreshes the cache.
                    match serde_json::to_value(&data) {
                        Ok(value) => self.cache.insert(key, value, DEFAULT_TTL),
                        Err(e) => debug!("response for '{}' is not cacheable: {}", key, e),
                    }
                    return Ok(CallOutcome::Fresh {
                        data,
                        rate_limit: Some(decision),
                    });
                }
                Err(err) => {
                    warn!(
                        "call to '{}' failed on attempt {}: {}",
                        options.provider, attempt, err
                    );
                    let class = err.retry_class();
                    last.error = Some(err.to_string());
                    last.rate_limit = Some(decision);

                    if class == RetryClass::Never {
                        // Terminal error; retrying cannot change the answer.
                        break;
                    }

                    if attempt < options.max_retries {
                        let delay = match class {
                            // The provider itself rate limited us; the local
                            // counters say nothing about when it recovers.
                            RetryClass::Cooldown => PROVIDER_COOLDOWN,
                            _ => backoff_delay(attempt),
                        };
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last)
    }

    fn fall_back<T>(
        &self,
        options: &CallOptions<T>,
        key: &str,
        fallback_data: Option<T>,
        last: LastFailure,
    ) -> CallOutcome<T>
    where
        T: DeserializeOwned,
    {
        if options.fallback_to_cache {
            if let Some(value) = self.cache.get(key) {
                match serde_json::from_value(value) {
                    Ok(data) => {
                        debug!("serving cached data for '{}'", key);
                        return CallOutcome::Cached { data };
                    }
                    Err(e) => warn!("cached data for '{}' failed to deserialize: {}", key, e),
                }
            }
        }

        if let Some(data) = fallback_data {
            debug!("serving fallback data for '{}'", key);
            return CallOutcome::Fallback { data };
        }

        CallOutcome::Failed {
            error: last
                .error
                .unwrap_or_else(|| "call failed with no further diagnostics".to_string()),
            rate_limit: last.rate_limit,
        }
    }
}

fn cache_key(provider: &str, endpoint: Option<&str>) -> String {
    match endpoint {
        Some(endpoint) => format!("{provider}:{endpoint}"),
        None => provider.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quota::{RateLimitConfig, Window};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
    struct Price {
        price: i64,
    }

    fn client_with(config: Option<RateLimitConfig>) -> RateLimitedClient {
        let quota = Arc::new(QuotaTracker::new());
        if let Some(config) = config {
            quota.register(config);
        }
        RateLimitedClient::new(quota, Arc::new(ResponseCache::new()))
    }

    fn unlimited(provider: &str) -> RateLimitConfig {
        RateLimitConfig::new(provider).with_limit(Window::Minute, 0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_success_writes_through_cache() {
        let client = client_with(Some(unlimited("yahoo")));

        let outcome = client
            .call(
                || async { Ok(Price { price: 42 }) },
                CallOptions::<Price>::new("yahoo").endpoint("quote"),
            )
            .await;

        assert!(outcome.is_success());
        assert!(!outcome.from_cache());
        assert_eq!(outcome.data(), Some(&Price { price: 42 }));
        assert!(client.cache().get("yahoo:quote").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_data_after_exact_attempt_count() {
        let client = client_with(Some(unlimited("yahoo")));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let outcome = client
            .call(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<Price, _>(FeedError::ProviderError {
                            provider: "yahoo".to_string(),
                            message: "boom".to_string(),
                        })
                    }
                },
                CallOptions::new("yahoo")
                    .max_retries(2)
                    .fallback_data(Price { price: 1 }),
            )
            .await;

        // 1 initial + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(outcome.is_success());
        assert!(!outcome.from_cache());
        assert!(matches!(outcome, CallOutcome::Fallback { .. }));
        assert_eq!(outcome.into_data(), Some(Price { price: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_operation_falls_back_to_cache() {
        let client = client_with(Some(unlimited("yahoo")));
        let options = || CallOptions::<Price>::new("yahoo").endpoint("quote").max_retries(1);

        let fresh = client
            .call(|| async { Ok(Price { price: 7 }) }, options())
            .await;
        assert!(matches!(fresh, CallOutcome::Fresh { .. }));

        let degraded = client
            .call(
                || async {
                    Err::<Price, _>(FeedError::Timeout {
                        provider: "yahoo".to_string(),
                    })
                },
                options(),
            )
            .await;

        assert!(degraded.from_cache());
        assert_eq!(degraded.into_data(), Some(Price { price: 7 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_error_skips_remaining_retries() {
        let client = client_with(Some(unlimited("yahoo")));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let outcome = client
            .call(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<Price, _>(FeedError::SymbolNotFound("INVALID".to_string()))
                    }
                },
                CallOptions::new("yahoo").fallback_data(Price { price: 0 }),
            )
            .await;

        // Retrying cannot make the symbol exist; one attempt, then fallback.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, CallOutcome::Fallback { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_rate_limit_applies_cooldown() {
        let client = client_with(Some(unlimited("yahoo")));
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let started = tokio::time::Instant::now();
        let outcome = client
            .call(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Err::<Price, _>(FeedError::RateLimited {
                            provider: "yahoo".to_string(),
                        })
                    }
                },
                CallOptions::new("yahoo").max_retries(1).no_cache_fallback(),
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!outcome.is_success());
        // One full 60s provider cooldown between the two attempts.
        assert!(started.elapsed() >= PROVIDER_COOLDOWN);
    }

    // Real time on purpose: the quota clock is wall time, so a paused tokio
    // clock would never reach the window reset. A second-sized window keeps
    // the wait short.
    #[tokio::test]
    async fn test_quota_denial_with_wait_defers_and_retries() {
        let client = client_with(Some(
            RateLimitConfig::new("yahoo").with_limit(Window::Second, 1),
        ));

        // Consume the only slot.
        let first = client
            .call(
                || async { Ok(Price { price: 1 }) },
                CallOptions::<Price>::new("yahoo").no_cache_fallback(),
            )
            .await;
        assert!(matches!(first, CallOutcome::Fresh { .. }));

        // The second call waits out the second-window, then succeeds.
        let second = client
            .call(
                || async { Ok(Price { price: 2 }) },
                CallOptions::<Price>::new("yahoo").no_cache_fallback(),
            )
            .await;

        assert!(matches!(second, CallOutcome::Fresh { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quota_denial_without_retries_fails_with_reason() {
        let client = client_with(Some(
            RateLimitConfig::new("yahoo").with_limit(Window::Minute, 1),
        ));

        let first = client
            .call(
                || async { Ok(Price { price: 1 }) },
                CallOptions::<Price>::new("yahoo").no_cache_fallback(),
            )
            .await;
        assert!(first.is_success());

        let denied = client
            .call(
                || async { Ok(Price { price: 2 }) },
                CallOptions::<Price>::new("yahoo")
                    .max_retries(0)
                    .no_cache_fallback(),
            )
            .await;

        match denied {
            CallOutcome::Failed { error, rate_limit } => {
                assert!(error.contains("perMinute"));
                assert!(rate_limit.is_some());
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_provider_goes_straight_to_fallback() {
        let client = client_with(None);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let outcome = client
            .call(
                move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(Price { price: 9 })
                    }
                },
                CallOptions::new("mystery").fallback_data(Price { price: 0 }),
            )
            .await;

        // The operation never ran; an unconfigured deny has no wait path.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(outcome, CallOutcome::Fallback { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_quota_waits() {
        let client = client_with(Some(
            RateLimitConfig::new("yahoo").with_limit(Window::Minute, 1),
        ));

        let first = client
            .call(
                || async { Ok(Price { price: 1 }) },
                CallOptions::<Price>::new("yahoo").no_cache_fallback(),
            )
            .await;
        assert!(first.is_success());

        // The minute window forces a ~60s wait; a 5s deadline cuts it short.
        let denied = client
            .call(
                || async { Ok(Price { price: 2 }) },
                CallOptions::<Price>::new("yahoo")
                    .deadline(Duration::from_secs(5))
                    .no_cache_fallback(),
            )
            .await;

        match denied {
            CallOutcome::Failed { error, .. } => {
                assert!(error.contains("not allowed"));
                assert!(error.contains("deadline"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_backoff_delay_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(4), Duration::from_millis(16_000));
        // Capped.
        assert_eq!(backoff_delay(5), Duration::from_millis(30_000));
        assert_eq!(backoff_delay(12), Duration::from_millis(30_000));
    }
}
