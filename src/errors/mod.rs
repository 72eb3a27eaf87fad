//! Error types and retry classification for the freedata crate.
//!
//! This module provides:
//! - [`FeedError`]: The main error enum for all data-fetching operations
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching market data.
///
/// Each variant is classified into a [`RetryClass`] via the
/// [`retry_class`](Self::retry_class) method, which determines how the call
/// wrapper and the aggregator handle the error. Only
/// [`AllSourcesExhausted`](Self::AllSourcesExhausted) and
/// [`Unconfigured`](Self::Unconfigured) are expected to reach callers;
/// everything else is recovered locally by waiting, retrying, or failing
/// over to the next source.
#[derive(Error, Debug)]
pub enum FeedError {
    /// A local quota window has no budget left.
    /// Recoverable by waiting for the window to reset or failing over.
    ///
    /// Adapter-facing: the tracker itself reports denials as
    /// [`RateLimitResult`](crate::quota::RateLimitResult) values, not
    /// errors. This variant exists for adapters that surface a quota
    /// condition as an error.
    #[error("quota exceeded for '{provider}' ({window} window)")]
    QuotaExceeded {
        /// The provider whose budget is exhausted
        provider: String,
        /// Human name of the binding window (e.g. "perMinute")
        window: String,
        /// Time until the binding window resets, when known
        wait: Option<Duration>,
    },

    /// The provider's own rate limiter rejected the request (HTTP 429).
    /// Retried after a fixed cooldown.
    #[error("rate limited by provider: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// A provider-specific error occurred.
    /// Retried with backoff, then treated as a source failure.
    #[error("provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The request to the provider timed out.
    #[error("timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A provider or source with no registered configuration was used.
    /// Treated as an immediate deny; logged once, never retried.
    ///
    /// Adapter-facing: the tracker reports unconfigured providers through
    /// a denied [`RateLimitResult`](crate::quota::RateLimitResult); this
    /// variant lets adapters raise the same condition as an error.
    #[error("no configuration registered for '{0}'")]
    Unconfigured(String),

    /// The requested symbol was not found by the provider.
    /// Terminal for that symbol - retrying won't help.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),

    /// Every admissible source failed or was unavailable.
    /// The only aggregator error surfaced to callers of single-result
    /// operations; carries the symbol and attempted source list for
    /// diagnostics.
    #[error("all sources failed for '{symbol}' during {operation} (attempted: {})", .attempted.join(", "))]
    AllSourcesExhausted {
        /// The symbol that could not be served
        symbol: String,
        /// The logical operation ("quote", "historical quotes", ...)
        operation: String,
        /// Names of the sources that were actually called
        attempted: Vec<String>,
    },
}

impl FeedError {
    /// Returns the retry classification for this error.
    ///
    /// A [`ProviderError`](Self::ProviderError) whose message indicates the
    /// provider's *own* rate limit (a 429 surfaced as text) is classified as
    /// [`RetryClass::Cooldown`] so the caller backs off for the full
    /// cooldown instead of the usual exponential schedule.
    ///
    /// # Examples
    ///
    /// ```
    /// use freedata::errors::{FeedError, RetryClass};
    ///
    /// let error = FeedError::RateLimited { provider: "yahoo".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Cooldown);
    ///
    /// let error = FeedError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::QuotaExceeded { .. } => RetryClass::Wait,

            Self::RateLimited { .. } => RetryClass::Cooldown,

            Self::ProviderError { message, .. } => {
                let lower = message.to_ascii_lowercase();
                if lower.contains("rate limit") || lower.contains("429") {
                    RetryClass::Cooldown
                } else {
                    RetryClass::Backoff
                }
            }

            Self::Timeout { .. } | Self::Network(_) => RetryClass::Backoff,

            Self::Unconfigured(_)
            | Self::SymbolNotFound(_)
            | Self::AllSourcesExhausted { .. } => RetryClass::Never,
        }
    }
}
