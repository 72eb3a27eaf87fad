//! Per-provider, multi-window call quotas.
//!
//! This module answers "is this next call allowed?" across several
//! independent time windows at once, and records admitted calls atomically
//! per provider.

mod tracker;
mod window;

pub use tracker::{
    ProviderUsageReport, QuotaTracker, RateLimitConfig, RateLimitResult, UsageCounter,
    UsageSnapshot,
};
pub use window::Window;
