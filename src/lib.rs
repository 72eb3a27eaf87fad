//! Freedata Market Data Client
//!
//! Resilient, rate-limit-aware fetching of market data from several
//! free-tier providers behind one interface.
//!
//! # Overview
//!
//! The crate supports:
//! - Per-provider quotas across multiple concurrent time windows
//! - Resilient calls with retry, exponential backoff, and cache fallback
//! - Priority- and health-based failover across data sources
//! - Merged multi-source operations: ticker search, news, batch quotes
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! | SourceAggregator |  (priority order, health, failover, merging)
//! +------------------+
//!          |
//!          v
//! +-------------------+
//! | RateLimitedClient |  (quota check, retries, cache fallback)
//! +-------------------+
//!     |           |
//!     v           v
//! +--------------+  +---------------+
//! | QuotaTracker |  | ResponseCache |  (windows)      (TTL entries)
//! +--------------+  +---------------+
//!          |
//!          v
//! +------------------+
//! |    DataSource    |  (one adapter per provider)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`QuotaTracker`] - Multi-window per-provider call quotas
//! - [`RateLimitedClient`] - Quota-checked calls with retry and fallback
//! - [`CallOutcome`] - Where a call's data came from (fresh, cache, fallback)
//! - [`SourceAggregator`] - Ordered failover across registered sources
//! - [`DataSource`] - Trait implemented by each provider adapter
//! - [`MaintenanceTask`] - Background sweeping and health probing

pub mod aggregator;
pub mod cache;
pub mod client;
pub mod errors;
pub mod maintenance;
pub mod models;
pub mod quota;

// Re-export all public types from models
pub use models::{NewsArticle, Quote, SearchResult};

// Re-export quota types
pub use quota::{
    ProviderUsageReport, QuotaTracker, RateLimitConfig, RateLimitResult, UsageCounter,
    UsageSnapshot, Window,
};

// Re-export client and cache types
pub use cache::ResponseCache;
pub use client::{CallOptions, CallOutcome, RateLimitedClient};

// Re-export aggregator types
pub use aggregator::{
    DataSource, SourceAggregator, SourceConfig, SourceHealth, SourceHealthRegistry,
    SourceHealthReport, SourceKind,
};

pub use errors::{FeedError, RetryClass};
pub use maintenance::MaintenanceTask;
