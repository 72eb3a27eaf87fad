//! Multi-source aggregation: priority ordering, health-based failover,
//! result merging, and batch fetching.

mod aggregator;
mod config;
mod health;
mod pacing;
mod source;

pub use aggregator::{SourceAggregator, SourceHealthReport};
pub use config::SourceConfig;
pub use health::{SourceHealth, SourceHealthRegistry};
pub use source::{DataSource, SourceKind, PROBE_SYMBOL};
