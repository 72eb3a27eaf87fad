//! Data source trait and source kinds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::FeedError;
use crate::models::{NewsArticle, Quote, SearchResult};

/// Known-good symbol used for cheap synthetic health probes.
pub const PROBE_SYMBOL: &str = "AAPL";

/// Trait for aggregator-level data sources.
///
/// Implement this to wrap one provider. The aggregator uses the source's
/// [`SourceConfig`](super::SourceConfig) priority and reliability to decide
/// when to call it, and its health history to decide whether to.
///
/// Search and news have defaults that report "not supported" so quote-only
/// sources stay small; the aggregator treats that like any other source
/// failure and moves on.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Unique identifier, used for logging and health tracking.
    fn id(&self) -> &'static str;

    /// Fetch the latest quote for a symbol.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, FeedError>;

    /// Fetch historical quotes for a symbol over a date range.
    async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, FeedError>;

    /// Search for tickers matching the query.
    async fn search_tickers(&self, query: &str) -> Result<Vec<SearchResult>, FeedError> {
        let _ = query;
        Err(FeedError::ProviderError {
            provider: self.id().to_string(),
            message: "ticker search not supported".to_string(),
        })
    }

    /// Fetch news, optionally scoped to a symbol.
    async fn get_news(&self, symbol: Option<&str>) -> Result<Vec<NewsArticle>, FeedError> {
        let _ = symbol;
        Err(FeedError::ProviderError {
            provider: self.id().to_string(),
            message: "news not supported".to_string(),
        })
    }

    /// Cheap synthetic call used by health probing.
    async fn probe(&self) -> Result<(), FeedError> {
        self.get_quote(PROBE_SYMBOL).await.map(|_| ())
    }
}

/// What a registered source actually is.
///
/// A provider that is configured but has no adapter yet is registered as
/// `Unimplemented` so it fails fast and visibly instead of silently
/// returning synthetic data.
#[derive(Clone)]
pub enum SourceKind {
    /// A live adapter wrapping one provider
    Adapter(Arc<dyn DataSource>),
    /// Configured but not implemented; never serves data
    Unimplemented,
}

impl std::fmt::Debug for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adapter(adapter) => f.debug_tuple("Adapter").field(&adapter.id()).finish(),
            Self::Unimplemented => f.write_str("Unimplemented"),
        }
    }
}
