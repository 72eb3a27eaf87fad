//! Priority- and health-based source aggregator.
//!
//! Given a logical operation (quote, historical bars, ticker search, news),
//! selects the best currently-available source, fails over across sources
//! on error, and merges/deduplicates when an operation intrinsically spans
//! several sources.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use futures::future::join_all;
use log::{debug, info, warn};

use chrono::{DateTime, Utc};

use crate::errors::FeedError;
use crate::models::{NewsArticle, Quote, SearchResult};

use super::config::SourceConfig;
use super::health::SourceHealthRegistry;
use super::pacing::MinuteBudget;
use super::source::SourceKind;

/// Ticker search queries at most this many sources.
const SEARCH_SOURCE_LIMIT: usize = 3;

/// Merged ticker search results are capped at this many entries.
const SEARCH_RESULT_CAP: usize = 20;

/// Batch quote fetches run this many symbols concurrently.
const QUOTE_BATCH_SIZE: usize = 10;

/// Pause between quote batches, so no single source gets burst traffic.
const BATCH_DELAY: Duration = Duration::from_secs(1);

/// Health report entry returned by [`SourceAggregator::sources_health`].
#[derive(Clone, Debug)]
pub struct SourceHealthReport {
    /// Source name
    pub source: String,
    /// Current status (unknown sources read healthy)
    pub healthy: bool,
    /// When the status was last updated, if ever
    pub last_check: Option<Instant>,
}

struct RegisteredSource {
    name: String,
    config: SourceConfig,
    kind: SourceKind,
    budget: MinuteBudget,
}

/// Aggregates an ordered list of data sources with independent priorities,
/// reliability scores, and per-minute budgets.
///
/// Source ordering is recomputed on every request (source counts are small):
/// enabled and healthy sources, priority ascending, reliability descending.
pub struct SourceAggregator {
    sources: Vec<RegisteredSource>,
    health: SourceHealthRegistry,
}

impl SourceAggregator {
    /// Create an aggregator with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            health: SourceHealthRegistry::new(),
        }
    }

    /// Register a source. Call during startup, before the aggregator is
    /// shared.
    pub fn register(&mut self, name: impl Into<String>, config: SourceConfig, kind: SourceKind) {
        let name = name.into();
        info!(
            "registered source '{}' (priority {}, {:?})",
            name, config.priority, kind
        );
        self.sources.push(RegisteredSource {
            budget: MinuteBudget::new(config.calls_per_minute),
            name,
            config,
            kind,
        });
    }

    /// The shared health registry.
    pub fn health(&self) -> &SourceHealthRegistry {
        &self.health
    }

    /// Enabled and healthy sources, priority ascending, reliability
    /// descending.
    fn ordered(&self) -> Vec<&RegisteredSource> {
        let mut list: Vec<&RegisteredSource> = self
            .sources
            .iter()
            .filter(|s| s.config.enabled && self.health.is_healthy(&s.name))
            .collect();
        list.sort_by(|a, b| {
            a.config.priority.cmp(&b.config.priority).then_with(|| {
                b.config
                    .reliability
                    .partial_cmp(&a.config.reliability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });
        list
    }

    /// Fetch the latest quote for a symbol from the best available source.
    ///
    /// Fails over across sources; raises [`FeedError::AllSourcesExhausted`]
    /// only when every admissible source has been tried, because callers of
    /// quote data need to know it is entirely unavailable.
    pub async fn get_quote(&self, symbol: &str) -> Result<Quote, FeedError> {
        let mut attempted = Vec::new();

        for source in self.ordered() {
            if !source.budget.try_admit() {
                // Skipped, not failed.
                debug!("source '{}' minute budget exhausted, skipping", source.name);
                continue;
            }

            let adapter = match &source.kind {
                SourceKind::Adapter(adapter) => adapter.clone(),
                SourceKind::Unimplemented => {
                    warn!(
                        "source '{}' is registered but has no adapter, skipping",
                        source.name
                    );
                    attempted.push(source.name.clone());
                    continue;
                }
            };

            attempted.push(source.name.clone());
            match adapter.get_quote(symbol).await {
                Ok(quote) => {
                    self.health.mark_healthy(&source.name);
                    return Ok(quote);
                }
                Err(e) => {
                    self.health.mark_unhealthy(&source.name);
                    warn!(
                        "source '{}' failed to get quote for '{}': {}. Trying next.",
                        source.name, symbol, e
                    );
                }
            }
        }

        Err(FeedError::AllSourcesExhausted {
            symbol: symbol.to_string(),
            operation: "quote".to_string(),
            attempted,
        })
    }

    /// Fetch historical quotes for a symbol over a date range.
    ///
    /// A source that returns an empty series is skipped without a health
    /// penalty - another source may cover the range.
    pub async fn get_historical_quotes(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Quote>, FeedError> {
        let mut attempted = Vec::new();

        for source in self.ordered() {
            if !source.budget.try_admit() {
                debug!("source '{}' minute budget exhausted, skipping", source.name);
                continue;
            }

            let adapter = match &source.kind {
                SourceKind::Adapter(adapter) => adapter.clone(),
                SourceKind::Unimplemented => {
                    warn!(
                        "source '{}' is registered but has no adapter, skipping",
                        source.name
                    );
                    attempted.push(source.name.clone());
                    continue;
                }
            };

            attempted.push(source.name.clone());
            match adapter.get_historical_quotes(symbol, start, end).await {
                Ok(quotes) if !quotes.is_empty() => {
                    self.health.mark_healthy(&source.name);
                    return Ok(quotes);
                }
                Ok(_) => {
                    info!(
                        "source '{}' returned no historical quotes for '{}'. Trying next.",
                        source.name, symbol
                    );
                }
                Err(e) => {
                    self.health.mark_unhealthy(&source.name);
                    warn!(
                        "source '{}' failed to get historical quotes for '{}': {}. Trying next.",
                        source.name, symbol, e
                    );
                }
            }
        }

        Err(FeedError::AllSourcesExhausted {
            symbol: symbol.to_string(),
            operation: "historical quotes".to_string(),
            attempted,
        })
    }

    /// Fetch quotes for many symbols.
    ///
    /// Symbols are processed in fixed-size batches run concurrently, with a
    /// short delay between batches to avoid bursting any single source.
    /// Symbols whose lookup fails are dropped from the result, not retried.
    pub async fn get_quotes(&self, symbols: &[String]) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(symbols.len());

        for (index, batch) in symbols.chunks(QUOTE_BATCH_SIZE).enumerate() {
            if index > 0 {
                tokio::time::sleep(BATCH_DELAY).await;
            }

            let results = join_all(batch.iter().map(|symbol| self.get_quote(symbol))).await;
            for result in results {
                match result {
                    Ok(quote) => quotes.push(quote),
                    Err(e) => debug!("dropping symbol from batch: {}", e),
                }
            }
        }

        quotes
    }

    /// Search for tickers across the top sources.
    ///
    /// Queries up to three admissible sources in priority order, merges, and
    /// deduplicates by symbol. Never raises; sources that fail are logged
    /// and skipped.
    pub async fn search_tickers(&self, query: &str) -> Vec<SearchResult> {
        let mut merged: Vec<SearchResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queried = 0;

        for source in self.ordered() {
            if queried == SEARCH_SOURCE_LIMIT {
                break;
            }
            if !source.budget.try_admit() {
                continue;
            }
            let SourceKind::Adapter(adapter) = &source.kind else {
                continue;
            };

            queried += 1;
            match adapter.search_tickers(query).await {
                Ok(results) => {
                    self.health.mark_healthy(&source.name);
                    for result in results {
                        if seen.insert(result.symbol.clone()) {
                            merged.push(result);
                        }
                    }
                }
                Err(e) => {
                    self.health.mark_unhealthy(&source.name);
                    warn!("source '{}' failed ticker search: {}", source.name, e);
                }
            }
        }

        merged.truncate(SEARCH_RESULT_CAP);
        merged
    }

    /// Fetch news from every admissible source.
    ///
    /// Results are merged, deduplicated by URL, and sorted by publication
    /// time, newest first. Never raises.
    pub async fn get_news(&self, symbol: Option<&str>) -> Vec<NewsArticle> {
        let mut merged: Vec<NewsArticle> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for source in self.ordered() {
            if !source.budget.try_admit() {
                continue;
            }
            let SourceKind::Adapter(adapter) = &source.kind else {
                continue;
            };

            match adapter.get_news(symbol).await {
                Ok(articles) => {
                    self.health.mark_healthy(&source.name);
                    for article in articles {
                        if seen.insert(article.url.clone()) {
                            merged.push(article);
                        }
                    }
                }
                Err(e) => {
                    self.health.mark_unhealthy(&source.name);
                    warn!("source '{}' failed news fetch: {}", source.name, e);
                }
            }
        }

        merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        merged
    }

    /// Health report for every registered source, re-probing stale entries.
    ///
    /// Any enabled source whose record is older than the probe interval is
    /// re-probed with a cheap synthetic call; probe failures mark the source
    /// unhealthy without raising. Unimplemented sources are marked unhealthy
    /// outright.
    pub async fn sources_health(&self) -> Vec<SourceHealthReport> {
        for source in &self.sources {
            if !source.config.enabled || !self.health.needs_probe(&source.name) {
                continue;
            }

            match &source.kind {
                SourceKind::Adapter(adapter) => match adapter.probe().await {
                    Ok(()) => self.health.mark_healthy(&source.name),
                    Err(e) => {
                        warn!("health probe failed for '{}': {}", source.name, e);
                        self.health.mark_unhealthy(&source.name);
                    }
                },
                SourceKind::Unimplemented => {
                    self.health.mark_unhealthy(&source.name);
                }
            }
        }

        self.sources
            .iter()
            .map(|source| {
                let state = self.health.get(&source.name);
                SourceHealthReport {
                    source: source.name.clone(),
                    healthy: state.map(|s| s.healthy).unwrap_or(true),
                    last_check: state.map(|s| s.last_check),
                }
            })
            .collect()
    }
}

impl Default for SourceAggregator {
    fn default() -> Self {
        Self::new()
    }
}
