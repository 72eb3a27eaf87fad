//! News article model.
//!
//! Articles merged from several sources are deduplicated by URL, which is
//! the only identity a provider-agnostic article reliably has.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article returned by a data source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Headline
    pub title: String,

    /// Canonical article URL; deduplication key when merging sources
    pub url: String,

    /// Source the article came from ("yahoo", "finnhub", ...)
    pub source: String,

    /// Short summary or teaser, when the source provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Publication time
    pub published_at: DateTime<Utc>,
}

impl NewsArticle {
    /// Create a new article with required fields.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            summary: None,
            published_at,
        }
    }

    /// Set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}
