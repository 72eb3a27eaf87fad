//! Data models shared by the quota tracker, call wrapper, and aggregator.

mod news;
mod quote;
mod search;

pub use news::NewsArticle;
pub use quote::Quote;
pub use search::SearchResult;
