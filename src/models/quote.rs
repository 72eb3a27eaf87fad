use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market data quote
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol the quote belongs to
    pub symbol: String,

    /// Timestamp of the quote
    pub timestamp: DateTime<Utc>,

    /// Opening price (optional for intraday)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    /// High price (optional for intraday)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    /// Low price (optional for intraday)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    /// Closing/current price (required)
    pub close: Decimal,

    /// Trading volume (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Quote currency
    pub currency: String,

    /// Source the quote came from ("yahoo", "stooq", ...)
    pub source: String,
}

impl Quote {
    /// Create a new quote with minimal required fields
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        close: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
            currency: currency.into(),
            source: source.into(),
        }
    }

    /// Create a full OHLCV quote
    #[allow(clippy::too_many_arguments)]
    pub fn ohlcv(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open: Some(open),
            high: Some(high),
            low: Some(low),
            close,
            volume: Some(volume),
            currency: currency.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_new() {
        let quote = Quote::new("AAPL", Utc::now(), dec!(150.25), "USD", "yahoo");
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.close, dec!(150.25));
        assert_eq!(quote.currency, "USD");
        assert!(quote.open.is_none());
    }

    #[test]
    fn test_quote_ohlcv() {
        let quote = Quote::ohlcv(
            "AAPL",
            Utc::now(),
            dec!(148.00),
            dec!(152.00),
            dec!(147.50),
            dec!(150.25),
            dec!(1000000),
            "USD",
            "yahoo",
        );
        assert_eq!(quote.open, Some(dec!(148.00)));
        assert_eq!(quote.high, Some(dec!(152.00)));
        assert_eq!(quote.low, Some(dec!(147.50)));
        assert_eq!(quote.close, dec!(150.25));
        assert_eq!(quote.volume, Some(dec!(1000000)));
    }
}
