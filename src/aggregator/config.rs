//! Per-source aggregator configuration.

/// Configuration for one registered data source.
///
/// Independent from the provider-level [`RateLimitConfig`]: this models the
/// aggregator's live pacing of a source, while the quota tracker models the
/// provider's configured tier.
///
/// [`RateLimitConfig`]: crate::quota::RateLimitConfig
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Selection order; lower = preferred
    pub priority: u8,
    /// Disabled sources are never selected
    pub enabled: bool,
    /// Aggregator-local admission budget, calls per minute (0 = unlimited)
    pub calls_per_minute: u32,
    /// 0-1 heuristic weight, tiebreaker between equal priorities
    pub reliability: f64,
}

impl SourceConfig {
    /// Config with the given priority and defaults for the rest.
    pub fn new(priority: u8) -> Self {
        Self {
            priority,
            enabled: true,
            calls_per_minute: 60,
            reliability: 0.5,
        }
    }

    /// Set the per-minute admission budget.
    pub fn with_calls_per_minute(mut self, calls: u32) -> Self {
        self.calls_per_minute = calls;
        self
    }

    /// Set the reliability tiebreaker.
    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability.clamp(0.0, 1.0);
        self
    }

    /// Disable the source.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SourceConfig::default();
        assert_eq!(config.priority, 10);
        assert!(config.enabled);
        assert_eq!(config.calls_per_minute, 60);
    }

    #[test]
    fn test_reliability_is_clamped() {
        assert_eq!(SourceConfig::new(1).with_reliability(1.5).reliability, 1.0);
        assert_eq!(SourceConfig::new(1).with_reliability(-0.2).reliability, 0.0);
    }
}
