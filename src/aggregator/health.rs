//! Source health tracking.
//!
//! Health is a hint, not a hard gate: a source marked unhealthy by one
//! in-flight failure may still be attempted by a request that read the
//! state microseconds earlier, and that is fine. State is updated on every
//! call outcome and refreshed by periodic probing of stale entries.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// How stale a health record may get before the next probe.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(300);

/// Up/down status of one source.
#[derive(Clone, Copy, Debug)]
pub struct SourceHealth {
    /// Whether the last call or probe succeeded
    pub healthy: bool,
    /// When the status was last updated
    pub last_check: Instant,
}

/// Tracks each source's up/down status and last-check time.
///
/// A source with no recorded state yet is treated as healthy - first use
/// must be attemptable.
pub struct SourceHealthRegistry {
    states: DashMap<String, SourceHealth>,
}

impl SourceHealthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            states: DashMap::new(),
        }
    }

    /// Record a successful call or probe.
    pub fn mark_healthy(&self, source: &str) {
        self.states.insert(
            source.to_string(),
            SourceHealth {
                healthy: true,
                last_check: Instant::now(),
            },
        );
    }

    /// Record a failed call or probe.
    pub fn mark_unhealthy(&self, source: &str) {
        self.states.insert(
            source.to_string(),
            SourceHealth {
                healthy: false,
                last_check: Instant::now(),
            },
        );
    }

    /// Current status; unknown sources read as healthy.
    pub fn is_healthy(&self, source: &str) -> bool {
        self.states.get(source).map(|s| s.healthy).unwrap_or(true)
    }

    /// Whether a source's record is stale enough to re-probe.
    pub fn needs_probe(&self, source: &str) -> bool {
        self.states
            .get(source)
            .map(|s| s.last_check.elapsed() >= PROBE_INTERVAL)
            .unwrap_or(true)
    }

    /// The recorded state for a source, if any.
    pub fn get(&self, source: &str) -> Option<SourceHealth> {
        self.states.get(source).map(|s| *s)
    }

    /// Age a record so it looks stale.
    #[cfg(test)]
    pub(crate) fn backdate(&self, source: &str, age: Duration) {
        if let Some(mut state) = self.states.get_mut(source) {
            state.last_check = Instant::now() - age;
        }
    }

    /// Every recorded state.
    pub fn snapshot(&self) -> Vec<(String, SourceHealth)> {
        self.states
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}

impl Default for SourceHealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}
