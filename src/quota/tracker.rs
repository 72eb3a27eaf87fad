//! Multi-window quota tracker.
//!
//! Tracks per-provider call budgets across several independent time windows
//! simultaneously. A call is admitted only when every configured window has
//! capacity, and an admitted call consumes one slot from every window at
//! once, not just the tightest one.
//!
//! State is in-memory and per-process; it resets on restart.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, warn};
use rust_decimal::Decimal;

use super::window::Window;

/// Rate limit configuration for one provider.
///
/// Immutable once registered; re-registering a provider replaces the config
/// wholesale and resets its live counters.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Provider identifier (e.g. "yahoo")
    pub provider: String,
    /// Max calls per window. A zero limit means "unlimited" for that window
    /// and is skipped during checks.
    pub limits: HashMap<Window, u32>,
    /// Currency cost per call, may be zero
    pub cost_per_call: Decimal,
    /// Ordinal used for provider selection (lower = preferred)
    pub priority: u8,
}

impl RateLimitConfig {
    /// Create a config with no limits, zero cost, and default priority.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            limits: HashMap::new(),
            cost_per_call: Decimal::ZERO,
            priority: 10,
        }
    }

    /// Set the max calls for one window.
    pub fn with_limit(mut self, window: Window, max_calls: u32) -> Self {
        self.limits.insert(window, max_calls);
        self
    }

    /// Set the per-call cost.
    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.cost_per_call = cost;
        self
    }

    /// Set the selection priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// Live counter for one (provider, window) pair.
///
/// If `now >= reset_at` the counter is logically zero; it is physically
/// reset (and `reset_at` recomputed from `now`) on the next check.
#[derive(Clone, Copy, Debug)]
pub struct UsageCounter {
    /// Calls consumed in the current window
    pub count: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
}

/// Snapshot of the most binding window at the time of a check.
#[derive(Clone, Debug)]
pub struct UsageSnapshot {
    /// The window this snapshot describes
    pub window: Window,
    /// Calls consumed in the window
    pub count: u32,
    /// The window's limit
    pub limit: u32,
    /// Calls remaining before the window denies
    pub remaining: u32,
    /// When the window resets
    pub reset_at: DateTime<Utc>,
    /// Accumulated cost of every admitted call for this provider
    pub total_cost: Decimal,
}

/// Outcome of a quota check.
#[derive(Clone, Debug)]
pub struct RateLimitResult {
    /// Whether the call was admitted
    pub allowed: bool,
    /// Time until the binding window resets; present only when denied and
    /// the reset is in the future
    pub wait: Option<Duration>,
    /// Human-readable explanation
    pub reason: String,
    /// Snapshot of the most binding window, when one exists
    pub usage: Option<UsageSnapshot>,
}

/// Read-only per-provider usage report.
#[derive(Clone, Debug)]
pub struct ProviderUsageReport {
    /// Provider identifier
    pub provider: String,
    /// Effective counters per window (expired windows shown as zero)
    pub windows: Vec<UsageSnapshot>,
    /// Accumulated cost of admitted calls
    pub total_cost: Decimal,
    /// The registered configuration
    pub config: RateLimitConfig,
}

#[derive(Debug, Default)]
struct ProviderUsage {
    windows: HashMap<Window, UsageCounter>,
    total_cost: Decimal,
}

/// Per-provider, multi-window quota tracker.
///
/// Thread-safe: the check-and-increment for a provider happens under that
/// provider's own map entry lock, so unrelated providers never contend.
pub struct QuotaTracker {
    configs: DashMap<String, RateLimitConfig>,
    usage: DashMap<String, ProviderUsage>,
    // Providers we already warned about, so "unconfigured" is logged once.
    unconfigured_logged: DashMap<String, ()>,
}

impl QuotaTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            usage: DashMap::new(),
            unconfigured_logged: DashMap::new(),
        }
    }

    /// Register (or wholesale replace) a provider's configuration.
    ///
    /// Replacing a config resets the provider's live counters, the same way
    /// reconfiguring a limiter resets its bucket.
    pub fn register(&self, config: RateLimitConfig) {
        self.usage.remove(&config.provider);
        self.unconfigured_logged.remove(&config.provider);
        debug!(
            "registered rate limit config for '{}' ({} windows)",
            config.provider,
            config.limits.len()
        );
        self.configs.insert(config.provider.clone(), config);
    }

    /// Get the registered configuration for a provider.
    pub fn config(&self, provider: &str) -> Option<RateLimitConfig> {
        self.configs.get(provider).map(|c| c.clone())
    }

    /// Answer "is this next call allowed?" and, if so, atomically record it.
    ///
    /// Every configured window is refreshed (reset if expired) and checked.
    /// If ANY window is at its limit the call is denied immediately, citing
    /// the window with the soonest reset. Otherwise every window's counter
    /// is incremented and the per-call cost accrues to the provider total.
    pub fn check_and_consume(&self, provider: &str, endpoint: Option<&str>) -> RateLimitResult {
        let config = match self.configs.get(provider) {
            Some(c) => c.clone(),
            None => {
                if self
                    .unconfigured_logged
                    .insert(provider.to_string(), ())
                    .is_none()
                {
                    warn!("no rate limit configuration registered for '{}'", provider);
                }
                return RateLimitResult {
                    allowed: false,
                    wait: None,
                    reason: format!("no rate limit configuration registered for '{provider}'"),
                    usage: None,
                };
            }
        };

        let now = Utc::now();
        let mut entry = self.usage.entry(provider.to_string()).or_default();

        // Refresh every window, remembering the exhausted one with the
        // soonest reset.
        let mut binding: Option<(Window, u32)> = None;
        for (&window, &limit) in &config.limits {
            if limit == 0 {
                continue; // unlimited
            }
            let counter = entry.windows.entry(window).or_insert(UsageCounter {
                count: 0,
                reset_at: window.next_reset(now),
            });
            if now >= counter.reset_at {
                counter.count = 0;
                counter.reset_at = window.next_reset(now);
            }
            if counter.count >= limit {
                let reset_at = counter.reset_at;
                let sooner = match binding {
                    Some((prev, _)) => {
                        entry.windows.get(&prev).map(|c| c.reset_at > reset_at) == Some(true)
                    }
                    None => true,
                };
                if sooner {
                    binding = Some((window, limit));
                }
            }
        }

        if let Some((window, limit)) = binding {
            let counter = entry.windows[&window];
            let wait = (counter.reset_at - now).to_std().ok();
            debug!(
                "quota denied for '{}'{}: {} at {}/{}",
                provider,
                endpoint.map(|e| format!(" ({e})")).unwrap_or_default(),
                window,
                counter.count,
                limit
            );
            return RateLimitResult {
                allowed: false,
                wait,
                reason: format!(
                    "{} limit reached for '{}': {}/{} calls",
                    window, provider, counter.count, limit
                ),
                usage: Some(UsageSnapshot {
                    window,
                    count: counter.count,
                    limit,
                    remaining: 0,
                    reset_at: counter.reset_at,
                    total_cost: entry.total_cost,
                }),
            };
        }

        // Admitted: consume budget from every limited window at once.
        for (&window, &limit) in &config.limits {
            if limit == 0 {
                continue;
            }
            if let Some(counter) = entry.windows.get_mut(&window) {
                counter.count += 1;
            }
        }
        entry.total_cost += config.cost_per_call;

        // Report the window closest to exhaustion.
        let tightest = config
            .limits
            .iter()
            .filter(|(_, &limit)| limit > 0)
            .filter_map(|(&window, &limit)| {
                entry
                    .windows
                    .get(&window)
                    .map(|c| (window, limit, *c, limit.saturating_sub(c.count)))
            })
            .min_by_key(|&(_, _, _, remaining)| remaining);

        RateLimitResult {
            allowed: true,
            wait: None,
            reason: "allowed".to_string(),
            usage: tightest.map(|(window, limit, counter, remaining)| UsageSnapshot {
                window,
                count: counter.count,
                limit,
                remaining,
                reset_at: counter.reset_at,
                total_cost: entry.total_cost,
            }),
        }
    }

    /// Read-only snapshot of every registered provider's usage.
    ///
    /// Does not mutate state: windows that have lapsed are reported with an
    /// effective count of zero but are not physically reset.
    pub fn report(&self) -> Vec<ProviderUsageReport> {
        let now = Utc::now();
        self.configs
            .iter()
            .map(|config| {
                let usage = self.usage.get(config.key());
                let total_cost = usage.as_ref().map(|u| u.total_cost).unwrap_or(Decimal::ZERO);
                // Tightest window first, so reports read second -> month.
                let windows = Window::ALL
                    .iter()
                    .filter_map(|&window| config.limits.get(&window).map(|&limit| (window, limit)))
                    .filter(|&(_, limit)| limit > 0)
                    .map(|(window, limit)| {
                        let counter = usage.as_ref().and_then(|u| u.windows.get(&window).copied());
                        let (count, reset_at) = match counter {
                            Some(c) if now < c.reset_at => (c.count, c.reset_at),
                            Some(c) => (0, c.reset_at),
                            None => (0, window.next_reset(now)),
                        };
                        UsageSnapshot {
                            window,
                            count,
                            limit,
                            remaining: limit.saturating_sub(count),
                            reset_at,
                            total_cost,
                        }
                    })
                    .collect();
                ProviderUsageReport {
                    provider: config.key().clone(),
                    windows,
                    total_cost,
                    config: config.clone(),
                }
            })
            .collect()
    }

    /// Drop counter sets whose windows have all expired, bounding memory.
    ///
    /// Providers with accrued cost are kept so the running total survives
    /// idle periods.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        self.usage.retain(|_, usage| {
            usage.windows.retain(|_, counter| counter.reset_at > now);
            !usage.windows.is_empty() || usage.total_cost > Decimal::ZERO
        });
    }
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new()
    }
}
