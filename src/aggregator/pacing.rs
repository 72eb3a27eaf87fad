//! Per-source minute admission budget.
//!
//! A fixed one-minute counter local to the aggregator, independent from the
//! provider-level quota tracker: the tracker models a provider's configured
//! tier, this paces the aggregator's live traffic. A source whose budget is
//! exhausted is skipped for the request, not failed.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::warn;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct BudgetWindow {
    count: u32,
    window_start: Instant,
}

/// Sliding one-minute admission counter for a single source.
#[derive(Debug)]
pub(crate) struct MinuteBudget {
    limit: u32,
    state: Mutex<BudgetWindow>,
}

impl MinuteBudget {
    /// Budget allowing `limit` admissions per minute; zero means unlimited.
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new(BudgetWindow {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Lock the window, recovering from poison if necessary.
    ///
    /// Worst case of recovery is a slightly miscounted window, which is
    /// better than panicking.
    fn lock(&self) -> MutexGuard<'_, BudgetWindow> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("minute budget mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Admit one call if the current minute has capacity. Never blocks.
    pub(crate) fn try_admit(&self) -> bool {
        if self.limit == 0 {
            return true;
        }

        let mut window = self.lock();
        if window.window_start.elapsed() >= WINDOW {
            window.count = 0;
            window.window_start = Instant::now();
        }

        if window.count < self.limit {
            window.count += 1;
            true
        } else {
            false
        }
    }

    /// Admissions left in the current minute.
    #[cfg(test)]
    pub(crate) fn remaining(&self) -> u32 {
        if self.limit == 0 {
            return u32::MAX;
        }
        let mut window = self.lock();
        if window.window_start.elapsed() >= WINDOW {
            window.count = 0;
            window.window_start = Instant::now();
        }
        self.limit - window.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_limit() {
        let budget = MinuteBudget::new(3);
        assert!(budget.try_admit());
        assert!(budget.try_admit());
        assert!(budget.try_admit());
        assert!(!budget.try_admit());
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let budget = MinuteBudget::new(0);
        for _ in 0..1000 {
            assert!(budget.try_admit());
        }
    }

    #[test]
    fn test_window_rollover_restores_budget() {
        let budget = MinuteBudget::new(1);
        assert!(budget.try_admit());
        assert!(!budget.try_admit());

        // Backdate the window start to simulate a lapsed minute.
        budget.lock().window_start = Instant::now() - WINDOW - Duration::from_secs(1);

        assert!(budget.try_admit());
    }
}
