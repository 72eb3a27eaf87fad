//! Quota time windows.
//!
//! Short windows (second/minute/hour) slide from the moment of their last
//! reset. Day and month windows are calendar-aligned - next local midnight
//! and first moment of the next calendar month - to match provider billing
//! cycles.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};

/// A time window over which a call quota applies.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Window {
    Second,
    Minute,
    Hour,
    Day,
    Month,
}

impl Window {
    /// Every window, tightest first.
    pub const ALL: [Window; 5] = [
        Window::Second,
        Window::Minute,
        Window::Hour,
        Window::Day,
        Window::Month,
    ];

    /// Human name used in denial reasons and usage reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::Second => "perSecond",
            Window::Minute => "perMinute",
            Window::Hour => "perHour",
            Window::Day => "perDay",
            Window::Month => "perMonth",
        }
    }

    /// Compute the reset time of a window that starts (or restarts) at `now`.
    pub fn next_reset(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Window::Second => now + ChronoDuration::seconds(1),
            Window::Minute => now + ChronoDuration::minutes(1),
            Window::Hour => now + ChronoDuration::hours(1),
            Window::Day => next_local_midnight(now),
            Window::Month => next_month_start(now),
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn next_local_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let next = local
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());

    match next {
        Some(midnight) => midnight.with_timezone(&Utc),
        // Midnight falls into a DST gap (or the date overflowed); slide a
        // plain day instead.
        None => now + ChronoDuration::hours(24),
    }
}

fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let local = now.with_timezone(&Local);
    let (year, month) = if local.month() == 12 {
        (local.year() + 1, 1)
    } else {
        (local.year(), local.month() + 1)
    };

    let next = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());

    match next {
        Some(start) => start.with_timezone(&Utc),
        None => now + ChronoDuration::days(31),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_windows_slide_from_now() {
        let now = Utc::now();
        assert_eq!(Window::Second.next_reset(now), now + ChronoDuration::seconds(1));
        assert_eq!(Window::Minute.next_reset(now), now + ChronoDuration::minutes(1));
        assert_eq!(Window::Hour.next_reset(now), now + ChronoDuration::hours(1));
    }

    #[test]
    fn test_day_window_resets_at_local_midnight() {
        let now = Utc::now();
        let reset = Window::Day.next_reset(now);

        assert!(reset > now);
        // At most one day away, and exactly midnight in local time.
        assert!(reset - now <= ChronoDuration::hours(24));
        let local = reset.with_timezone(&Local);
        assert_eq!(local.time(), chrono::NaiveTime::MIN);
    }

    #[test]
    fn test_month_window_resets_on_first_of_next_month() {
        let now = Utc::now();
        let reset = Window::Month.next_reset(now);

        assert!(reset > now);
        let local = reset.with_timezone(&Local);
        assert_eq!(local.day(), 1);
        assert_eq!(local.time(), chrono::NaiveTime::MIN);

        let today = now.with_timezone(&Local);
        let expected_month = if today.month() == 12 { 1 } else { today.month() + 1 };
        assert_eq!(local.month(), expected_month);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Window::Minute.to_string(), "perMinute");
        assert_eq!(Window::Month.to_string(), "perMonth");
    }
}
