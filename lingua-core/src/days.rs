//! Calendar-day bucketing shared by the scheduler and the streak tracker.
//!
//! All day boundaries are UTC midnights.

use chrono::{DateTime, Days, NaiveDate, Utc};

pub fn day_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Whole calendar days from `from` to `to`; negative when `to` is earlier.
pub fn day_gap(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (day_of(to) - day_of(from)).num_days()
}

pub fn same_day(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    day_of(a) == day_of(b)
}

/// `ts` moved forward by `days` calendar days, keeping the time of day.
/// Saturates at the largest representable instant.
pub fn add_days(ts: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    ts.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
