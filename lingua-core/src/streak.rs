use crate::days::{day_gap, same_day};
use crate::{ActivityLedger, CoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreakChange {
    Unchanged,
    Extended,
    Restarted,
}

/// Updates a copy of `ledger` for an activity at `now`.
///
/// Repeated calls on the same UTC day only refresh `last_activity`; a call on
/// the following day extends the streak; anything else (a longer gap, a clock
/// that went backwards, or a ledger with no prior activity) restarts it at 1.
pub fn record_activity(
    ledger: &ActivityLedger,
    minutes_spent: Option<i64>,
    now: DateTime<Utc>,
) -> Result<(ActivityLedger, StreakChange), CoreError> {
    let minutes = minutes_spent.unwrap_or(0);
    if minutes < 0 {
        return Err(CoreError::InvalidDuration(minutes));
    }

    let change = match ledger.last_activity.map(|last| day_gap(last, now)) {
        Some(0) => StreakChange::Unchanged,
        Some(1) => StreakChange::Extended,
        _ => StreakChange::Restarted,
    };

    let mut updated = ledger.clone();
    updated.total_time_spent = updated.total_time_spent.saturating_add(minutes as u64);
    match change {
        StreakChange::Unchanged => {}
        StreakChange::Extended => updated.streak_days = updated.streak_days.saturating_add(1),
        StreakChange::Restarted => updated.streak_days = 1,
    }
    updated.last_activity = Some(now);
    updated.updated_at = now;

    Ok((updated, change))
}

/// Best streak across a user's languages; 0 with no ledgers.
pub fn current_streak(ledgers: &[ActivityLedger]) -> u32 {
    ledgers.iter().map(|l| l.streak_days).max().unwrap_or(0)
}

pub fn has_activity_today(ledgers: &[ActivityLedger], now: DateTime<Utc>) -> bool {
    ledgers
        .iter()
        .filter_map(|l| l.last_activity)
        .any(|last| same_day(last, now))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub has_activity_today: bool,
}

pub fn streak_summary(ledgers: &[ActivityLedger], now: DateTime<Utc>) -> StreakSummary {
    StreakSummary {
        current_streak: current_streak(ledgers),
        has_activity_today: has_activity_today(ledgers, now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ledger_at(streak: u32, last: DateTime<Utc>) -> ActivityLedger {
        let mut l = ActivityLedger::new("u1", "es", last);
        l.streak_days = streak;
        l.last_activity = Some(last);
        l
    }

    #[test]
    fn first_activity_starts_streak() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let fresh = ActivityLedger::new("u1", "es", now);
        let (l, change) = record_activity(&fresh, Some(15), now).unwrap();
        assert_eq!(change, StreakChange::Restarted);
        assert_eq!(l.streak_days, 1);
        assert_eq!(l.total_time_spent, 15);
        assert_eq!(l.last_activity, Some(now));
    }

    #[test]
    fn missing_minutes_count_as_zero() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let (l, _) = record_activity(&ledger_at(2, now), None, now).unwrap();
        assert_eq!(l.total_time_spent, 0);
    }

    #[test]
    fn negative_minutes_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap();
        let err = record_activity(&ledger_at(2, now), Some(-5), now).unwrap_err();
        assert_eq!(err, CoreError::InvalidDuration(-5));
    }

    #[test]
    fn late_evening_then_early_morning_is_consecutive() {
        let last = Utc.with_ymd_and_hms(2024, 3, 10, 23, 50, 0).unwrap();
        let now = last + Duration::minutes(20);
        let (l, change) = record_activity(&ledger_at(3, last), None, now).unwrap();
        assert_eq!(change, StreakChange::Extended);
        assert_eq!(l.streak_days, 4);
    }

    #[test]
    fn twenty_five_hours_within_adjacent_days_is_consecutive() {
        let last = Utc.with_ymd_and_hms(2024, 3, 10, 0, 30, 0).unwrap();
        let now = last + Duration::hours(25);
        assert_eq!(record_activity(&ledger_at(3, last), None, now).unwrap().0.streak_days, 4);
    }

    #[test]
    fn summary_of_nothing() {
        let now = Utc::now();
        assert_eq!(
            streak_summary(&[], now),
            StreakSummary {
                current_streak: 0,
                has_activity_today: false
            }
        );
    }
}
