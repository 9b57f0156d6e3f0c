use crate::days::add_days;
use crate::{CardStatus, Grade, ReviewCard, ReviewEntry, EF_MIN, INTERVAL_MAX};
use chrono::{DateTime, Utc};

const HARD_INTERVAL_FACTOR: f64 = 1.2;
const EASY_BONUS: f64 = 1.3;
const AGAIN_EF_PENALTY: f64 = 0.2;
const HARD_EF_PENALTY: f64 = 0.15;
const EASY_EF_BONUS: f64 = 0.15;

// Interval products within this distance above an integer are treated as
// that integer, so 20 * 1.3 schedules 26 days rather than 27.
const CEIL_TOLERANCE: f64 = 1e-9;

pub struct ScheduleOutcome {
    pub updated_card: ReviewCard,
    pub entry: ReviewEntry,
}

/// Learning status implied by an interval. `New` is never returned: it only
/// describes a card that has not been reviewed yet.
pub fn status_for(interval_days: u32) -> CardStatus {
    if interval_days >= 30 {
        CardStatus::Mastered
    } else if interval_days >= 7 {
        CardStatus::Review
    } else {
        CardStatus::Learning
    }
}

fn round_ef(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn clamp_ef(x: f64) -> f64 {
    round_ef(x).max(EF_MIN)
}

fn ceil_days(x: f64) -> u32 {
    let days = (x - CEIL_TOLERANCE).ceil();
    if days >= f64::from(INTERVAL_MAX) {
        INTERVAL_MAX
    } else {
        (days as u32).max(1)
    }
}

/// Next `(interval_days, ease_factor)` for a graded review.
pub fn next_interval(interval_days: u32, ease_factor: f64, grade: Grade) -> (u32, f64) {
    let interval = f64::from(interval_days.max(1));
    let ef = ease_factor.max(EF_MIN);
    match grade {
        Grade::Again => (1, clamp_ef(ef - AGAIN_EF_PENALTY)),
        Grade::Hard => (
            ceil_days(interval * HARD_INTERVAL_FACTOR),
            clamp_ef(ef - HARD_EF_PENALTY),
        ),
        Grade::Good => (ceil_days(interval * ef), ef),
        Grade::Easy => (
            ceil_days(interval * ef * EASY_BONUS),
            clamp_ef(ef + EASY_EF_BONUS),
        ),
    }
}

/// Applies one review to a copy of `card`. Interval, ease factor, next review
/// date, status and history change together or not at all.
pub fn apply_review(card: &ReviewCard, grade: Grade, now: DateTime<Utc>) -> ScheduleOutcome {
    let (interval, ef) = next_interval(card.interval_days, card.ease_factor, grade);
    let entry = ReviewEntry {
        reviewed_at: now,
        grade,
    };

    let mut updated = card.clone();
    updated.interval_days = interval;
    updated.ease_factor = ef;
    updated.next_review_at = add_days(now, interval);
    updated.status = status_for(interval);
    updated.review_history.push(entry.clone());
    updated.updated_at = now;

    ScheduleOutcome {
        updated_card: updated,
        entry,
    }
}
