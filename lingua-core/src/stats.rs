use crate::days::day_of;
use crate::streak::current_streak;
use crate::{ActivityLedger, CardStatus, Grade, ReviewCard};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GradeTotals {
    pub total: u32,
    pub again: u32,
    pub hard: u32,
    pub good: u32,
    pub easy: u32,
}

impl GradeTotals {
    pub fn record(&mut self, g: Grade) {
        self.total += 1;
        match g {
            Grade::Again => self.again += 1,
            Grade::Hard => self.hard += 1,
            Grade::Good => self.good += 1,
            Grade::Easy => self.easy += 1,
        }
    }

    /// Share of reviews recalled without difficulty.
    pub fn recall_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.good + self.easy) / f64::from(self.total)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u32,
    pub new: u32,
    pub learning: u32,
    pub review: u32,
    pub mastered: u32,
}

impl StatusCounts {
    pub fn record(&mut self, s: CardStatus) {
        self.total += 1;
        match s {
            CardStatus::New => self.new += 1,
            CardStatus::Learning => self.learning += 1,
            CardStatus::Review => self.review += 1,
            CardStatus::Mastered => self.mastered += 1,
        }
    }
}

pub fn status_counts(cards: &[ReviewCard]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for c in cards {
        counts.record(c.status);
    }
    counts
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReviewSummary {
    pub totals: GradeTotals,
    pub per_day: BTreeMap<NaiveDate, GradeTotals>,
}

pub fn summarize_reviews(cards: &[ReviewCard]) -> ReviewSummary {
    let mut summary = ReviewSummary::default();
    for entry in cards.iter().flat_map(|c| c.review_history.iter()) {
        summary.totals.record(entry.grade);
        summary
            .per_day
            .entry(day_of(entry.reviewed_at))
            .or_default()
            .record(entry.grade);
    }
    summary
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub vocabulary_learned: u32,
    pub vocabulary_mastered: u32,
    pub exercises_done: u32,
    pub tests_done: u32,
    pub streak_days: u32,
    pub time_spent: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_vocabulary_learned: u64,
    pub total_vocabulary_mastered: u64,
    pub total_exercises_done: u64,
    pub total_tests_done: u64,
    pub total_time_spent: u64,
    pub current_streak: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LearningStatistics {
    pub by_language: BTreeMap<String, LanguageStats>,
    pub overall: OverallStats,
}

pub fn learning_statistics(ledgers: &[ActivityLedger]) -> LearningStatistics {
    let mut stats = LearningStatistics::default();
    for l in ledgers {
        stats.by_language.insert(
            l.language.clone(),
            LanguageStats {
                vocabulary_learned: l.vocabulary_learned,
                vocabulary_mastered: l.vocabulary_mastered,
                exercises_done: l.exercises_done,
                tests_done: l.tests_done,
                streak_days: l.streak_days,
                time_spent: l.total_time_spent,
            },
        );
        let o = &mut stats.overall;
        o.total_vocabulary_learned += u64::from(l.vocabulary_learned);
        o.total_vocabulary_mastered += u64::from(l.vocabulary_mastered);
        o.total_exercises_done += u64::from(l.exercises_done);
        o.total_tests_done += u64::from(l.tests_done);
        o.total_time_spent = o.total_time_spent.saturating_add(l.total_time_spent);
    }
    stats.overall.current_streak = current_streak(ledgers);
    stats
}
