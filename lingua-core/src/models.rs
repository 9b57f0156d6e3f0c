use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::CoreError;

pub type UserId = String;
pub type VocabularyId = String;
pub type CardId = Uuid;
pub type LedgerId = Uuid;

pub const EF_MIN: f64 = 1.3;
pub const EF_DEFAULT: f64 = 2.5;
pub const INTERVAL_DEFAULT: u32 = 1;
/// Upper bound on a scheduled interval, roughly a century.
pub const INTERVAL_MAX: u32 = 36_500;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Again,
    Hard,
    Good,
    Easy,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Again => "again",
            Grade::Hard => "hard",
            Grade::Good => "good",
            Grade::Easy => "easy",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "again" => Ok(Grade::Again),
            "hard" => Ok(Grade::Hard),
            "good" => Ok(Grade::Good),
            "easy" => Ok(Grade::Easy),
            _ => Err(CoreError::InvalidGrade(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    New,
    Learning,
    Review,
    Mastered,
}

impl CardStatus {
    pub const ALL: [CardStatus; 4] = [
        CardStatus::New,
        CardStatus::Learning,
        CardStatus::Review,
        CardStatus::Mastered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::New => "new",
            CardStatus::Learning => "learning",
            CardStatus::Review => "review",
            CardStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(CardStatus::New),
            "learning" => Ok(CardStatus::Learning),
            "review" => Ok(CardStatus::Review),
            "mastered" => Ok(CardStatus::Mastered),
            _ => Err(CoreError::Invalid("unknown card status")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewEntry {
    pub reviewed_at: DateTime<Utc>,
    pub grade: Grade,
}

/// Scheduling state for one (user, vocabulary item) pair.
///
/// `version` is the optimistic-concurrency counter of the stored record. It is
/// 0 for a record that has never been persisted and is bumped by the
/// repository on every successful save.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewCard {
    pub id: CardId,
    pub user_id: UserId,
    pub vocabulary_id: VocabularyId,

    pub status: CardStatus,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review_at: DateTime<Utc>,
    pub review_history: Vec<ReviewEntry>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl ReviewCard {
    pub fn new(
        user_id: impl Into<UserId>,
        vocabulary_id: impl Into<VocabularyId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            vocabulary_id: vocabulary_id.into(),
            status: CardStatus::New,
            ease_factor: EF_DEFAULT,
            interval_days: INTERVAL_DEFAULT,
            next_review_at: now,
            review_history: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_new(&self) -> bool {
        self.review_history.is_empty()
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    pub fn last_review(&self) -> Option<&ReviewEntry> {
        self.review_history.last()
    }
}

/// Per-language activity totals and streak for one user.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityLedger {
    pub id: LedgerId,
    pub user_id: UserId,
    pub language: String,

    pub streak_days: u32,
    pub last_activity: Option<DateTime<Utc>>,
    /// Minutes.
    pub total_time_spent: u64,

    // Maintained by vocabulary, exercise and test bookkeeping.
    pub vocabulary_learned: u32,
    pub vocabulary_mastered: u32,
    pub exercises_done: u32,
    pub tests_done: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl ActivityLedger {
    pub fn new(user_id: impl Into<UserId>, language: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            language: language.into(),
            streak_days: 0,
            last_activity: None,
            total_time_spent: 0,
            vocabulary_learned: 0,
            vocabulary_mastered: 0,
            exercises_done: 0,
            tests_done: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_parses_case_insensitively() {
        assert_eq!("Good".parse::<Grade>().unwrap(), Grade::Good);
        assert_eq!(" EASY ".parse::<Grade>().unwrap(), Grade::Easy);
        assert_eq!(
            "medium".parse::<Grade>().unwrap_err(),
            CoreError::InvalidGrade("medium".into())
        );
    }

    #[test]
    fn new_card_is_due_immediately() {
        let now = Utc::now();
        let card = ReviewCard::new("u1", "v1", now);
        assert_eq!(card.status, CardStatus::New);
        assert_eq!(card.interval_days, 1);
        assert_eq!(card.ease_factor, EF_DEFAULT);
        assert!(card.is_due(now));
        assert!(card.is_new());
        assert_eq!(card.version, 0);
    }

    #[test]
    fn status_round_trips_through_text() {
        for s in CardStatus::ALL {
            assert_eq!(s.as_str().parse::<CardStatus>().unwrap(), s);
        }
    }
}
