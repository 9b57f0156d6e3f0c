use chrono::{DateTime, Utc};
use lingua_core::{ActivityLedger, CardStatus, Grade, ReviewCard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
pub struct ReviewEntryOut {
    pub reviewed_at: DateTime<Utc>,
    pub grade: Grade,
}

#[derive(Serialize, Deserialize)]
pub struct CardOut {
    pub id: Uuid,
    pub vocabulary_id: String,
    pub status: CardStatus,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub next_review_at: DateTime<Utc>,
    pub review_history: Vec<ReviewEntryOut>,
    pub created_at: DateTime<Utc>,
}

impl From<ReviewCard> for CardOut {
    fn from(c: ReviewCard) -> Self {
        Self {
            id: c.id,
            vocabulary_id: c.vocabulary_id,
            status: c.status,
            ease_factor: c.ease_factor,
            interval_days: c.interval_days,
            next_review_at: c.next_review_at,
            review_history: c
                .review_history
                .into_iter()
                .map(|e| ReviewEntryOut {
                    reviewed_at: e.reviewed_at,
                    grade: e.grade,
                })
                .collect(),
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct LedgerOut {
    pub language: String,
    pub streak_days: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub total_time_spent: u64,
    pub vocabulary_learned: u32,
    pub vocabulary_mastered: u32,
    pub exercises_done: u32,
    pub tests_done: u32,
}

impl From<ActivityLedger> for LedgerOut {
    fn from(l: ActivityLedger) -> Self {
        Self {
            language: l.language,
            streak_days: l.streak_days,
            last_activity: l.last_activity,
            total_time_spent: l.total_time_spent,
            vocabulary_learned: l.vocabulary_learned,
            vocabulary_mastered: l.vocabulary_mastered,
            exercises_done: l.exercises_done,
            tests_done: l.tests_done,
        }
    }
}

#[derive(Deserialize)]
pub struct NewCardIn {
    pub vocabulary_id: String,
}

/// Grade arrives as free text so that unknown values surface as
/// `invalid_grade` rather than a body-parsing rejection.
#[derive(Deserialize)]
pub struct ReviewIn {
    pub grade: String,
}

#[derive(Deserialize)]
pub struct ActivityIn {
    pub language: String,
    #[serde(default)]
    pub time_spent: Option<i64>,
}

#[derive(Serialize, Deserialize)]
pub struct ActivityOut {
    pub message: String,
    pub language: String,
    pub streak_days: u32,
    pub total_time_spent: u64,
}

#[derive(Serialize, Deserialize)]
pub struct MessageOut {
    pub message: String,
}
