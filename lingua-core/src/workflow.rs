//! Load, apply, save.
//!
//! Each function reads the clock once and performs at most one save. A
//! [`CoreError::Conflict`] from the save is returned as is; retrying with a
//! fresh load is up to the caller.

use crate::filters::{DueCards, DUE_PAGE_SIZE};
use crate::scheduler::apply_review;
use crate::stats::{learning_statistics, LearningStatistics};
use crate::streak::{record_activity, streak_summary, StreakSummary};
use crate::{ActivityLedger, CardId, Clock, CoreError, Grade, Repository, ReviewCard};
use tracing::{debug, info};

pub async fn create_card<R: Repository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    vocabulary_id: &str,
) -> Result<ReviewCard, CoreError> {
    let vocabulary_id = vocabulary_id.trim();
    if vocabulary_id.is_empty() {
        return Err(CoreError::Invalid("vocabulary id is required"));
    }
    let card = repo.create_card(user_id, vocabulary_id, clock.now()).await?;
    info!(user = user_id, card = %card.id, vocabulary = vocabulary_id, "flashcard created");
    Ok(card)
}

pub async fn submit_review<R: Repository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    card_id: CardId,
    grade: &str,
) -> Result<ReviewCard, CoreError> {
    let grade: Grade = grade.parse()?;
    let now = clock.now();
    let card = repo.get_card(user_id, card_id).await?;
    let outcome = apply_review(&card, grade, now);
    let saved = repo.save_card(&outcome.updated_card).await?;
    info!(
        user = user_id,
        card = %saved.id,
        %grade,
        interval_days = saved.interval_days,
        ease_factor = saved.ease_factor,
        status = %saved.status,
        "review applied"
    );
    Ok(saved)
}

pub async fn due_cards<R: Repository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
) -> Result<DueCards, CoreError> {
    let now = clock.now();
    let rows = repo.due_cards(user_id, now, DUE_PAGE_SIZE).await?;
    debug!(user = user_id, count = rows.len(), "due cards loaded");
    Ok(DueCards::from_ordered(rows))
}

pub async fn record_daily_activity<R: Repository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
    language: &str,
    minutes_spent: Option<i64>,
) -> Result<ActivityLedger, CoreError> {
    let language = language.trim();
    if language.is_empty() {
        return Err(CoreError::Invalid("language is required"));
    }
    if let Some(m) = minutes_spent.filter(|m| *m < 0) {
        return Err(CoreError::InvalidDuration(m));
    }

    let now = clock.now();
    let ledger = match repo.get_ledger(user_id, language).await {
        Ok(l) => l,
        Err(CoreError::NotFound(_)) => ActivityLedger::new(user_id, language, now),
        Err(e) => return Err(e),
    };
    let (updated, change) = record_activity(&ledger, minutes_spent, now)?;
    let saved = repo.save_ledger(&updated).await?;
    info!(
        user = user_id,
        language,
        streak_days = saved.streak_days,
        ?change,
        total_time_spent = saved.total_time_spent,
        "activity recorded"
    );
    Ok(saved)
}

pub async fn user_streak<R: Repository + ?Sized>(
    repo: &R,
    clock: &dyn Clock,
    user_id: &str,
) -> Result<StreakSummary, CoreError> {
    let ledgers = repo.list_ledgers(user_id).await?;
    Ok(streak_summary(&ledgers, clock.now()))
}

pub async fn user_statistics<R: Repository + ?Sized>(
    repo: &R,
    user_id: &str,
) -> Result<LearningStatistics, CoreError> {
    let ledgers = repo.list_ledgers(user_id).await?;
    Ok(learning_statistics(&ledgers))
}
