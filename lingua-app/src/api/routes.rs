use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use lingua_core::{
    workflow::{
        create_card, due_cards, record_daily_activity, submit_review, user_statistics, user_streak,
    },
    Clock, LearningStatistics, Repository, StreakSummary,
};

use crate::api::dto::{ActivityIn, ActivityOut, CardOut, LedgerOut, MessageOut, NewCardIn, ReviewIn};
use crate::api::error::{ApiError, Result};
use crate::retry::retry_on_conflict;

pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub clock: Arc<dyn Clock>,
    pub max_attempts: u32,
}

/// Caller identity, set by the authenticating proxy in front of the API.
pub struct CurrentUser(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CurrentUser(v.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}

fn parse_card_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid card id: {raw}")))
}

pub async fn list_flashcards(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CardOut>>> {
    let cards = st.repo.list_cards(&user).await?;
    Ok(Json(cards.into_iter().map(CardOut::from).collect()))
}

pub async fn due_flashcards(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CardOut>>> {
    let due = due_cards(&*st.repo, st.clock.as_ref(), &user).await?;
    Ok(Json(due.map(CardOut::from).collect()))
}

pub async fn create_flashcard(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<NewCardIn>,
) -> Result<(StatusCode, Json<CardOut>)> {
    let card = create_card(&*st.repo, st.clock.as_ref(), &user, &body.vocabulary_id).await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

pub async fn review_flashcard(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<String>,
    Json(body): Json<ReviewIn>,
) -> Result<Json<CardOut>> {
    let id = parse_card_id(&card_id)?;
    let card = retry_on_conflict(st.max_attempts, || {
        submit_review(&*st.repo, st.clock.as_ref(), &user, id, &body.grade)
    })
    .await?;
    Ok(Json(card.into()))
}

pub async fn delete_flashcard(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(card_id): Path<String>,
) -> Result<Json<MessageOut>> {
    let id = parse_card_id(&card_id)?;
    st.repo.delete_card(&user, id).await?;
    tracing::info!(user = %user, card = %id, "flashcard deleted");
    Ok(Json(MessageOut {
        message: "Flashcard deleted successfully".to_string(),
    }))
}

pub async fn list_progress(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<LedgerOut>>> {
    let ledgers = st.repo.list_ledgers(&user).await?;
    Ok(Json(ledgers.into_iter().map(LedgerOut::from).collect()))
}

pub async fn progress_by_language(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(language): Path<String>,
) -> Result<Json<LedgerOut>> {
    let ledger = st.repo.get_ledger(&user, &language).await?;
    Ok(Json(ledger.into()))
}

pub async fn streak(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<StreakSummary>> {
    Ok(Json(user_streak(&*st.repo, st.clock.as_ref(), &user).await?))
}

pub async fn statistics(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<LearningStatistics>> {
    Ok(Json(user_statistics(&*st.repo, &user).await?))
}

pub async fn record_activity(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<ActivityIn>,
) -> Result<Json<ActivityOut>> {
    let ledger = retry_on_conflict(st.max_attempts, || {
        record_daily_activity(&*st.repo, st.clock.as_ref(), &user, &body.language, body.time_spent)
    })
    .await?;
    Ok(Json(ActivityOut {
        message: "Daily activity updated successfully".to_string(),
        language: ledger.language,
        streak_days: ledger.streak_days,
        total_time_spent: ledger.total_time_spent,
    }))
}
