use crate::{ActivityLedger, CardId, CoreError, ReviewCard};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

/// Persistence seam for cards and ledgers.
///
/// Saves are compare-and-swap on `version`: the stored record must still carry
/// the version the caller loaded, otherwise the save fails with
/// [`CoreError::Conflict`] and nothing is written. A successful save returns
/// the record with its bumped version.
#[async_trait]
pub trait Repository: Send + Sync {
    // Cards
    async fn create_card(
        &self,
        user_id: &str,
        vocabulary_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewCard, CoreError>;
    async fn get_card(&self, user_id: &str, id: CardId) -> Result<ReviewCard, CoreError>;
    /// All of a user's cards, earliest due first.
    async fn list_cards(&self, user_id: &str) -> Result<Vec<ReviewCard>, CoreError>;
    /// Cards with `next_review_at <= now`, earliest due first, at most `limit`.
    async fn due_cards(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReviewCard>, CoreError>;
    async fn save_card(&self, card: &ReviewCard) -> Result<ReviewCard, CoreError>;
    async fn delete_card(&self, user_id: &str, id: CardId) -> Result<(), CoreError>;

    // Activity ledgers
    async fn get_ledger(&self, user_id: &str, language: &str) -> Result<ActivityLedger, CoreError>;
    async fn list_ledgers(&self, user_id: &str) -> Result<Vec<ActivityLedger>, CoreError>;
    /// Inserts when `ledger.version == 0` and no ledger exists for its key.
    async fn save_ledger(&self, ledger: &ActivityLedger) -> Result<ActivityLedger, CoreError>;
}

/// Version to store after a save, given what is currently stored.
pub fn bump_version(
    stored: Option<u64>,
    incoming: u64,
    what: &'static str,
) -> Result<u64, CoreError> {
    match stored {
        None if incoming == 0 => Ok(1),
        None => Err(CoreError::NotFound(what)),
        Some(v) if v == incoming => Ok(v + 1),
        Some(_) => Err(CoreError::Conflict(what)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_rules() {
        assert_eq!(bump_version(None, 0, "ledger"), Ok(1));
        assert_eq!(bump_version(None, 3, "ledger"), Err(CoreError::NotFound("ledger")));
        assert_eq!(bump_version(Some(3), 3, "card"), Ok(4));
        assert_eq!(bump_version(Some(4), 3, "card"), Err(CoreError::Conflict("card")));
        assert_eq!(bump_version(Some(1), 0, "ledger"), Err(CoreError::Conflict("ledger")));
    }
}
