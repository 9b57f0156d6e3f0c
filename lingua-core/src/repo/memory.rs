use crate::filters::{select_due, sort_by_due};
use crate::repo::bump_version;
use crate::{ActivityLedger, CardId, CoreError, ReviewCard, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryRepo {
    cards: RwLock<HashMap<CardId, ReviewCard>>,
    ledgers: RwLock<HashMap<(UserId, String), ActivityLedger>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl crate::repo::Repository for MemoryRepo {
    async fn create_card(
        &self,
        user_id: &str,
        vocabulary_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewCard, CoreError> {
        let mut m = self.cards.write();
        if m
            .values()
            .any(|c| c.user_id == user_id && c.vocabulary_id == vocabulary_id)
        {
            return Err(CoreError::AlreadyExists("flashcard"));
        }
        let mut card = ReviewCard::new(user_id, vocabulary_id, now);
        card.version = 1;
        m.insert(card.id, card.clone());
        Ok(card)
    }

    async fn get_card(&self, user_id: &str, id: CardId) -> Result<ReviewCard, CoreError> {
        self.cards
            .read()
            .get(&id)
            .filter(|c| c.user_id == user_id)
            .cloned()
            .ok_or(CoreError::NotFound("card"))
    }

    async fn list_cards(&self, user_id: &str) -> Result<Vec<ReviewCard>, CoreError> {
        let mut v: Vec<ReviewCard> = self
            .cards
            .read()
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        sort_by_due(&mut v);
        Ok(v)
    }

    async fn due_cards(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<ReviewCard>, CoreError> {
        let mine = self.list_cards(user_id).await?;
        Ok(select_due(&mine, now, limit))
    }

    async fn save_card(&self, card: &ReviewCard) -> Result<ReviewCard, CoreError> {
        let mut m = self.cards.write();
        let Some(stored) = m.get(&card.id) else {
            return Err(CoreError::NotFound("card"));
        };
        let version = bump_version(Some(stored.version), card.version, "card")?;
        let mut saved = card.clone();
        saved.version = version;
        m.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn delete_card(&self, user_id: &str, id: CardId) -> Result<(), CoreError> {
        let mut m = self.cards.write();
        match m.get(&id) {
            Some(c) if c.user_id == user_id => {
                m.remove(&id);
                Ok(())
            }
            _ => Err(CoreError::NotFound("card")),
        }
    }

    async fn get_ledger(&self, user_id: &str, language: &str) -> Result<ActivityLedger, CoreError> {
        self.ledgers
            .read()
            .get(&(user_id.to_string(), language.to_string()))
            .cloned()
            .ok_or(CoreError::NotFound("progress"))
    }

    async fn list_ledgers(&self, user_id: &str) -> Result<Vec<ActivityLedger>, CoreError> {
        let mut v: Vec<ActivityLedger> = self
            .ledgers
            .read()
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(v)
    }

    async fn save_ledger(&self, ledger: &ActivityLedger) -> Result<ActivityLedger, CoreError> {
        let key = (ledger.user_id.clone(), ledger.language.clone());
        let mut m = self.ledgers.write();
        let version = bump_version(m.get(&key).map(|l| l.version), ledger.version, "progress")?;
        let mut saved = ledger.clone();
        saved.version = version;
        m.insert(key, saved.clone());
        Ok(saved)
    }
}
