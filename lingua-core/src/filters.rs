use crate::{CardStatus, ReviewCard};
use chrono::{DateTime, Utc};

pub const DUE_PAGE_SIZE: usize = 20;

/// Due cards taken from a single snapshot, earliest first.
///
/// Consuming and finite: once drained it stays empty, and later writes to the
/// store are never observed.
#[derive(Debug)]
pub struct DueCards {
    inner: std::vec::IntoIter<ReviewCard>,
}

impl DueCards {
    pub fn from_snapshot(cards: Vec<ReviewCard>, now: DateTime<Utc>, limit: usize) -> Self {
        let mut due: Vec<ReviewCard> = cards.into_iter().filter(|c| c.is_due(now)).collect();
        sort_by_due(&mut due);
        due.truncate(limit);
        Self {
            inner: due.into_iter(),
        }
    }

    /// Wraps rows a backend already filtered and ordered.
    pub fn from_ordered(cards: Vec<ReviewCard>) -> Self {
        Self {
            inner: cards.into_iter(),
        }
    }
}

impl Iterator for DueCards {
    type Item = ReviewCard;

    fn next(&mut self) -> Option<ReviewCard> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DueCards {}

pub fn select_due(cards: &[ReviewCard], now: DateTime<Utc>, limit: usize) -> Vec<ReviewCard> {
    DueCards::from_snapshot(cards.to_vec(), now, limit).collect()
}

pub fn sort_by_due(cards: &mut [ReviewCard]) {
    cards.sort_by_key(|c| (c.next_review_at, c.created_at));
}

pub fn filter_by_status(cards: &[ReviewCard], want: CardStatus) -> Vec<ReviewCard> {
    cards.iter().filter(|c| c.status == want).cloned().collect()
}
