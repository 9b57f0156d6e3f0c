use chrono::{Duration, TimeZone, Utc};
use lingua_core::workflow::{create_card, record_daily_activity, submit_review};
use lingua_core::{ActivityLedger, CardStatus, Clock, FixedClock, Repository};
use lingua_json::JsonStore;
use lingua_core::{apply_review, Grade};
use std::path::Path;
use std::sync::Arc;

async fn open(dir: &Path) -> JsonStore {
    JsonStore::open_with(dir.join("lingua.json"), dir.join("backups"), 3)
        .await
        .unwrap()
}

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
}

#[tokio::test]
async fn reviews_and_ledgers_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = clock();

    let card_id = {
        let store = open(dir.path()).await;
        let card = create_card(&store, &clock, "u1", "hola").await.unwrap();
        submit_review(&store, &clock, "u1", card.id, "easy").await.unwrap();
        record_daily_activity(&store, &clock, "u1", "es", Some(25)).await.unwrap();
        card.id
    };

    let store = open(dir.path()).await;
    let card = store.get_card("u1", card_id).await.unwrap();
    assert_eq!(card.interval_days, 4);
    assert_eq!(card.ease_factor, 2.65);
    assert_eq!(card.status, CardStatus::Learning);
    assert_eq!(card.review_history.len(), 1);
    assert_eq!(card.version, 2);

    let ledger = store.get_ledger("u1", "es").await.unwrap();
    assert_eq!(ledger.streak_days, 1);
    assert_eq!(ledger.total_time_spent, 25);
}

#[tokio::test]
async fn stale_version_is_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path()).await;
    let now = clock().now();

    let ledger = ActivityLedger::new("u1", "fr", now);
    let saved = store.save_ledger(&ledger).await.unwrap();
    let mut ahead = saved.clone();
    ahead.total_time_spent = 10;
    store.save_ledger(&ahead).await.unwrap();

    let mut stale = saved;
    stale.total_time_spent = 99;
    let err = store.save_ledger(&stale).await.unwrap_err();
    assert!(err.is_conflict());

    let reopened = open(dir.path()).await;
    let stored = reopened.get_ledger("u1", "fr").await.unwrap();
    assert_eq!(stored.total_time_spent, 10);
    assert_eq!(stored.version, 2);
}

#[tokio::test]
async fn backups_are_rotated() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path()).await;
    let clock = clock();
    for i in 0..6 {
        create_card(&store, &clock, "u1", &format!("w{i}")).await.unwrap();
        clock.advance(Duration::minutes(1));
    }
    let backups = std::fs::read_dir(dir.path().join("backups")).unwrap().count();
    assert!(backups <= 3, "kept {backups} backups");
}

#[tokio::test]
async fn missing_card_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path()).await;
    let err = store.get_card("u1", uuid::Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err, lingua_core::CoreError::NotFound("card"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_creates_all_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(dir.path()).await);
    let now = clock().now();

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create_card("u1", &format!("w{i}"), now).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(store.list_cards("u1").await.unwrap().len(), 32);

    let reopened = open(dir.path()).await;
    let cards = reopened.list_cards("u1").await.unwrap();
    assert_eq!(cards.len(), 32);
    assert!(cards.iter().all(|c| c.version == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ledger_updates_keep_acknowledged_versions() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(dir.path()).await);
    let clock = Arc::new(clock());

    let handles: Vec<_> = ["es", "fr", "de", "it"]
        .into_iter()
        .map(|lang| {
            let store = store.clone();
            let clock = clock.clone();
            tokio::spawn(async move {
                let mut last = None;
                for _ in 0..5 {
                    last = Some(
                        record_daily_activity(&*store, &*clock, "u1", lang, Some(2))
                            .await
                            .unwrap(),
                    );
                }
                last.unwrap()
            })
        })
        .collect();
    let mut acknowledged = Vec::new();
    for h in handles {
        acknowledged.push(h.await.unwrap());
    }

    let reopened = open(dir.path()).await;
    for ack in acknowledged {
        let stored = reopened.get_ledger("u1", &ack.language).await.unwrap();
        assert_eq!(stored.version, 5);
        assert_eq!(stored, ack);
        assert_eq!(stored.total_time_spent, 10);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_card_saves_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open(dir.path()).await);
    let clock = clock();
    let card = create_card(&*store, &clock, "u1", "hola").await.unwrap();

    let handles: Vec<_> = [Grade::Again, Grade::Hard, Grade::Good, Grade::Easy]
        .into_iter()
        .map(|grade| {
            let store = store.clone();
            let updated = apply_review(&card, grade, clock.now()).updated_card;
            tokio::spawn(async move { store.save_card(&updated).await })
        })
        .collect();
    let mut winners = Vec::new();
    for h in handles {
        match h.await.unwrap() {
            Ok(saved) => winners.push(saved),
            Err(e) => assert!(e.is_conflict(), "unexpected error {e:?}"),
        }
    }
    assert_eq!(winners.len(), 1);

    let reopened = open(dir.path()).await;
    let stored = reopened.get_card("u1", card.id).await.unwrap();
    assert_eq!(stored, winners[0]);
    assert_eq!(stored.version, 2);
    assert_eq!(stored.review_history.len(), 1);
}
