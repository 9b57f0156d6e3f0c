use chrono::{Duration, TimeZone, Utc};
use lingua_core::memory::MemoryRepo;
use lingua_core::workflow::{
    create_card, due_cards, record_daily_activity, submit_review, user_statistics, user_streak,
};
use lingua_core::{CardStatus, Clock, CoreError, FixedClock, Repository};

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap())
}

#[tokio::test]
async fn review_round_trip_persists_all_fields() {
    let repo = MemoryRepo::new();
    let clock = clock();
    let card = create_card(&repo, &clock, "u1", "hola").await.unwrap();
    assert_eq!(card.status, CardStatus::New);

    clock.advance(Duration::hours(2));
    let reviewed = submit_review(&repo, &clock, "u1", card.id, "good").await.unwrap();
    let stored = repo.get_card("u1", card.id).await.unwrap();

    assert_eq!(stored, reviewed);
    assert_eq!(stored.interval_days, 3);
    assert_eq!(stored.status, CardStatus::Learning);
    assert_eq!(stored.next_review_at, clock.now() + Duration::days(3));
    assert_eq!(stored.review_history.len(), 1);
    assert_eq!(stored.version, card.version + 1);
}

#[tokio::test]
async fn invalid_grade_leaves_card_untouched() {
    let repo = MemoryRepo::new();
    let clock = clock();
    let card = create_card(&repo, &clock, "u1", "hola").await.unwrap();

    let err = submit_review(&repo, &clock, "u1", card.id, "perfect").await.unwrap_err();
    assert_eq!(err, CoreError::InvalidGrade("perfect".into()));
    assert_eq!(repo.get_card("u1", card.id).await.unwrap(), card);
}

#[tokio::test]
async fn other_users_cards_are_not_found() {
    let repo = MemoryRepo::new();
    let clock = clock();
    let card = create_card(&repo, &clock, "u1", "hola").await.unwrap();

    let err = submit_review(&repo, &clock, "u2", card.id, "good").await.unwrap_err();
    assert_eq!(err, CoreError::NotFound("card"));
    assert!(repo.delete_card("u2", card.id).await.is_err());
    repo.delete_card("u1", card.id).await.unwrap();
    assert!(repo.get_card("u1", card.id).await.is_err());
}

#[tokio::test]
async fn duplicate_card_is_rejected() {
    let repo = MemoryRepo::new();
    let clock = clock();
    create_card(&repo, &clock, "u1", "hola").await.unwrap();
    let err = create_card(&repo, &clock, "u1", "hola").await.unwrap_err();
    assert_eq!(err, CoreError::AlreadyExists("flashcard"));
    assert!(!err.is_conflict());
    create_card(&repo, &clock, "u2", "hola").await.unwrap();
}

#[tokio::test]
async fn stale_save_is_rejected() {
    let repo = MemoryRepo::new();
    let clock = clock();
    let card = create_card(&repo, &clock, "u1", "hola").await.unwrap();

    let first = lingua_core::apply_review(&card, lingua_core::Grade::Good, clock.now());
    let second = lingua_core::apply_review(&card, lingua_core::Grade::Again, clock.now());
    repo.save_card(&first.updated_card).await.unwrap();
    let err = repo.save_card(&second.updated_card).await.unwrap_err();

    assert!(err.is_conflict());
    let stored = repo.get_card("u1", card.id).await.unwrap();
    assert_eq!(stored.interval_days, 3);
    assert_eq!(stored.review_history.len(), 1);
}

#[tokio::test]
async fn due_cards_returns_first_page_in_order() {
    let repo = MemoryRepo::new();
    let clock = clock();
    for i in 0..25 {
        create_card(&repo, &clock, "u1", &format!("word-{i}")).await.unwrap();
        clock.advance(Duration::minutes(1));
    }
    create_card(&repo, &clock, "u2", "other").await.unwrap();

    let due: Vec<_> = due_cards(&repo, &clock, "u1").await.unwrap().collect();
    assert_eq!(due.len(), 20);
    assert!(due.iter().all(|c| c.user_id == "u1"));
    assert!(due.windows(2).all(|w| w[0].next_review_at <= w[1].next_review_at));
    assert_eq!(due[0].vocabulary_id, "word-0");
}

#[tokio::test]
async fn reviewed_card_leaves_due_list() {
    let repo = MemoryRepo::new();
    let clock = clock();
    let card = create_card(&repo, &clock, "u1", "hola").await.unwrap();
    submit_review(&repo, &clock, "u1", card.id, "easy").await.unwrap();

    assert_eq!(due_cards(&repo, &clock, "u1").await.unwrap().count(), 0);
    clock.advance(Duration::days(4));
    assert_eq!(due_cards(&repo, &clock, "u1").await.unwrap().count(), 1);
}

#[tokio::test]
async fn activity_creates_ledger_then_tracks_streak() {
    let repo = MemoryRepo::new();
    let clock = clock();

    let l = record_daily_activity(&repo, &clock, "u1", "es", Some(15)).await.unwrap();
    assert_eq!(l.streak_days, 1);
    assert_eq!(l.version, 1);

    clock.advance(Duration::hours(1));
    let l = record_daily_activity(&repo, &clock, "u1", "es", None).await.unwrap();
    assert_eq!(l.streak_days, 1);
    assert_eq!(l.last_activity, Some(clock.now()));

    clock.advance(Duration::days(1));
    let l = record_daily_activity(&repo, &clock, "u1", "es", Some(5)).await.unwrap();
    assert_eq!(l.streak_days, 2);
    assert_eq!(l.total_time_spent, 20);

    record_daily_activity(&repo, &clock, "u1", "fr", Some(30)).await.unwrap();
    let summary = user_streak(&repo, &clock, "u1").await.unwrap();
    assert_eq!(summary.current_streak, 2);
    assert!(summary.has_activity_today);

    let stats = user_statistics(&repo, "u1").await.unwrap();
    assert_eq!(stats.overall.total_time_spent, 50);
    assert_eq!(stats.by_language.len(), 2);
}

#[tokio::test]
async fn activity_input_is_validated_before_loading() {
    let repo = MemoryRepo::new();
    let clock = clock();

    let err = record_daily_activity(&repo, &clock, "u1", "es", Some(-3)).await.unwrap_err();
    assert_eq!(err, CoreError::InvalidDuration(-3));
    let err = record_daily_activity(&repo, &clock, "u1", "  ", Some(3)).await.unwrap_err();
    assert_eq!(err, CoreError::Invalid("language is required"));
    assert!(repo.list_ledgers("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_first_activity_loses_cleanly() {
    let repo = MemoryRepo::new();
    let now = clock().now();
    let a = lingua_core::ActivityLedger::new("u1", "es", now);
    let b = lingua_core::ActivityLedger::new("u1", "es", now);

    repo.save_ledger(&a).await.unwrap();
    let err = repo.save_ledger(&b).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn streak_follows_utc_midnight_not_elapsed_hours() {
    let repo = MemoryRepo::new();
    let clock = clock();

    clock.set(Utc.with_ymd_and_hms(2024, 3, 10, 23, 55, 0).unwrap());
    record_daily_activity(&repo, &clock, "u1", "ja", Some(5)).await.unwrap();

    clock.set(Utc.with_ymd_and_hms(2024, 3, 11, 0, 5, 0).unwrap());
    let l = record_daily_activity(&repo, &clock, "u1", "ja", Some(5)).await.unwrap();
    assert_eq!(l.streak_days, 2);

    clock.set(Utc.with_ymd_and_hms(2024, 3, 12, 23, 59, 0).unwrap());
    let l = record_daily_activity(&repo, &clock, "u1", "ja", None).await.unwrap();
    assert_eq!(l.streak_days, 3);
    assert_eq!(l.total_time_spent, 10);
}
