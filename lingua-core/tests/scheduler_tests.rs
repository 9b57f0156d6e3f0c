use chrono::{DateTime, Duration, TimeZone, Utc};
use lingua_core::{apply_review, status_for, CardStatus, Grade, ReviewCard, EF_MIN};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 18, 30, 0).unwrap()
}

fn card(interval: u32, ef: f64) -> ReviewCard {
    let mut c = ReviewCard::new("user-1", "vocab-1", t0() - Duration::days(40));
    c.interval_days = interval;
    c.ease_factor = ef;
    c
}

#[test]
fn good_from_fresh_card() {
    let out = apply_review(&card(1, 2.5), Grade::Good, t0());
    let c = out.updated_card;

    assert_eq!(c.interval_days, 3);
    assert_eq!(c.ease_factor, 2.5);
    assert_eq!(c.status, CardStatus::Learning);
    assert_eq!(c.next_review_at, t0() + Duration::days(3));
}

#[test]
fn again_resets_interval_and_lowers_ease() {
    let c = apply_review(&card(10, 2.0), Grade::Again, t0()).updated_card;

    assert_eq!(c.interval_days, 1);
    assert_eq!(c.ease_factor, 1.8);
    assert_eq!(c.status, CardStatus::Learning);
    assert_eq!(c.next_review_at, t0() + Duration::days(1));
}

#[test]
fn easy_can_master_a_card() {
    let c = apply_review(&card(25, 2.5), Grade::Easy, t0()).updated_card;

    assert_eq!(c.interval_days, 82);
    assert_eq!(c.ease_factor, 2.65);
    assert_eq!(c.status, CardStatus::Mastered);
}

#[test]
fn history_records_each_review_in_order() {
    let mut c = card(1, 2.5);
    let grades = [Grade::Good, Grade::Hard, Grade::Again, Grade::Easy];
    for (i, g) in grades.iter().enumerate() {
        let when = t0() + Duration::days(i as i64);
        c = apply_review(&c, *g, when).updated_card;
    }

    let logged: Vec<Grade> = c.review_history.iter().map(|e| e.grade).collect();
    assert_eq!(logged, grades.to_vec());
    assert!(c
        .review_history
        .windows(2)
        .all(|w| w[0].reviewed_at < w[1].reviewed_at));
    let last = c.last_review().unwrap();
    assert_eq!(last.grade, Grade::Easy);
    assert_eq!(last.reviewed_at, t0() + Duration::days(3));
}

#[test]
fn invariants_hold_for_every_grade_from_many_states() {
    let intervals = [1u32, 2, 6, 7, 29, 30, 365];
    let eases = [EF_MIN, 1.35, 1.5, 2.5, 3.1];
    for &interval in &intervals {
        for &ef in &eases {
            for g in Grade::ALL {
                let c = apply_review(&card(interval, ef), g, t0()).updated_card;
                assert!(c.ease_factor >= EF_MIN, "ef {} after {g} from ({interval}, {ef})", c.ease_factor);
                assert!(c.interval_days >= 1);
                assert_eq!(c.status, status_for(c.interval_days));
                assert_eq!(c.next_review_at, t0() + Duration::days(i64::from(c.interval_days)));
            }
        }
    }
}

#[test]
fn repeated_again_stays_at_floor() {
    let mut c = card(3, 1.5);
    for _ in 0..5 {
        c = apply_review(&c, Grade::Again, t0()).updated_card;
    }
    assert_eq!(c.ease_factor, EF_MIN);
    assert_eq!(c.interval_days, 1);
}
