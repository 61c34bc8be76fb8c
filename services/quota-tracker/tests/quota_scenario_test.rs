use std::sync::Arc;

use chrono::{TimeZone, Utc};
use guardrails_quota_tracker::{
    Clock, ManualClock, QuotaRecord, QuotaStatus, QuotaStore, QuotaTracker, SqliteQuotaStore,
};
use tempfile::tempdir;

fn status(allowed: bool, remaining: u64, used: u64) -> QuotaStatus {
    QuotaStatus {
        allowed,
        remaining,
        limit: 15,
        used,
    }
}

#[tokio::test]
async fn test_daily_limit_scenario_on_sqlite() {
    let temp = tempdir().expect("failed to create temp dir");
    let store = Arc::new(SqliteQuotaStore::open(temp.path()).unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 22, 45, 0).unwrap(),
    ));
    let tracker = QuotaTracker::with_clock(store.clone(), clock.clone(), 15);

    assert_eq!(tracker.check_quota("u1").await.unwrap(), status(true, 15, 0));

    for _ in 0..15 {
        tracker.increment_quota("u1").await.unwrap();
    }
    assert_eq!(tracker.check_quota("u1").await.unwrap(), status(false, 0, 15));

    clock.advance_days(1);
    assert_eq!(tracker.check_quota("u1").await.unwrap(), status(true, 15, 0));

    // The stale row is only rewritten by the next action.
    let row = store.get("u1").await.unwrap().expect("row should exist");
    assert_eq!(row.count, 15);
    assert!(!row.is_fresh(clock.today()));

    let usage = tracker.increment_quota("u1").await.unwrap();
    assert_eq!(usage.used, 1);
    assert_eq!(usage.remaining, 14);
}

#[tokio::test]
async fn test_rollover_happens_at_utc_midnight_not_after_24_hours() {
    let temp = tempdir().expect("failed to create temp dir");
    let store = Arc::new(SqliteQuotaStore::open(temp.path()).unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 23, 59, 0).unwrap(),
    ));
    let tracker = QuotaTracker::with_clock(store, clock.clone(), 15);

    for _ in 0..15 {
        tracker.claim_slot("u1").await.unwrap();
    }
    assert!(tracker.claim_slot("u1").await.is_err());
    assert_eq!(
        tracker.resets_at(),
        Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap()
    );

    clock.advance(chrono::Duration::minutes(2));
    let usage = tracker.claim_slot("u1").await.unwrap();
    assert_eq!(usage.used, 1);
}

#[tokio::test]
async fn test_seeded_stale_row_is_reset_on_increment() {
    let temp = tempdir().expect("failed to create temp dir");
    let store = Arc::new(SqliteQuotaStore::open(temp.path()).unwrap());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap(),
    ));
    let tracker = QuotaTracker::with_clock(store.clone(), clock.clone(), 15);

    // Fill yesterday's row through the store itself.
    let yesterday = clock.today().pred_opt().unwrap();
    for _ in 0..15 {
        store.increment_or_reset("u1", yesterday).await.unwrap();
    }
    let seeded: QuotaRecord = store.get("u1").await.unwrap().unwrap();
    assert_eq!(seeded.count, 15);
    assert_eq!(seeded.last_action_date, yesterday);

    assert_eq!(tracker.check_quota("u1").await.unwrap(), status(true, 15, 0));

    let usage = tracker.increment_quota("u1").await.unwrap();
    assert_eq!(usage.used, 1);

    let row = store.get("u1").await.unwrap().unwrap();
    assert_eq!(row.count, 1);
    assert_eq!(row.last_action_date, clock.today());
}
