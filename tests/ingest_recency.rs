// tests/ingest_recency.rs
use chrono::{Duration, TimeZone, Utc};
use lead_harvester::ingest::filter_recent;
use lead_harvester::{Lead, Location};

fn at(name: &str, posted: Option<chrono::DateTime<Utc>>) -> Lead {
    let mut l = Lead::new(name, Location::default());
    l.posted_at = posted;
    l
}

#[test]
fn unknown_posting_time_is_never_filtered() {
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    for days in [0, 1, 2, 3, 30] {
        let (kept, removed) = filter_recent(vec![at("x", None), at("y", None)], now, days);
        assert_eq!(kept.len(), 2, "days={days}");
        assert_eq!(removed, 0);
    }
}

#[test]
fn cutoff_instant_is_inclusive() {
    let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
    let cutoff = now - Duration::days(1);

    let (kept, _) = filter_recent(vec![at("edge", Some(cutoff))], now, 1);
    assert_eq!(kept.len(), 1);

    let (kept, removed) = filter_recent(
        vec![at("old", Some(cutoff - Duration::milliseconds(1)))],
        now,
        1,
    );
    assert!(kept.is_empty());
    assert_eq!(removed, 1);
}

#[test]
fn wider_window_keeps_more() {
    let now = Utc::now();
    let list = vec![
        at("today", Some(now - Duration::hours(2))),
        at("two-days", Some(now - Duration::hours(47))),
        at("week", Some(now - Duration::days(7))),
    ];
    let (one, _) = filter_recent(list.clone(), now, 1);
    let (three, _) = filter_recent(list, now, 3);
    assert_eq!(one.len(), 1);
    assert_eq!(three.len(), 2);
}
