// src/tests/notify_tests.rs
use crate::db::listings;
use crate::notifications::sink::{OutgoingMessage, ParseMode};
use crate::notifications::{NotificationSink, Notifier, NotifierSettings, NotifyReport, SinkError};
use crate::tests::utils::{listing, make_db, RecordingSink};
use chrono::{Duration, TimeZone, Utc};

fn settings(batch_limit: usize) -> NotifierSettings {
    NotifierSettings {
        chat_id: "-100123".into(),
        batch_limit,
        disable_link_preview: false,
    }
}

#[test]
fn delivered_listings_are_marked() {
    let (_dir, db) = make_db();
    listings::insert_if_absent(&db, &listing("olx-1", "Casa")).unwrap();
    let sink = RecordingSink::default();

    let report = Notifier::new(&db, &sink, settings(20)).run().unwrap();

    assert_eq!(
        report,
        NotifyReport {
            candidates: 1,
            delivered: 1,
            failed: 0
        }
    );
    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent[0].chat_id, "-100123");
    assert_eq!(sent[0].parse_mode, ParseMode::Html);
    drop(sent);
    assert!(listings::get_listing(&db, "olx-1").unwrap().unwrap().notified);
}

#[test]
fn failed_delivery_stays_unnotified_and_others_go_through() {
    let (_dir, db) = make_db();
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    for (i, id) in ["olx-1", "olx-2", "olx-3"].iter().enumerate() {
        listings::insert_if_absent_at(&db, &listing(id, "Casa"), base + Duration::seconds(i as i64)).unwrap();
    }
    let sink = RecordingSink::default();
    sink.fail_for("olx-2");

    let report = Notifier::new(&db, &sink, settings(20)).run().unwrap();
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 1);
    assert!(!listings::get_listing(&db, "olx-2").unwrap().unwrap().notified);

    // Next run retries only the one that failed.
    sink.recover();
    let retry = Notifier::new(&db, &sink, settings(20)).run().unwrap();
    assert_eq!(retry.candidates, 1);
    assert_eq!(retry.delivered, 1);
    assert_eq!(listings::count_unnotified(&db).unwrap(), 0);
    assert_eq!(sink.sent_count(), 3);
}

#[test]
fn backlog_drains_within_ceil_total_over_batch_runs() {
    let (_dir, db) = make_db();
    let total = 7;
    let batch = 3;
    let base = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    for i in 0..total {
        let id = format!("olx-{i}");
        listings::insert_if_absent_at(&db, &listing(&id, "Casa"), base + Duration::seconds(i)).unwrap();
    }
    let sink = RecordingSink::default();

    let runs = (total as usize).div_ceil(batch);
    for run in 0..runs {
        let report = Notifier::new(&db, &sink, settings(batch)).run().unwrap();
        assert!(report.delivered <= batch, "run {run} over the cap");
    }

    assert_eq!(listings::count_unnotified(&db).unwrap(), 0);
    assert_eq!(sink.sent_count(), total as usize);

    // Oldest first: the first message is for the oldest listing.
    assert!(sink.texts()[0].contains("https://example.com/olx-0\""));

    let idle = Notifier::new(&db, &sink, settings(batch)).run().unwrap();
    assert_eq!(idle, NotifyReport::default());
}

#[test]
fn bad_stored_row_does_not_block_delivery() {
    let (_dir, db) = make_db();
    listings::insert_if_absent(&db, &listing("olx-1", "Casa")).unwrap();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO listings (id, title, source_site, ad_type, date_added, notified)
             VALUES ('zap-1', 'Sobrado', 'zap', 'owner', '2020-01-01 00:00:00', 0)",
            [],
        )?;
        Ok(())
    })
    .unwrap();
    let sink = RecordingSink::default();

    let first = Notifier::new(&db, &sink, settings(20)).run().unwrap();
    assert_eq!(first.delivered, 1);
    assert!(listings::get_listing(&db, "olx-1").unwrap().unwrap().notified);

    // Later runs still succeed; the bad row just stays behind.
    let second = Notifier::new(&db, &sink, settings(20)).run().unwrap();
    assert_eq!(second, NotifyReport::default());
    assert_eq!(sink.sent_count(), 1);
}

struct PanickingSink;

impl NotificationSink for PanickingSink {
    fn send(&self, _message: &OutgoingMessage) -> Result<(), SinkError> {
        panic!("transport bug");
    }

    fn channel_name(&self) -> &str {
        "panicking"
    }
}

#[test]
fn panicking_sink_counts_as_failed_delivery() {
    let (_dir, db) = make_db();
    listings::insert_if_absent(&db, &listing("olx-1", "Casa")).unwrap();
    listings::insert_if_absent(&db, &listing("olx-2", "Apto")).unwrap();

    let report = Notifier::new(&db, &PanickingSink, settings(20)).run().unwrap();

    assert_eq!(
        report,
        NotifyReport {
            candidates: 2,
            delivered: 0,
            failed: 2
        }
    );
    assert_eq!(listings::count_unnotified(&db).unwrap(), 2);
}
