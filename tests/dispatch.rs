use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use property_alerts::dispatch::payload::RECORD_ID_KEY;
use property_alerts::store::{
    InMemoryNotificationStore, InMemorySubscriptionStore, NotificationStore, SqliteStore,
};
use property_alerts::transport::{InMemoryPushTransport, PushPayload, PushTransport};
use property_alerts::{
    AlertError, Change, DispatchConfig, Dispatcher, Notification, Record, RecordFeed, RecordUpdate,
    Subscription,
};
use serde_json::json;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

struct Harness {
    dispatcher: Dispatcher,
    push: InMemoryPushTransport,
    subscriptions: InMemorySubscriptionStore,
    notifications: InMemoryNotificationStore,
}

fn harness() -> Result<Harness> {
    init_logging();
    let push = InMemoryPushTransport::new();
    let subscriptions = InMemorySubscriptionStore::new();
    let notifications = InMemoryNotificationStore::new();
    let dispatcher = Dispatcher::builder()
        .push(push.clone())
        .subscriptions(subscriptions.clone())
        .notifications(notifications.clone())
        .clock(|| 1_700_000_000_000)
        .build()?;
    Ok(Harness {
        dispatcher,
        push,
        subscriptions,
        notifications,
    })
}

#[test]
fn unchanged_record_sends_and_stores_nothing() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["book"]))?;
    let record = Record::new("p1").with("book", "45");

    let report = h.dispatcher.on_record_updated("p1", &record, &record.clone())?;
    assert!(report.unchanged);
    assert!(h.push.sent()?.is_empty());
    assert!(h.notifications.all()?.is_empty());
    Ok(())
}

#[test]
fn end_to_end_book_update() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["book"]))?;
    h.subscriptions.put(Subscription::new("p1", "u2", &["page"]))?;

    let before = Record::new("p1").with("book", "45");
    let after = Record::new("p1").with("book", "46");
    let report = h.dispatcher.on_record_updated("p1", &before, &after)?;
    assert!(report.is_clean());
    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.skipped, vec![Some("u2".to_string())]);

    let stored = h.notifications.all()?;
    assert_eq!(stored.len(), 1);
    let notification = &stored[0];
    assert_eq!(notification.record_id(), "p1");
    assert_eq!(notification.recipient_id(), Some("u1"));
    assert_eq!(notification.created_at(), 1_700_000_000_000);
    assert!(!notification.is_read());
    assert_eq!(notification.changes().len(), 1);
    assert_eq!(
        notification.changes().get("book"),
        Some(&Change::Updated {
            old: "45".into(),
            new: "46".into()
        })
    );
    Ok(())
}

#[test]
fn push_fans_out_per_field_then_all() -> Result<()> {
    let h = harness()?;
    let before = Record::new("r1").with("book", "1").with("page", "2");
    let after = Record::new("r1").with("book", "3").with("page", "4");

    h.dispatcher.on_record_updated("r1", &before, &after)?;
    let sent = h.push.sent()?;
    let topics: Vec<&str> = sent.iter().map(|m| m.topic.as_str()).collect();
    assert_eq!(topics.len(), 3);
    let field_topics: BTreeSet<&str> = topics[..2].iter().copied().collect();
    assert_eq!(field_topics, BTreeSet::from(["record_r1_book", "record_r1_page"]));
    assert_eq!(topics[2], "record_r1_all");

    let all = &sent[2].payload;
    assert_eq!(all.get(RECORD_ID_KEY).map(String::as_str), Some("r1"));
    assert_eq!(
        all.get("book").map(String::as_str),
        Some("Updated attribute from 1 to 3")
    );
    Ok(())
}

#[test]
fn topic_prefix_is_configurable() -> Result<()> {
    init_logging();
    let push = InMemoryPushTransport::new();
    let dispatcher = Dispatcher::builder()
        .config(DispatchConfig::from_json_str(r#"{"topic_prefix": "property"}"#)?)
        .push(push.clone())
        .subscriptions(InMemorySubscriptionStore::new())
        .notifications(InMemoryNotificationStore::new())
        .build()?;

    let before = Record::new("p7").with("deed", "a");
    let after = Record::new("p7");
    dispatcher.on_record_updated("p7", &before, &after)?;
    assert_eq!(push.topics()?, vec!["property_p7_deed", "property_p7_all"]);
    assert_eq!(push.sent()?[0].payload.get("deed").map(String::as_str), Some("Removed"));
    Ok(())
}

#[test]
fn identity_mismatch_is_returned_and_nothing_happens() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["book"]))?;
    let before = Record::new("p1").with("book", "45");
    let after = Record::new("p2").with("book", "46");

    let result = h.dispatcher.on_record_updated("p1", &before, &after);
    assert!(matches!(result, Err(AlertError::IdentityMismatch { .. })));
    assert!(h.push.sent()?.is_empty());
    assert!(h.notifications.all()?.is_empty());

    // The trigger boundary swallows the same failure.
    h.dispatcher.handle(&RecordUpdate::new("p1", before, after));
    Ok(())
}

#[test]
fn broken_subscriptions_do_not_block_siblings() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription {
        alert_preferences: None,
        ..Subscription::new("p1", "broken", &[])
    })?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["book", "color"]))?;
    h.subscriptions.put(Subscription::new("p1", "u2", &["book"]))?;

    let before = Record::new("p1").with("book", "45").with("color", "red");
    let after = Record::new("p1").with("book", "46").with("color", "blue");
    let report = h.dispatcher.on_record_updated("p1", &before, &after)?;

    assert_eq!(report.stored.len(), 1);
    assert_eq!(report.stored[0].recipient_id.as_deref(), Some("u2"));
    assert_eq!(report.failures.len(), 2);
    for failure in &report.failures {
        match (failure.recipient_id.as_deref(), &failure.error) {
            (Some("broken"), AlertError::Precondition(_)) => {}
            (Some("u1"), AlertError::FieldValidation { invalid }) => {
                assert_eq!(invalid, &vec!["color".to_string()]);
            }
            other => panic!("unexpected failure {:?}", other),
        }
    }
    assert_eq!(h.notifications.all()?.len(), 1);
    Ok(())
}

struct FailingTopic {
    inner: InMemoryPushTransport,
    topic: String,
}

impl PushTransport for FailingTopic {
    fn send(&self, topic: &str, payload: &PushPayload) -> Result<String> {
        if topic == self.topic {
            return Err(anyhow::anyhow!("transport unavailable"));
        }
        self.inner.send(topic, payload)
    }
}

#[test]
fn push_failure_stops_pushes_but_not_notifications() -> Result<()> {
    init_logging();
    let push = InMemoryPushTransport::new();
    let subscriptions = InMemorySubscriptionStore::new();
    let notifications = InMemoryNotificationStore::new();
    subscriptions.put(Subscription::new("p1", "u1", &["page"]))?;
    let dispatcher = Dispatcher::builder()
        .push(FailingTopic {
            inner: push.clone(),
            topic: "record_p1_book".to_string(),
        })
        .subscriptions(subscriptions)
        .notifications(notifications.clone())
        .build()?;

    let before = Record::new("p1").with("book", "1").with("page", "1");
    let after = Record::new("p1").with("book", "2").with("page", "2");
    let report = dispatcher.on_record_updated("p1", &before, &after)?;

    assert!(matches!(
        report.push_error,
        Some(AlertError::Delivery { ref topic, .. }) if topic == "record_p1_book"
    ));
    // "book" sorts first, so nothing else went out.
    assert!(push.sent()?.is_empty());
    assert_eq!(notifications.all()?.len(), 1);
    Ok(())
}

struct RejectingStore {
    inner: InMemoryNotificationStore,
    rejected: String,
    attempts: Arc<Mutex<usize>>,
}

impl NotificationStore for RejectingStore {
    fn append(&self, notification: &Notification) -> Result<String> {
        *self.attempts.lock().unwrap() += 1;
        if notification.recipient_id() == Some(self.rejected.as_str()) {
            return Err(anyhow::anyhow!("write rejected"));
        }
        self.inner.append(notification)
    }
}

#[test]
fn store_failure_is_isolated_per_subscriber() -> Result<()> {
    init_logging();
    let subscriptions = InMemorySubscriptionStore::new();
    let notifications = InMemoryNotificationStore::new();
    let attempts = Arc::new(Mutex::new(0));
    for recipient in ["u1", "u2", "u3", "u4"] {
        subscriptions.put(Subscription::new("p1", recipient, &["book"]))?;
    }
    let dispatcher = Dispatcher::builder()
        .config(DispatchConfig {
            max_parallel_writes: 2,
            ..Default::default()
        })
        .push(InMemoryPushTransport::new())
        .subscriptions(subscriptions)
        .notifications(RejectingStore {
            inner: notifications.clone(),
            rejected: "u2".to_string(),
            attempts: attempts.clone(),
        })
        .build()?;

    let report = dispatcher.on_record_updated(
        "p1",
        &Record::new("p1").with("book", "45"),
        &Record::new("p1").with("book", "46"),
    )?;

    assert_eq!(*attempts.lock().unwrap(), 4);
    assert_eq!(report.stored.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, AlertError::Store(_)));
    let mut recipients: Vec<String> = notifications
        .all()?
        .iter()
        .filter_map(|n| n.recipient_id().map(str::to_string))
        .collect();
    recipients.sort();
    assert_eq!(recipients, vec!["u1", "u3", "u4"]);
    Ok(())
}

#[test]
fn sqlite_backed_dispatch() -> Result<()> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let store = SqliteStore::open(dir.path().join("alerts.db"))?;
    store.put_subscription(&Subscription::new("p1", "u1", &["book", "page"]))?;
    store.put_subscription(&Subscription::new("p1", "u2", &["remark1"]))?;
    let push = InMemoryPushTransport::new();
    let dispatcher = Dispatcher::builder()
        .push(push.clone())
        .store(store.clone())
        .clock(|| 42)
        .build()?;

    dispatcher.handle_documents(
        "p1",
        &json!({"documentId": "p1", "book": "45", "page": null}),
        &json!({"documentId": "p1", "book": "46", "page": "12"}),
    );

    assert_eq!(push.sent()?.len(), 3);
    let stored = store.notifications_for_recipient("u1")?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].created_at(), 42);
    assert_eq!(stored[0].changes().get("page"), Some(&Change::Added { new: "12".into() }));
    assert!(store.notifications_for_recipient("u2")?.is_empty());
    Ok(())
}

#[test]
fn new_null_field_does_not_hide_removal() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["remark1"]))?;
    h.subscriptions.put(Subscription::new("p1", "u2", &["page"]))?;

    h.dispatcher.handle_documents(
        "p1",
        &json!({"documentId": "p1", "book": "45", "page": "1"}),
        &json!({"documentId": "p1", "book": "45", "remark1": null}),
    );

    assert_eq!(h.push.topics()?, vec!["record_p1_page", "record_p1_all"]);
    assert_eq!(
        h.push.sent()?[0].payload.get("page").map(String::as_str),
        Some("Removed")
    );
    let stored = h.notifications.all()?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].recipient_id(), Some("u2"));
    assert_eq!(
        stored[0].changes().get("page"),
        Some(&Change::Removed { old: "1".into() })
    );
    Ok(())
}

#[test]
fn watch_dispatches_feed_updates() -> Result<()> {
    let h = harness()?;
    h.subscriptions.put(Subscription::new("p1", "u1", &["book"]))?;
    let feed = RecordFeed::new();
    let handle = h.dispatcher.watch(&feed)?;

    feed.publish(RecordUpdate::new(
        "p1",
        Record::new("p1").with("book", "45"),
        Record::new("p1").with("book", "46"),
    ))?;
    feed.publish(RecordUpdate::new(
        "p1",
        Record::new("p1").with("book", "46"),
        Record::new("p2").with("book", "47"),
    ))?;
    drop(feed);
    handle.join().unwrap();

    assert_eq!(h.notifications.all()?.len(), 1);
    assert_eq!(h.push.topics()?, vec!["record_p1_book", "record_p1_all"]);
    Ok(())
}
