use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::diff;
use crate::dispatch::payload::{push_payload, RECORD_ID_KEY};
use crate::dispatch::DispatchConfig;
use crate::error::AlertError;
use crate::feed::{RecordFeed, RecordUpdate};
use crate::filter;
use crate::model::{Diff, Notification, Record, Subscription};
use crate::store::{NotificationStore, SubscriptionStore};
use crate::transport::PushTransport;

type Clock = dyn Fn() -> i64 + Send + Sync;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PushReceipt {
    pub topic: String,
    pub receipt: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredNotification {
    pub id: String,
    pub recipient_id: Option<String>,
}

#[derive(Debug)]
pub struct SubscriberFailure {
    pub recipient_id: Option<String>,
    pub error: AlertError,
}

/// What one dispatch did. Failures of individual sends or writes land here;
/// only failures that stop the whole dispatch are returned as errors.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub record_id: String,
    /// Set when both versions were equal and nothing was sent or stored.
    pub unchanged: bool,
    pub diff: Diff,
    pub push_receipts: Vec<PushReceipt>,
    /// The send that stopped the push fan-out, if any.
    pub push_error: Option<AlertError>,
    pub stored: Vec<StoredNotification>,
    /// Subscribers whose preferences matched none of the changed fields.
    pub skipped: Vec<Option<String>>,
    pub failures: Vec<SubscriberFailure>,
}

impl DispatchReport {
    fn unchanged(record_id: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            unchanged: true,
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.push_error.is_none() && self.failures.is_empty()
    }
}

enum SubscriberOutcome {
    Stored(StoredNotification),
    Skipped(Option<String>),
    Failed(SubscriberFailure),
}

/// Turns record updates into push messages and per-subscriber notifications.
///
/// A dispatcher holds no per-event state, so one instance can serve any
/// number of concurrent updates.
#[derive(Clone)]
pub struct Dispatcher {
    config: DispatchConfig,
    push: Arc<dyn PushTransport>,
    subscriptions: Arc<dyn SubscriptionStore>,
    notifications: Arc<dyn NotificationStore>,
    clock: Arc<Clock>,
    writers: Arc<ThreadPool>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Handles one update of `record_id` from `before` to `after`:
    ///
    /// 1. computes the diff,
    /// 2. sends one push message per changed field topic and one to the
    ///    catch-all topic,
    /// 3. stores a notification for every active subscriber whose alert
    ///    preferences overlap the diff.
    ///
    /// A failed push stops the remaining sends but not the notifications.
    /// Each subscriber is handled on its own; one failing does not affect
    /// the others.
    pub fn on_record_updated(
        &self,
        record_id: &str,
        before: &Record,
        after: &Record,
    ) -> Result<DispatchReport, AlertError> {
        if before == after {
            log::info!("Record {} is unchanged. No notification is sent.", record_id);
            return Ok(DispatchReport::unchanged(record_id));
        }

        let diff = diff::compute(before, after, record_id)?;
        let mut report = DispatchReport {
            record_id: record_id.to_string(),
            ..Default::default()
        };

        self.send_push(record_id, &diff, &mut report);

        let subscriptions = self
            .subscriptions
            .active_subscriptions(record_id)
            .map_err(AlertError::Store)?;
        let created_at = (self.clock)();

        let outcomes: Vec<SubscriberOutcome> = self.writers.install(|| {
            subscriptions
                .par_iter()
                .map(|subscription| self.notify_subscriber(record_id, created_at, &diff, subscription))
                .collect()
        });

        for outcome in outcomes {
            match outcome {
                SubscriberOutcome::Stored(stored) => report.stored.push(stored),
                SubscriberOutcome::Skipped(recipient) => report.skipped.push(recipient),
                SubscriberOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        log::info!(
            "Dispatched record {}: {} changes, {} pushes, {} stored, {} skipped, {} failed",
            record_id,
            diff.len(),
            report.push_receipts.len(),
            report.stored.len(),
            report.skipped.len(),
            report.failures.len()
        );
        report.diff = diff;
        Ok(report)
    }

    /// Trigger boundary: dispatches `update` and logs instead of returning
    /// any failure.
    pub fn handle(&self, update: &RecordUpdate) {
        match self.on_record_updated(&update.record_id, &update.before, &update.after) {
            Ok(report) => {
                if let Some(error) = &report.push_error {
                    log::error!("Push fan-out for record {} failed: {}", update.record_id, error);
                }
                for failure in &report.failures {
                    log::error!(
                        "Notification for record {} and recipient {:?} failed: {}",
                        update.record_id,
                        failure.recipient_id,
                        failure.error
                    );
                }
            }
            Err(e) => log::error!("Dispatch for record {} failed: {}", update.record_id, e),
        }
    }

    /// Trigger boundary for raw documents, as delivered by a document store.
    pub fn handle_documents(
        &self,
        record_id: &str,
        before: &serde_json::Value,
        after: &serde_json::Value,
    ) {
        match RecordUpdate::from_documents(record_id, before, after, &self.config.id_field) {
            Ok(update) => self.handle(&update),
            Err(e) => log::error!("Dropping update for record {}: {}", record_id, e),
        }
    }

    /// Dispatches every update published on `feed` from a background thread.
    pub fn watch(&self, feed: &RecordFeed) -> Result<JoinHandle<()>> {
        let dispatcher = self.clone();
        feed.observe(move |update| dispatcher.handle(&update))
    }

    fn send_push(&self, record_id: &str, diff: &Diff, report: &mut DispatchReport) {
        let payload = push_payload(diff, record_id);
        let topics = payload
            .keys()
            .filter(|field| field.as_str() != RECORD_ID_KEY)
            .map(|field| self.config.field_topic(record_id, field))
            .chain(std::iter::once(self.config.all_topic(record_id)));

        for topic in topics {
            match self.push.send(&topic, &payload) {
                Ok(receipt) => {
                    log::info!("Successfully sent notification to topic {}: {}", topic, receipt);
                    report.push_receipts.push(PushReceipt { topic, receipt });
                }
                Err(source) => {
                    report.push_error = Some(AlertError::Delivery { topic, source });
                    return;
                }
            }
        }
    }

    fn notify_subscriber(
        &self,
        record_id: &str,
        created_at: i64,
        diff: &Diff,
        subscription: &Subscription,
    ) -> SubscriberOutcome {
        let recipient_id = subscription.recipient_id.clone();
        let result = filter::filter(diff, subscription.alert_preferences.as_ref()).and_then(|matched| {
            if matched.is_empty() {
                return Ok(None);
            }
            let notification =
                Notification::build(record_id, created_at, matched, recipient_id.as_deref())?;
            let id = self
                .notifications
                .append(&notification)
                .map_err(AlertError::Store)?;
            Ok(Some(id))
        });

        match result {
            Ok(Some(id)) => SubscriberOutcome::Stored(StoredNotification { id, recipient_id }),
            Ok(None) => {
                log::debug!(
                    "No preferred field changed for recipient {:?} of record {}",
                    recipient_id,
                    record_id
                );
                SubscriberOutcome::Skipped(recipient_id)
            }
            Err(error) => SubscriberOutcome::Failed(SubscriberFailure { recipient_id, error }),
        }
    }
}

fn system_clock() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[derive(Default)]
pub struct DispatcherBuilder {
    config: Option<DispatchConfig>,
    push: Option<Arc<dyn PushTransport>>,
    subscriptions: Option<Arc<dyn SubscriptionStore>>,
    notifications: Option<Arc<dyn NotificationStore>>,
    clock: Option<Arc<Clock>>,
}

impl DispatcherBuilder {
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn push(mut self, transport: impl PushTransport + 'static) -> Self {
        self.push = Some(Arc::new(transport));
        self
    }

    pub fn subscriptions(mut self, store: impl SubscriptionStore + 'static) -> Self {
        self.subscriptions = Some(Arc::new(store));
        self
    }

    pub fn notifications(mut self, store: impl NotificationStore + 'static) -> Self {
        self.notifications = Some(Arc::new(store));
        self
    }

    /// Uses one store for both subscriptions and notifications.
    pub fn store<S>(self, store: S) -> Self
    where
        S: SubscriptionStore + NotificationStore + Clone + 'static,
    {
        self.subscriptions(store.clone()).notifications(store)
    }

    /// Source of `createdAt` timestamps, in epoch milliseconds.
    pub fn clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<Dispatcher> {
        let config = self.config.unwrap_or_default();
        let writers = ThreadPoolBuilder::new()
            .num_threads(config.max_parallel_writes.max(1))
            .thread_name(|i| format!("notification-writer-{}", i))
            .build()?;
        Ok(Dispatcher {
            push: self
                .push
                .ok_or_else(|| anyhow::anyhow!("Dispatcher needs a push transport"))?,
            subscriptions: self
                .subscriptions
                .ok_or_else(|| anyhow::anyhow!("Dispatcher needs a subscription store"))?,
            notifications: self
                .notifications
                .ok_or_else(|| anyhow::anyhow!("Dispatcher needs a notification store"))?,
            clock: self.clock.unwrap_or_else(|| Arc::new(system_clock) as Arc<Clock>),
            writers: Arc::new(writers),
            config,
        })
    }
}
