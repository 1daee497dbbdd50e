use std::sync::{Arc, RwLock};

use anyhow::Result;
use uuid::Uuid;

use crate::model::{Notification, Subscription};
use crate::store::{NotificationStore, SubscriptionStore};

#[derive(Clone, Default)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, subscription: Subscription) -> Result<()> {
        let mut subscriptions = self
            .subscriptions
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        subscriptions.push(subscription);
        Ok(())
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn active_subscriptions(&self, record_id: &str) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        let active: Vec<Subscription> = subscriptions
            .iter()
            .filter(|s| s.record_id == record_id && s.is_subscribed)
            .cloned()
            .collect();
        log::debug!("SUBSCRIPTIONS: record='{}', active={}", record_id, active.len());
        Ok(active)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<Vec<(String, Notification)>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Result<Vec<Notification>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        Ok(notifications.iter().map(|(_, n)| n.clone()).collect())
    }

    pub fn get(&self, id: &str) -> Result<Option<Notification>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock"))?;
        Ok(notifications
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, n)| n.clone()))
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn append(&self, notification: &Notification) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        log::debug!(
            "NOTIFICATION APPEND: id='{}', record='{}', recipient={:?}",
            id,
            notification.record_id(),
            notification.recipient_id()
        );
        let mut notifications = self
            .notifications
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock"))?;
        notifications.push((id.clone(), notification.clone()));
        Ok(id)
    }
}
