use std::sync::Arc;

use anyhow::Result;

use crate::model::{Notification, Subscription};

pub trait SubscriptionStore: Send + Sync {
    /// Returns every subscription for `record_id` with `is_subscribed` set.
    fn active_subscriptions(&self, record_id: &str) -> Result<Vec<Subscription>>;
}

pub trait NotificationStore: Send + Sync {
    /// Appends `notification` and returns the id it was stored under.
    fn append(&self, notification: &Notification) -> Result<String>;
}

impl<T: SubscriptionStore + ?Sized> SubscriptionStore for Arc<T> {
    fn active_subscriptions(&self, record_id: &str) -> Result<Vec<Subscription>> {
        (**self).active_subscriptions(record_id)
    }
}

impl<T: NotificationStore + ?Sized> NotificationStore for Arc<T> {
    fn append(&self, notification: &Notification) -> Result<String> {
        (**self).append(notification)
    }
}
