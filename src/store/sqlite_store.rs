use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use include_dir::{include_dir, Dir};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use rusqlite_migration::Migrations;
use serde::Deserialize;
use uuid::Uuid;

use crate::model::{Notification, Subscription};
use crate::store::{NotificationStore, SubscriptionStore};

static MIGRATIONS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/migrations");

/// Subscription and notification storage on SQLite.
///
/// Notifications are stored as their JSON shape in `body`, with the record
/// and recipient ids copied into columns for lookups.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

#[derive(Deserialize)]
struct SubscriptionRow {
    record_id: String,
    recipient_id: Option<String>,
    is_subscribed: i64,
    alert_preferences: Option<String>,
}

#[derive(Deserialize)]
struct NotificationRow {
    body: String,
}

impl SqliteStore {
    /// An in-memory database lives as long as its connection, so the pool
    /// holds exactly one that is never recycled.
    pub fn open_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .min_idle(Some(1))
            .max_lifetime(None)
            .idle_timeout(None)
            .build(Self::manager(SqliteConnectionManager::memory()))?;
        Self::from_pool(pool)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let pool = Pool::builder()
            .max_size(8)
            .build(Self::manager(SqliteConnectionManager::file(path)))?;
        Self::from_pool(pool)
    }

    fn manager(manager: SqliteConnectionManager) -> SqliteConnectionManager {
        manager.with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(Duration::from_secs(5))
        })
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let migrations = Migrations::from_directory(&MIGRATIONS_DIR)?;
        let mut conn = self.pool.get()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    pub fn put_subscription(&self, subscription: &Subscription) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let preferences = subscription
            .alert_preferences
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO subscriptions (id, record_id, recipient_id, is_subscribed, alert_preferences)
             VALUES (?, ?, ?, ?, ?)",
            params![
                &id,
                &subscription.record_id,
                &subscription.recipient_id,
                subscription.is_subscribed,
                &preferences,
            ],
        )?;
        log::debug!(
            "SUBSCRIPTION PUT: id='{}', record='{}'",
            id,
            subscription.record_id
        );
        Ok(id)
    }

    pub fn notification(&self, id: &str) -> Result<Option<Notification>> {
        Ok(self
            .query_notifications("SELECT body FROM notifications WHERE id = ?", id)?
            .into_iter()
            .next())
    }

    pub fn notifications_for_record(&self, record_id: &str) -> Result<Vec<Notification>> {
        self.query_notifications(
            "SELECT body FROM notifications WHERE record_id = ? ORDER BY created_at, id",
            record_id,
        )
    }

    pub fn notifications_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>> {
        self.query_notifications(
            "SELECT body FROM notifications WHERE recipient_id = ? ORDER BY created_at, id",
            recipient_id,
        )
    }

    fn query_notifications(&self, sql: &str, key: &str) -> Result<Vec<Notification>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = serde_rusqlite::from_rows::<NotificationRow>(stmt.query([key])?)
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|row| {
                let value: serde_json::Value = serde_json::from_str(&row.body)?;
                Notification::from_stored(&value)
            })
            .collect()
    }
}

impl SubscriptionStore for SqliteStore {
    fn active_subscriptions(&self, record_id: &str) -> Result<Vec<Subscription>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT record_id, recipient_id, is_subscribed, alert_preferences
             FROM subscriptions WHERE record_id = ? AND is_subscribed = 1",
        )?;
        let rows = serde_rusqlite::from_rows::<SubscriptionRow>(stmt.query([record_id])?)
            .collect::<Result<Vec<_>, _>>()?;

        let mut subscriptions = Vec::with_capacity(rows.len());
        for row in rows {
            let alert_preferences = row
                .alert_preferences
                .as_deref()
                .map(serde_json::from_str::<BTreeSet<String>>)
                .transpose()?;
            subscriptions.push(Subscription {
                record_id: row.record_id,
                recipient_id: row.recipient_id,
                is_subscribed: row.is_subscribed != 0,
                alert_preferences,
            });
        }
        log::debug!(
            "SUBSCRIPTIONS: record='{}', active={}",
            record_id,
            subscriptions.len()
        );
        Ok(subscriptions)
    }
}

impl NotificationStore for SqliteStore {
    fn append(&self, notification: &Notification) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let body = serde_json::to_string(notification)?;
        let conn = self.pool.get()?;
        let affected = conn.execute(
            "INSERT INTO notifications (id, record_id, recipient_id, created_at, body)
             VALUES (?, ?, ?, ?, ?)",
            params![
                &id,
                notification.record_id(),
                notification.recipient_id(),
                notification.created_at(),
                &body,
            ],
        )?;
        log::debug!("NOTIFICATION APPEND: id='{}', {} rows affected", id, affected);
        Ok(id)
    }
}
