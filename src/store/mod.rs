mod memory_store;
mod sqlite_store;
mod traits;

pub use memory_store::{InMemoryNotificationStore, InMemorySubscriptionStore};
pub use sqlite_store::SqliteStore;
pub use traits::{NotificationStore, SubscriptionStore};
