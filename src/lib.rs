pub mod diff;
pub mod dispatch;
pub mod error;
pub mod feed;
pub mod filter;
pub mod model;
pub mod store;
pub mod transport;

pub use dispatch::{DispatchConfig, DispatchReport, Dispatcher};
pub use error::AlertError;
pub use feed::{RecordFeed, RecordUpdate};
pub use model::{Change, ChangeKind, Diff, FieldValue, Notification, Record, Subscription};
