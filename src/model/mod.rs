pub mod change;
pub mod fields;
pub mod notification;
pub mod subscription;
pub mod types;

pub use change::{Change, ChangeKind, Diff};
pub use fields::{is_property_field, PROPERTY_FIELDS};
pub use notification::Notification;
pub use subscription::Subscription;
pub use types::{FieldValue, Record};
