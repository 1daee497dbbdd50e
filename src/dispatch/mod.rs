mod config;
mod dispatcher;
pub mod payload;

pub use config::DispatchConfig;
pub use dispatcher::{
    DispatchReport, Dispatcher, DispatcherBuilder, PushReceipt, StoredNotification,
    SubscriberFailure,
};
