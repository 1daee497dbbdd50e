/// Errors raised by the change-detection and fan-out pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The record identifiers of the two versions disagree with each other
    /// or with the id the trigger was raised for.
    #[error("Record ids don't match: expected {expected}, before {before:?}, after {after:?}")]
    IdentityMismatch {
        expected: String,
        before: String,
        after: String,
    },

    /// Input that must always be present was missing, which points at a
    /// data-integrity problem upstream.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A notification would carry change keys outside the recognized field
    /// set. Every offending key is listed.
    #[error("Invalid field(s) in changes: {}", .invalid.join(", "))]
    FieldValidation { invalid: Vec<String> },

    /// A persisted change could not be turned back into a `Change`.
    #[error("Invalid change: {0}")]
    InvalidChange(String),

    #[error("Delivery to topic {topic} failed: {source}")]
    Delivery {
        topic: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AlertError>;
