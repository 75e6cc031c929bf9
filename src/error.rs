//! Error types for mailgraph.

/// Top-level error type for the sync core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Routing error: {0}")]
    Route(#[from] RouteError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),
}

/// Mailbox transport errors. Connectivity failures are fatal to a batch —
/// the orchestrator propagates them instead of counting per message.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Connection to {host} failed: {reason}")]
    Connection { host: String, reason: String },

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification service errors. Caught per message by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Classifier returned unusable response: {0}")]
    InvalidResponse(String),

    #[error("Classifier rejected request with status {status}: {body}")]
    Api { status: u16, body: String },
}

/// Knowledge-base write errors. Caught per message by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dedup-store persistence errors.
///
/// Only writes surface here; unreadable persisted records are reset to
/// empty inside [`crate::state::SyncState::load`] and never become errors.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Filter construction errors.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Result type alias for the sync core.
pub type Result<T> = std::result::Result<T, Error>;
