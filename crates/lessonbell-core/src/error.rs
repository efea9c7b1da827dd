//! Error types shared across LessonBell crates.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum LessonBellError {
    /// Configuration could not be read, parsed or is incomplete.
    #[error("config error: {0}")]
    Config(String),

    /// Schedule store read/write failure.
    #[error("store error: {0}")]
    Store(String),

    /// Outbound or inbound channel failure.
    #[error("channel error: {0}")]
    Channel(String),

    /// Key material or token handling failure.
    #[error("security error: {0}")]
    Security(String),

    /// The schedule could not be read for a polling cycle.
    #[error("schedule unavailable: {0}")]
    ScheduleUnavailable(String),

    /// A notification did not reach the admin endpoint.
    #[error("notification delivery failed: {0}")]
    NotificationDeliveryFailed(String),

    /// Rejected input (bad period, empty name, inverted times...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LessonBellError>;
