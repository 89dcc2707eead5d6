/// Errors that can occur within the notification subsystem.
///
/// Delivery failures are non-fatal to the engine: callers log them and move
/// on, and retry policy belongs to the receiving notifier service.
///
/// # Examples
///
/// ```rust
/// use siren_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing webhook url".to_string());
/// assert!(err.to_string().contains("webhook url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization of the notification payload failed.
    #[error("Notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The external endpoint returned a non-success response.
    #[error("Notify: endpoint returned status={status}: {body}")]
    Endpoint { status: u16, body: String },

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
