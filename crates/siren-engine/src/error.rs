use siren_common::types::AlertStatus;
use siren_storage::error::StoreError;

/// Errors returned by engine operations.
///
/// Notifier unavailability and correlation partial failures are logged
/// conditions, not error variants: they must never fail the operation that
/// observed them.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// The referenced alert does not exist.
    #[error("Alert: not found (id={id})")]
    NotFound { id: String },

    /// The requested lifecycle transition is not legal from the alert's
    /// current status.
    #[error("Alert: cannot {operation} alert in status '{status}' (id={id})")]
    InvalidTransition {
        id: String,
        status: AlertStatus,
        operation: &'static str,
    },

    /// Concurrent submissions of the same fingerprint kept conflicting
    /// after the store's bounded retries.
    #[error("Alert: duplicate-write conflict on fingerprint {fingerprint}")]
    DuplicateConflict { fingerprint: String },

    /// An underlying storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience `Result` alias for engine operations.
pub type Result<T> = std::result::Result<T, AlertError>;
