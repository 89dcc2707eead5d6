/// Errors that can occur within the storage layer.
///
/// # Examples
///
/// ```rust
/// use siren_storage::error::StoreError;
///
/// let err = StoreError::NotFound {
///     entity: "alert",
///     id: "alert-99".to_string(),
/// };
/// assert!(err.to_string().contains("alert-99"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// The active-fingerprint uniqueness constraint kept conflicting after
    /// the bounded number of upsert retries.
    #[error("Storage: active-fingerprint conflict persisted after retries (fingerprint={fingerprint})")]
    FingerprintConflict { fingerprint: String },

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failure (tags/metadata columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
