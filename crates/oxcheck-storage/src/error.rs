/// Errors that can occur while reading or writing persisted host state.
///
/// Any of them aborts the cycle of the affected host; the previous state on
/// disk stays untouched.
///
/// # Examples
///
/// ```rust
/// use oxcheck_storage::error::StorageError;
///
/// let err = StorageError::InvalidHostName("../etc".to_string());
/// assert!(err.to_string().contains("../etc"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The host name cannot be used as a storage key.
    #[error("Storage: invalid host name '{0}'")]
    InvalidHostName(String),

    /// Filesystem failure while reading or replacing a record.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted record could not be encoded or decoded.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted autocheck file of a host is unreadable.
    #[error("Storage: corrupt autochecks for host '{host}': {source}")]
    CorruptAutochecks {
        host: String,
        source: serde_json::Error,
    },
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
