use thiserror::Error;

/// Error type shared by the store, watchers, gate and service host.
#[derive(Debug, Error)]
pub enum LockerError {
    #[error("Failed to present lock screen: {0}")]
    Presentation(String),

    #[error("Preference store unavailable: {0}")]
    StoreUnavailable(#[from] rusqlite::Error),

    #[error("Foreground query failed: {0}")]
    Query(String),

    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed bridge message: {0}")]
    Malformed(String),

    #[error("Startup failed: {0}")]
    Startup(String),
}

impl From<serde_json::Error> for LockerError {
    fn from(e: serde_json::Error) -> Self {
        LockerError::Config(e.to_string())
    }
}

/// Check if a rusqlite error means the database file could not be used at all
pub fn is_store_unreachable(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _)
        if matches!(
            err.code,
            rusqlite::ffi::ErrorCode::CannotOpen
                | rusqlite::ffi::ErrorCode::DatabaseBusy
                | rusqlite::ffi::ErrorCode::DatabaseLocked
                | rusqlite::ffi::ErrorCode::NotADatabase
        ))
}
