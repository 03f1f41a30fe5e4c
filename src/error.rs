use std::io;
use thiserror::Error;

/// Error taxonomy for the store layer.
///
/// Every failure a caller can act on has its own variant; nothing is
/// logged-and-swallowed inside the library. Engine-level busy/locked
/// conditions are folded into [`KvError::LockTimeout`] so callers can
/// implement retry/backoff without matching on SQLite error codes.
#[derive(Error, Debug)]
pub enum KvError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Lock timeout: {0}")]
    LockTimeout(String),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<rusqlite::Error> for KvError {
    fn from(err: rusqlite::Error) -> Self {
        if is_busy_error(&err) {
            KvError::LockTimeout(err.to_string())
        } else {
            KvError::Sqlite(err)
        }
    }
}

/// Busy/locked conditions surface after the connection's busy_timeout has
/// already been exhausted, so they are lock timeouts from the caller's view.
fn is_busy_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(code, _) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
