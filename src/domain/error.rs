//! Domain-level error types for imessage-export.
//!
//! All errors are typed with `thiserror` so callers can branch on the
//! condition instead of matching message text.

use std::path::{Path, PathBuf};

use rusqlite::ErrorCode;
use thiserror::Error;

const HINT_PERMISSION: &str = "Grant Full Disk Access to your terminal in System Settings > \
     Privacy & Security > Full Disk Access, then restart the terminal.";
const HINT_NOT_FOUND: &str =
    "Check that the path is correct, or pass it explicitly with --db-path.";
const HINT_LOCKED: &str = "Quit the Messages app completely and run the command again.";

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Store file missing, unreadable, permission-denied or not a database.
    #[error("Message database unavailable at {path}: {reason}")]
    StoreUnavailable { path: PathBuf, reason: String },

    /// Store held busy or locked by another process.
    #[error("Message database is locked: {path}")]
    StoreLocked { path: PathBuf },

    /// No conversation matched a participant query.
    #[error("No chats found with participant matching '{participant}'")]
    NoMatchingConversation { participant: String },

    /// Any other failure while querying the store.
    #[error("Database query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// Destination could not be written; nothing was finalized.
    #[error("Failed to write output {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV or JSON encoding failed.
    #[error("Serialization error: {message}")]
    Serialize { message: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid user-supplied value.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl AppError {
    /// Classifies a rusqlite error raised while talking to the store at `path`.
    pub fn from_store(path: impl Into<PathBuf>, err: rusqlite::Error) -> Self {
        let path = path.into();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::StoreLocked { path },
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::PermissionDenied
                | ErrorCode::AuthorizationForStatementDenied
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt,
            ) => Self::StoreUnavailable {
                path,
                reason: err.to_string(),
            },
            _ => Self::Query {
                message: err.to_string(),
                source: Some(err),
            },
        }
    }

    /// Create an output write error.
    pub fn output(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::OutputWrite {
            path: path.into(),
            source: err,
        }
    }

    /// Create an output write error raised while rendering, before the
    /// destination is known. See [`AppError::with_output_path`].
    pub fn write(err: std::io::Error) -> Self {
        Self::output(PathBuf::new(), err)
    }

    /// Fills in the destination of a write error raised while rendering.
    #[must_use]
    pub fn with_output_path(self, destination: &Path) -> Self {
        match self {
            Self::OutputWrite { path, source } if path.as_os_str().is_empty() => {
                Self::OutputWrite {
                    path: destination.to_path_buf(),
                    source,
                }
            }
            other => other,
        }
    }

    /// Create a serialization error from anything displayable.
    pub fn serialize(err: impl std::fmt::Display) -> Self {
        Self::Serialize {
            message: err.to_string(),
        }
    }

    /// Whether running the same command again may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreLocked { .. })
    }

    /// Remediation text shown under the error, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::StoreLocked { .. } => Some(HINT_LOCKED),
            Self::StoreUnavailable { reason, .. } if reason.contains("not found") => {
                Some(HINT_NOT_FOUND)
            }
            Self::StoreUnavailable { .. } => Some(HINT_PERMISSION),
            _ => None,
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None)
    }

    #[test]
    fn test_busy_maps_to_locked() {
        let err = AppError::from_store("/tmp/chat.db", sqlite_failure(rusqlite::ffi::SQLITE_BUSY));
        assert!(matches!(err, AppError::StoreLocked { .. }));
        assert!(err.is_retryable());
        assert_eq!(err.hint(), Some(HINT_LOCKED));
    }

    #[test]
    fn test_cantopen_maps_to_unavailable() {
        let err = AppError::from_store(
            "/tmp/chat.db",
            sqlite_failure(rusqlite::ffi::SQLITE_CANTOPEN),
        );
        assert!(matches!(err, AppError::StoreUnavailable { .. }));
        assert!(!err.is_retryable());
        assert_eq!(err.hint(), Some(HINT_PERMISSION));
    }

    #[test]
    fn test_render_write_error_gets_destination() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "Broken pipe");
        let err = AppError::write(io).with_output_path(Path::new("/out/all.json"));

        match err {
            AppError::OutputWrite { path, source } => {
                assert_eq!(path, Path::new("/out/all.json"));
                assert_eq!(source.kind(), std::io::ErrorKind::BrokenPipe);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_with_output_path_keeps_other_errors() {
        let err = AppError::serialize("bad").with_output_path(Path::new("/out/all.json"));
        assert!(matches!(err, AppError::Serialize { .. }));

        let io = std::io::Error::other("x");
        let err = AppError::output("/first.csv", io).with_output_path(Path::new("/second.csv"));
        assert!(matches!(err, AppError::OutputWrite { ref path, .. } if path == Path::new("/first.csv")));
    }

    #[test]
    fn test_other_failures_map_to_query() {
        let err = AppError::from_store("/tmp/chat.db", rusqlite::Error::InvalidQuery);
        assert!(matches!(err, AppError::Query { .. }));
        assert!(err.hint().is_none());
    }
}
