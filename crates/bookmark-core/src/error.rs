//! Error types for the bookmark service.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the core, storage and API layers report.
#[derive(Error, Debug)]
pub enum Error {
    /// Store failure; pool timeouts and lost connections are [`Error::is_transient`].
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Display date did not match a supported pattern or named an impossible date.
    #[error("Invalid date format: {0}")]
    InvalidDateFormat(String),

    /// Cursor token was malformed, truncated or failed its checksum.
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// Cursor was issued for a different filter than the current request.
    #[error("Cursor does not match the current filter")]
    CursorFilterMismatch,

    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(uuid::Uuid),

    /// Request field missing, too long, or a disallowed status change.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request body was not the JSON shape expected.
    #[error("Malformed request body: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data that should be impossible, such as an unknown status value.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidDateFormat(_)
                | Error::InvalidCursor(_)
                | Error::CursorFilterMismatch
                | Error::InvalidInput(_)
                | Error::Serialization(_)
                | Error::BookmarkNotFound(_)
        )
    }

    /// True for store failures a caller may retry (pool timeout, lost connection).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Database(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_bad_value() {
        let err = Error::InvalidDateFormat("can't parse date from: \"2017.13\"".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid date format: can't parse date from: \"2017.13\""
        );
        assert_eq!(
            Error::InvalidCursor("checksum mismatch".into()).to_string(),
            "Invalid cursor: checksum mismatch"
        );
        assert_eq!(
            Error::BookmarkNotFound(uuid::Uuid::nil()).to_string(),
            "Bookmark not found: 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_filter_mismatch_message() {
        assert_eq!(
            Error::CursorFilterMismatch.to_string(),
            "Cursor does not match the current filter"
        );
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::InvalidDateFormat("x".into()).is_client_error());
        assert!(Error::InvalidCursor("x".into()).is_client_error());
        assert!(Error::CursorFilterMismatch.is_client_error());
        assert!(Error::InvalidInput("x".into()).is_client_error());
        assert!(!Error::Internal("x".into()).is_client_error());
        assert!(!Error::Database(sqlx::Error::PoolTimedOut).is_client_error());
    }

    #[test]
    fn test_transient_errors() {
        assert!(Error::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(Error::Database(sqlx::Error::PoolClosed).is_transient());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_transient());
        assert!(!Error::InvalidCursor("x".into()).is_transient());
    }

    #[test]
    fn test_unknown_json_field_is_a_client_error() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        #[allow(dead_code)]
        struct Body {
            url: String,
        }
        let err: Error = serde_json::from_str::<Body>(r#"{"url":"u","tld":"com"}"#)
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization(ref msg) if msg.contains("tld")));
        assert!(err.is_client_error());
    }
}
