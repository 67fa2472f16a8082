//! Conversions from external infrastructure errors into domain errors.

use erpsync_domain::{SyncError, TransportError, TransportErrorKind};
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tokio::task::JoinError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SyncError);

impl From<InfraError> for SyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SyncError> for InfraError {
    fn from(value: SyncError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoSyncError {
    fn into_sync_error(self) -> SyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → SyncError */
/* -------------------------------------------------------------------------- */

impl IntoSyncError for SqlError {
    fn into_sync_error(self) -> SyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => SyncError::Store("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => SyncError::Store("database is locked".into()),
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        SyncError::Store("unique constraint violation".into())
                    }
                    (ErrorCode::NotADatabase, _) => SyncError::Store(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    (_, _) if looks_like_wrong_key(&message) => SyncError::Store(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => SyncError::Store(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => SyncError::Store("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                SyncError::Store(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, name, ty) => {
                SyncError::Store(format!("invalid column type for {name}: {ty}"))
            }
            RE::InvalidPath(path) => {
                SyncError::Store(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => SyncError::Store(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_sync_error())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → SyncError */
/* -------------------------------------------------------------------------- */

impl IntoSyncError for r2d2::Error {
    fn into_sync_error(self) -> SyncError {
        let message = self.to_string();
        let lower = message.to_ascii_lowercase();
        if lower.contains("file is not a database") || lower.contains("notadb") {
            SyncError::Store("SQLCipher key rejected or database not encrypted".into())
        } else {
            SyncError::Store(format!("connection pool error: {message}"))
        }
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_sync_error())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → SyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(SyncError::Store(format!("stored JSON is invalid: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SyncError / TransportError */
/* -------------------------------------------------------------------------- */

// Non-2xx responses never get here: the transport hands them back as
// `UpstreamResponse` values for the executor to classify.

impl IntoSyncError for HttpError {
    fn into_sync_error(self) -> SyncError {
        if self.is_builder() {
            return SyncError::Config(format!("invalid HTTP client configuration: {self}"));
        }

        SyncError::Connectivity { attempts: 1, message: transport_error(&self).to_string() }
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_sync_error())
    }
}

/// Classify a reqwest failure that happened before a response was read.
pub fn transport_error(err: &HttpError) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_body() || err.is_decode() {
        TransportErrorKind::Body
    } else {
        TransportErrorKind::Request
    };
    TransportError::new(kind, err.to_string())
}

/// Blocking store work panicked or was cancelled.
pub fn map_join_error(err: JoinError) -> SyncError {
    if err.is_cancelled() {
        SyncError::Internal("blocking task cancelled".into())
    } else {
        SyncError::Internal(format!("blocking task failed: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
