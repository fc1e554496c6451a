//! Error types and result types for CRUD operations.
//!
//! Every failure surfaced by this crate is a [`DbError`] carrying a stable
//! code from the closed taxonomy in [`db_errors`]. Callers branch on
//! [`DbError::code`], never on message text.

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A typed database error with a stable code and a display-ready message.
///
/// Errors raised by this layer use the `ERRDBnnn` codes from [`db_errors`].
/// Errors raised by a backend driver enter the system with an empty code and
/// are given a taxonomy code by the
/// [`ErrorsMapper`](crate::mapper::ErrorsMapper) before reaching the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("DbError {code} {message}")]
pub struct DbError {
    /// Stable error code, empty for raw backend errors awaiting normalization.
    pub code: String,
    /// Human-readable message suitable for direct display or logging.
    pub message: String,
}

impl DbError {
    /// Creates an error with an explicit code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { code: code.into(), message: message.into() }
    }

    /// Wraps a raw backend message with an empty code.
    pub fn raw(message: impl Into<String>) -> Self {
        Self { code: String::new(), message: message.into() }
    }

    /// Whether this error already carries a taxonomy code.
    pub fn is_normalized(&self) -> bool {
        !self.code.is_empty()
    }
}

/// A specialized `Result` type for CRUD operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<SerdeJsonError> for DbError {
    fn from(err: SerdeJsonError) -> Self {
        db_errors::db_instruction_with(err.to_string())
    }
}

/// The closed error taxonomy.
///
/// Each function returns a fresh [`DbError`] with its stable code; compare
/// failures against these by `code`.
pub mod db_errors {
    use super::DbError;

    pub fn forbidden() -> DbError {
        DbError::new("ERRDB001", "Forbidden")
    }

    pub fn not_found() -> DbError {
        DbError::new("ERRDB002", "Not Found")
    }

    pub fn internal_server_error() -> DbError {
        DbError::new("ERRDB003", "Sorry, something went wrong")
    }

    pub fn not_implemented() -> DbError {
        DbError::new("ERRDB004", "Not implemented")
    }

    pub fn connection_not_open() -> DbError {
        DbError::new("ERRDB005", "Database connection is not opened")
    }

    pub fn connection_already_open() -> DbError {
        DbError::new("ERRDB006", "Database connection is already opened")
    }

    pub fn duplicated_document() -> DbError {
        DbError::new("ERRDB007", "Duplicated document")
    }

    pub fn nothing_was_deleted() -> DbError {
        DbError::new("ERRDB008", "Nothing was deleted")
    }

    pub fn no_id_provided() -> DbError {
        DbError::new("ERRDB009", "Cannot get document without [id]")
    }

    pub fn no_criteria_provided() -> DbError {
        DbError::new("ERRDB010", "Cannot get document without criteria")
    }

    pub fn document_not_found() -> DbError {
        DbError::new("ERRDB011", "Document not found")
    }

    pub fn db_instruction() -> DbError {
        DbError::new("ERRDB012", "Fail to receive data")
    }

    /// `db_instruction` with a more specific message, same code.
    pub fn db_instruction_with(message: impl Into<String>) -> DbError {
        DbError::new("ERRDB012", message)
    }

    pub fn unsupported_filter_operation() -> DbError {
        DbError::new("ERRDB013", "Unsupported filter operation")
    }

    pub fn duplicated_sorting_condition() -> DbError {
        DbError::new("ERRDB014", "Duplicated sorting condition")
    }

    pub fn db_any_error() -> DbError {
        DbError::new("ERRDB015", "Something went wrong!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_code_and_message() {
        let err = db_errors::document_not_found();
        assert_eq!(err.code, "ERRDB011");
        assert_eq!(err.to_string(), "DbError ERRDB011 Document not found");
    }

    #[test]
    fn raw_errors_are_not_normalized() {
        assert!(!DbError::raw("boom").is_normalized());
        assert!(db_errors::forbidden().is_normalized());
    }

    #[test]
    fn serializes_as_code_message_pair() {
        let json = serde_json::to_value(db_errors::nothing_was_deleted()).unwrap();
        assert_eq!(json["code"], "ERRDB008");
        assert_eq!(json["message"], "Nothing was deleted");
    }
}
