//! Normalization of backend-raised errors onto the closed taxonomy.
//!
//! An [`ErrorsMapper`] is an explicit, injectable registry: populate it at
//! startup, share it read-only afterwards. Matching is case-insensitive
//! substring containment over the raw message, with registry entries checked
//! in insertion order.

use crate::error::{DbError, db_errors};

/// Registry mapping raw backend message fragments to friendly [`DbError`]s.
///
/// Resolution order for a raw error:
/// 1. exact match of the lowercased message against a registered key;
/// 2. first registered key (insertion order) contained in the message;
/// 3. the configured default message, if any;
/// 4. an already-normalized error passes through unchanged;
/// 5. anything else is wrapped with an empty code.
#[derive(Debug, Clone, Default)]
pub struct ErrorsMapper {
    entries: Vec<(String, DbError)>,
    default_message: Option<DbError>,
}

impl ErrorsMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a message fragment. Re-registering a key replaces its error
    /// in place, keeping the original position in the match order.
    pub fn register(&mut self, key: impl Into<String>, friendly: DbError) {
        let key = key.into().to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = friendly,
            None => self.entries.push((key, friendly)),
        }
    }

    pub fn unregister(&mut self, key: &str) {
        let key = key.to_lowercase();
        self.entries.retain(|(k, _)| *k != key);
    }

    /// Sets the error returned when no registered fragment matches.
    pub fn set_default_message(&mut self, friendly: DbError) {
        self.default_message = Some(friendly);
    }

    /// Resolves a raw or already-normalized error to a friendly [`DbError`].
    pub fn resolve(&self, error: &DbError) -> DbError {
        let message = error.message.to_lowercase();

        if let Some((_, friendly)) = self.entries.iter().find(|(k, _)| *k == message) {
            return friendly.clone();
        }
        if let Some((_, friendly)) = self.entries.iter().find(|(k, _)| message.contains(k)) {
            return friendly.clone();
        }
        if let Some(default) = &self.default_message {
            return default.clone();
        }
        if error.is_normalized() {
            return error.clone();
        }
        DbError::raw(error.message.clone())
    }
}

/// Registers the well-known backend message fragments onto the taxonomy.
pub fn register_db_user_friendly_exceptions(mapper: &mut ErrorsMapper) {
    mapper.register(
        "Document contains a field value that is not unique but required to be",
        db_errors::duplicated_document(),
    );
    mapper.register("Duplicate entry", db_errors::duplicated_document());
    mapper.register("You have an error in your SQL syntax", db_errors::db_instruction());
    mapper.register("PARSING FAILED", db_errors::db_instruction());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_registered_fragment_case_insensitively() {
        let mut mapper = ErrorsMapper::new();
        mapper.register("duplicate entry", db_errors::duplicated_document());

        let raw = DbError::raw("ERROR: Duplicate entry 'x@y.com' for key");
        assert_eq!(mapper.resolve(&raw), db_errors::duplicated_document());
    }

    #[test]
    fn exact_match_wins_before_substring_scan() {
        let mut mapper = ErrorsMapper::new();
        mapper.register("duplicate", db_errors::db_any_error());
        mapper.register("duplicate entry", db_errors::duplicated_document());

        let raw = DbError::raw("duplicate entry");
        assert_eq!(mapper.resolve(&raw), db_errors::duplicated_document());
    }

    #[test]
    fn substring_scan_follows_insertion_order() {
        let mut mapper = ErrorsMapper::new();
        mapper.register("syntax", db_errors::db_instruction());
        mapper.register("error in your sql syntax", db_errors::db_any_error());

        let raw = DbError::raw("You have an error in your SQL syntax near 'FROM'");
        assert_eq!(mapper.resolve(&raw), db_errors::db_instruction());
    }

    #[test]
    fn falls_back_to_default_message() {
        let mut mapper = ErrorsMapper::new();
        mapper.register("duplicate entry", db_errors::duplicated_document());
        mapper.set_default_message(db_errors::db_any_error());

        let raw = DbError::raw("connection reset by peer");
        assert_eq!(mapper.resolve(&raw), db_errors::db_any_error());
    }

    #[test]
    fn passes_normalized_errors_through_without_default() {
        let mapper = ErrorsMapper::new();
        let err = db_errors::document_not_found();
        assert_eq!(mapper.resolve(&err), err);
    }

    #[test]
    fn wraps_unmatched_raw_errors_with_empty_code() {
        let mapper = ErrorsMapper::new();
        let resolved = mapper.resolve(&DbError::raw("socket closed"));
        assert_eq!(resolved.code, "");
        assert_eq!(resolved.message, "socket closed");
    }

    #[test]
    fn unregister_removes_fragment() {
        let mut mapper = ErrorsMapper::new();
        mapper.register("Duplicate entry", db_errors::duplicated_document());
        mapper.unregister("duplicate entry");

        let raw = DbError::raw("duplicate entry 'x'");
        assert_eq!(mapper.resolve(&raw).code, "");
    }
}
