//! Document representation and result materialization helpers.
//!
//! A document is an untyped mapping from declared field names to JSON values,
//! always including the schema's identity field once materialized.

use serde_json::{Map, Value};

/// One schema-conformant record.
pub type Document = Map<String, Value>;

/// Builds a document by laying `values` over `defaults`: defaults only fill
/// gaps, they never overwrite a value the caller supplied.
pub fn document_from(defaults: &Document, values: &Document) -> Document {
    let mut doc = defaults.clone();
    for (key, value) in values {
        doc.insert(key.clone(), value.clone());
    }
    doc
}

/// Merges a patch over a base document; patched fields win.
pub fn merge(base: &Document, patch: &Document) -> Document {
    document_from(base, patch)
}

/// A column-introspected result set from a raw statement: column labels plus
/// positional rows, as produced by a backend cursor.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SqlResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn has_data(&self) -> bool {
        !self.rows.is_empty()
    }

    /// The first value of the first row, for scalar queries such as counts.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Translates the rows into documents, keeping only the columns whose
    /// label appears in `props`.
    pub fn into_documents(self, props: &[String]) -> Vec<Document> {
        let SqlResultSet { columns, rows } = self;
        rows.into_iter()
            .map(|row| {
                let mut doc = Document::new();
                for (i, column) in columns.iter().enumerate() {
                    if props.iter().any(|p| p == column) {
                        doc.insert(column.clone(), row.get(i).cloned().unwrap_or(Value::Null));
                    }
                }
                doc
            })
            .collect()
    }
}
