//! Document schema descriptors.
//!
//! A [`DocumentSchema`] is created once at process start, is immutable, and is
//! shared by every operation against its collection. It names the collection,
//! fixes the identity strategy, declares composite-uniqueness indexes, and
//! carries the default-filling factory that turns partial values into a full
//! document.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Document, document_from};
use crate::ident::generate_id;

/// Default-filling factory: partial values in, full document out.
pub type DocumentFactory = Arc<dyn Fn(Document) -> Document + Send + Sync>;

/// Optional human-readable renderer for a document.
pub type DocumentDisplay = Arc<dyn Fn(&Document) -> String + Send + Sync>;

/// Opaque, backend-specific validation descriptor attached to a schema.
///
/// The descriptor is passed through uninterpreted to the backend's own
/// validation facility; this layer only reads the enumerated property names
/// when translating raw result columns back into documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentValidation {
    pub level: String,
    pub schema: Value,
}

impl DocumentValidation {
    pub fn strict(schema: Value) -> Self {
        Self { level: "strict".to_string(), schema }
    }

    /// Property names enumerated by the descriptor, if any.
    pub fn properties(&self) -> Vec<String> {
        self.schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Immutable descriptor of a document collection.
#[derive(Clone)]
pub struct DocumentSchema {
    name: String,
    alias: String,
    id_field: String,
    generated_id: bool,
    unique: Vec<Vec<String>>,
    factory: DocumentFactory,
    display: Option<DocumentDisplay>,
    validation: Option<DocumentValidation>,
}

impl DocumentSchema {
    pub fn builder(name: impl Into<String>) -> DocumentSchemaBuilder {
        DocumentSchemaBuilder::new(name)
    }

    /// Collection/table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short alias, used as the generated-identifier prefix.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Name of the identity field, `_id` unless overridden.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Whether identifiers are generated by the backend on insert.
    pub fn generated_id(&self) -> bool {
        self.generated_id
    }

    /// Composite-uniqueness indexes; each inner sequence is one index.
    pub fn unique(&self) -> &[Vec<String>] {
        &self.unique
    }

    pub fn validation(&self) -> Option<&DocumentValidation> {
        self.validation.as_ref()
    }

    /// Property names declared by the validation descriptor.
    pub fn declared_properties(&self) -> Vec<String> {
        self.validation
            .as_ref()
            .map(DocumentValidation::properties)
            .unwrap_or_default()
    }

    /// Runs the default-filling factory over partial values.
    pub fn get_document(&self, values: Document) -> Document {
        (self.factory)(values)
    }

    /// Renders a document for humans: the schema renderer if present, the
    /// identity field otherwise, `"unknown"` for an absent document.
    pub fn display(&self, document: Option<&Document>) -> String {
        let Some(document) = document else {
            return "unknown".to_string();
        };
        if let Some(display) = &self.display {
            return display(document);
        }
        match document.get(&self.id_field) {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        }
    }
}

impl fmt::Debug for DocumentSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSchema")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("id_field", &self.id_field)
            .field("generated_id", &self.generated_id)
            .field("unique", &self.unique)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DocumentSchema`].
pub struct DocumentSchemaBuilder {
    name: String,
    alias: Option<String>,
    id_field: String,
    generated_id: bool,
    unique: Vec<Vec<String>>,
    factory: Option<DocumentFactory>,
    display: Option<DocumentDisplay>,
    validation: Option<DocumentValidation>,
}

impl DocumentSchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            id_field: "_id".to_string(),
            generated_id: false,
            unique: Vec::new(),
            factory: None,
            display: None,
            validation: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn generated_id(mut self, generated_id: bool) -> Self {
        self.generated_id = generated_id;
        self
    }

    /// Declares one composite-uniqueness index over the given fields.
    pub fn unique<I>(mut self, fields: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.unique
            .push(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the default-filling factory. Without one, the built schema uses a
    /// factory that passes values through and, for caller-generated
    /// identities, fills a missing identity field with a fresh alias-prefixed
    /// id.
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Document) -> Document + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// Sets defaults laid under caller values by the built-in factory.
    pub fn defaults(self, defaults: Document) -> Self {
        self.factory(move |values| document_from(&defaults, &values))
    }

    pub fn display<F>(mut self, display: F) -> Self
    where
        F: Fn(&Document) -> String + Send + Sync + 'static,
    {
        self.display = Some(Arc::new(display));
        self
    }

    pub fn validation(mut self, validation: DocumentValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn build(self) -> DocumentSchema {
        let alias = self.alias.unwrap_or_else(|| self.name.clone());
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(|values: Document| values));

        let id_field = self.id_field.clone();
        let generated_id = self.generated_id;
        let identity_alias = alias.clone();
        let inner = factory;
        // Identity is applied after the factory so custom factories never have
        // to repeat the id-generation policy.
        let factory: DocumentFactory = Arc::new(move |values: Document| {
            let mut doc = inner(values);
            if !generated_id && !doc.contains_key(&id_field) {
                doc.insert(
                    id_field.clone(),
                    Value::String(generate_id(Some(&identity_alias), None)),
                );
            }
            doc
        });

        DocumentSchema {
            name: self.name,
            alias,
            id_field: self.id_field,
            generated_id: self.generated_id,
            unique: self.unique,
            factory,
            display: self.display,
            validation: self.validation,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn builder_applies_defaults() {
        let schema = DocumentSchema::builder("office").build();
        assert_eq!(schema.alias(), "office");
        assert_eq!(schema.id_field(), "_id");
        assert!(!schema.generated_id());
        assert!(schema.unique().is_empty());
    }

    #[test]
    fn built_in_factory_fills_a_missing_identity() {
        let schema = DocumentSchema::builder("office").alias("off").build();
        let built = schema.get_document(doc(json!({ "name": "HQ" })));
        let id = built["_id"].as_str().unwrap();
        assert!(id.starts_with("off_"));
    }

    #[test]
    fn factory_never_overwrites_a_present_identity() {
        let schema = DocumentSchema::builder("office").build();
        let built = schema.get_document(doc(json!({ "_id": "hq", "name": "HQ" })));
        assert_eq!(built["_id"], "hq");
    }

    #[test]
    fn generated_id_schemas_leave_the_identity_to_the_backend() {
        let schema = DocumentSchema::builder("log").generated_id(true).build();
        let built = schema.get_document(doc(json!({ "line": "x" })));
        assert_eq!(built.get("_id"), None);
    }

    #[test]
    fn defaults_fill_gaps_but_never_overwrite() {
        let schema = DocumentSchema::builder("office")
            .defaults(doc(json!({ "places": 0, "country": "US" })))
            .build();
        let built = schema.get_document(doc(json!({ "places": 10 })));
        assert_eq!(built["places"], 10);
        assert_eq!(built["country"], "US");
    }

    #[test]
    fn display_falls_back_to_identity_then_unknown() {
        let schema = DocumentSchema::builder("office").build();
        assert_eq!(schema.display(None), "unknown");

        let document = doc(json!({ "_id": "hq" }));
        assert_eq!(schema.display(Some(&document)), "hq");

        let named = DocumentSchema::builder("office")
            .display(|d| d["name"].as_str().unwrap_or("?").to_string())
            .build();
        let document = doc(json!({ "_id": "hq", "name": "Headquarters" }));
        assert_eq!(named.display(Some(&document)), "Headquarters");
    }

    #[test]
    fn declared_properties_come_from_the_validation_descriptor() {
        let schema = DocumentSchema::builder("office")
            .validation(DocumentValidation::strict(json!({
                "type": "object",
                "properties": {
                    "_id": { "type": "string" },
                    "name": { "type": "string" },
                }
            })))
            .build();
        let mut props = schema.declared_properties();
        props.sort();
        assert_eq!(props, vec!["_id".to_string(), "name".to_string()]);
    }
}
