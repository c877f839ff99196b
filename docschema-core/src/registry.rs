//! Discriminator-keyed registry of schema descriptors.
//!
//! Collaborators that receive raw documents of mixed types (query results,
//! change feeds) use a [`SchemaRegistry`] to pick the descriptor named by a
//! document's `doc_type` before decoding it.

use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Arc};

use crate::{
    document::Document,
    error::{DocumentError, DocumentResult},
    schema::{DOC_TYPE_KEY, SchemaDescriptor},
};

#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<SchemaDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor under its discriminator, returning the
    /// descriptor it replaced, if any.
    pub fn register(&mut self, schema: &Arc<SchemaDescriptor>) -> Option<Arc<SchemaDescriptor>> {
        tracing::debug!(
            schema = schema.name(),
            discriminator = schema.discriminator(),
            "registering schema"
        );
        self.schemas
            .insert(schema.discriminator().to_string(), Arc::clone(schema))
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with(mut self, schema: &Arc<SchemaDescriptor>) -> Self {
        self.register(schema);
        self
    }

    pub fn get(&self, discriminator: &str) -> Option<&Arc<SchemaDescriptor>> {
        self.schemas.get(discriminator)
    }

    pub fn contains(&self, discriminator: &str) -> bool {
        self.schemas.contains_key(discriminator)
    }

    pub fn unregister(&mut self, discriminator: &str) -> Option<Arc<SchemaDescriptor>> {
        self.schemas.remove(discriminator)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
    }

    /// Resolves the descriptor for a raw canonical document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnknownDiscriminator`] if the document has no
    /// string `doc_type` or no descriptor is registered for it.
    pub fn resolve(&self, raw: &JsonValue) -> DocumentResult<&Arc<SchemaDescriptor>> {
        let discriminator = raw
            .get(DOC_TYPE_KEY)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| DocumentError::UnknownDiscriminator(String::new()))?;

        self.get(discriminator)
            .ok_or_else(|| DocumentError::UnknownDiscriminator(discriminator.to_string()))
    }

    /// Decodes a raw canonical document with the descriptor its `doc_type`
    /// names.
    pub fn decode(&self, raw: JsonValue) -> DocumentResult<Document> {
        let schema = Arc::clone(self.resolve(&raw)?);
        Document::decode(&schema, raw)
    }
}
