//! Documents: one schema descriptor bound to one canonical JSON tree.
//!
//! The canonical tree is the only storage. Field reads decode from it, field
//! writes encode into it, and container fields are edited through proxies
//! that write through to their slot.
//!
//! # Example
//!
//! ```ignore
//! use docschema::prelude::*;
//!
//! let pet = SchemaDescriptor::builder("Pet")
//!     .field("name", FieldSpec::string().required())
//!     .field("tags", FieldSpec::set(Some(FieldType::String)))
//!     .build()?;
//!
//! let mut fluffy = pet.instantiate()?;
//! fluffy.set("name", "Fluffy")?;
//! fluffy.set_mut("tags")?.add("cat")?;
//!
//! assert_eq!(fluffy.encode()["tags"], serde_json::json!(["cat"]));
//! ```

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    error::{DocumentError, DocumentResult, Violation},
    proxy::{self, DictProxy, ListProxy, SchemaProxy, SetProxy},
    schema::{ATTACHMENTS_KEY, DOC_TYPE_KEY, ID_KEY, REV_KEY, SchemaDescriptor},
    tree::Path,
    value::{FromValue, Value},
};

/// An entry of the `_attachments` index.
///
/// Attachment bytes are handled by the persistence collaborator; a document
/// only carries the index, either with inline base64 `data` or as a `stub`
/// pointing at bytes already stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stub: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revpos: Option<u64>,
}

impl Attachment {
    /// An attachment carried inline as base64 data.
    pub fn inline(content_type: impl Into<String>, data: impl Into<String>, length: u64) -> Self {
        Self {
            content_type: content_type.into(),
            length: Some(length),
            data: Some(data.into()),
            stub: false,
            digest: None,
            revpos: None,
        }
    }

    /// A stub referring to bytes the collaborator already holds.
    pub fn stub(content_type: impl Into<String>, length: u64) -> Self {
        Self {
            content_type: content_type.into(),
            length: Some(length),
            data: None,
            stub: true,
            digest: None,
            revpos: None,
        }
    }
}

/// A schema instance backed by a canonical JSON object.
#[derive(Debug, Clone)]
pub struct Document {
    schema: Arc<SchemaDescriptor>,
    tree: JsonValue,
}

impl Document {
    /// Creates an empty document: every declared field holds a fresh default
    /// and the discriminator is stamped.
    pub fn new(schema: &Arc<SchemaDescriptor>) -> DocumentResult<Self> {
        let mut object = schema.skeleton()?;
        stamp_doc_type(schema, &mut object);

        Ok(Self {
            schema: Arc::clone(schema),
            tree: JsonValue::Object(object),
        })
    }

    /// Wraps a raw canonical object without validating it.
    ///
    /// Declared fields missing from `json` are filled with their defaults and
    /// a missing discriminator is stamped; everything else is kept as-is.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Serialization`] if `json` is not an object.
    pub fn decode(schema: &Arc<SchemaDescriptor>, json: JsonValue) -> DocumentResult<Self> {
        let JsonValue::Object(mut object) = json else {
            return Err(DocumentError::Serialization(format!(
                "expected a JSON object for '{}'",
                schema.name()
            )));
        };

        schema.fill_defaults(&mut object)?;
        stamp_doc_type(schema, &mut object);

        Ok(Self {
            schema: Arc::clone(schema),
            tree: JsonValue::Object(object),
        })
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    /// Returns the canonical tree as it would be persisted.
    pub fn encode(&self) -> JsonValue {
        self.tree.clone()
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.tree
    }

    pub fn into_json(self) -> JsonValue {
        self.tree
    }

    fn object(&self) -> DocumentResult<&Map<String, JsonValue>> {
        self.tree
            .as_object()
            .ok_or_else(|| DocumentError::Serialization("document root is not an object".into()))
    }

    fn object_mut(&mut self) -> DocumentResult<&mut Map<String, JsonValue>> {
        self.tree
            .as_object_mut()
            .ok_or_else(|| DocumentError::Serialization("document root is not an object".into()))
    }

    /// Validates every declared field, collecting violations across fields.
    pub fn validate(&self) -> Vec<Violation> {
        self.object()
            .map(|object| self.schema.validate_object(object))
            .unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Reads a field. Declared fields decode with their type, dynamic fields
    /// are inferred from their JSON shape.
    pub fn get(&self, name: &str) -> DocumentResult<Value> {
        self.schema.read_field(self.object()?, name)
    }

    /// Reads a field and converts it to a concrete Rust type.
    pub fn get_as<T: FromValue>(&self, name: &str) -> DocumentResult<T> {
        T::from_value(self.get(name)?)
    }

    /// Assigns a field. On any type or validation failure the tree is left
    /// unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        schema.write_field(self.object_mut()?, name, value.into())
    }

    /// Resets a declared field to its default or drops a dynamic field,
    /// returning the previous value.
    pub fn remove(&mut self, name: &str) -> DocumentResult<Option<Value>> {
        let schema = Arc::clone(&self.schema);
        schema.remove_field(self.object_mut()?, name)
    }

    /// Keys present in the tree that are neither declared nor reserved.
    pub fn dynamic_keys(&self) -> Vec<String> {
        self.object()
            .map(|object| self.schema.dynamic_keys(object))
            .unwrap_or_default()
    }

    pub fn list_mut(&mut self, name: &str) -> DocumentResult<ListProxy<'_>> {
        proxy::list_field(&mut self.tree, &Path::root(), &self.schema, name)
    }

    pub fn dict_mut(&mut self, name: &str) -> DocumentResult<DictProxy<'_>> {
        proxy::dict_field(&mut self.tree, &Path::root(), &self.schema, name)
    }

    pub fn set_mut(&mut self, name: &str) -> DocumentResult<SetProxy<'_>> {
        proxy::set_field(&mut self.tree, &Path::root(), &self.schema, name)
    }

    pub fn schema_mut(&mut self, name: &str) -> DocumentResult<SchemaProxy<'_>> {
        proxy::schema_field(&mut self.tree, &Path::root(), &self.schema, name)
    }

    fn reserved_str(&self, key: &str) -> Option<&str> {
        self.tree.get(key).and_then(JsonValue::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.reserved_str(ID_KEY)
    }

    pub fn revision(&self) -> Option<&str> {
        self.reserved_str(REV_KEY)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.reserved_str(DOC_TYPE_KEY)
    }

    /// Sets the identity. Normally only the persistence collaborator does this.
    pub fn set_id(&mut self, id: impl Into<String>) -> DocumentResult<()> {
        self.object_mut()?.insert(ID_KEY.to_string(), JsonValue::String(id.into()));
        Ok(())
    }

    /// Sets the revision token. Normally only the persistence collaborator does this.
    pub fn set_revision(&mut self, revision: impl Into<String>) -> DocumentResult<()> {
        self.object_mut()?.insert(REV_KEY.to_string(), JsonValue::String(revision.into()));
        Ok(())
    }

    /// Returns the attachment index.
    pub fn attachments(&self) -> DocumentResult<BTreeMap<String, Attachment>> {
        match self.tree.get(ATTACHMENTS_KEY) {
            None | Some(JsonValue::Null) => Ok(BTreeMap::new()),
            Some(index) => Ok(serde_json::from_value(index.clone())?),
        }
    }

    /// Adds or replaces an entry of the attachment index.
    pub fn put_attachment(&mut self, name: impl Into<String>, attachment: Attachment) -> DocumentResult<()> {
        let entry = serde_json::to_value(attachment)?;
        let object = self.object_mut()?;

        let index = object
            .entry(ATTACHMENTS_KEY)
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !index.is_object() {
            *index = JsonValue::Object(Map::new());
        }
        if let JsonValue::Object(index) = index {
            index.insert(name.into(), entry);
        }

        Ok(())
    }

    /// Removes an entry of the attachment index.
    pub fn remove_attachment(&mut self, name: &str) -> DocumentResult<Option<Attachment>> {
        let removed = self
            .object_mut()?
            .get_mut(ATTACHMENTS_KEY)
            .and_then(JsonValue::as_object_mut)
            .and_then(|index| index.shift_remove(name));

        Ok(removed.map(serde_json::from_value::<Attachment>).transpose()?)
    }

    /// Refreshes `auto_now` fields and fills empty `auto_now_add` fields with
    /// the current time. Called by the store right before saving.
    pub fn touch(&mut self) -> DocumentResult<()> {
        let schema = Arc::clone(&self.schema);
        let object = self.object_mut()?;

        for spec in schema.fields() {
            let empty = object.get(spec.name()).is_none_or(JsonValue::is_null);
            if !(spec.is_auto_now() || (spec.is_auto_now_add() && empty)) {
                continue;
            }
            if let Some(now) = spec.current_time() {
                object.insert(spec.name().to_string(), spec.to_wire(&now)?);
            }
        }

        Ok(())
    }

    /// Converts the canonical tree to BSON for BSON-speaking collaborators.
    pub fn to_bson(&self) -> DocumentResult<Bson> {
        Ok(serialize_to_bson(&self.tree)?)
    }

    /// Decodes a BSON document, with the same rules as [`Document::decode`].
    pub fn from_bson(schema: &Arc<SchemaDescriptor>, bson: Bson) -> DocumentResult<Self> {
        let json: JsonValue = deserialize_from_bson(bson)?;
        Self::decode(schema, json)
    }
}

fn stamp_doc_type(schema: &SchemaDescriptor, object: &mut Map<String, JsonValue>) {
    if !matches!(object.get(DOC_TYPE_KEY), Some(JsonValue::String(_))) {
        object.insert(
            DOC_TYPE_KEY.to_string(),
            JsonValue::String(schema.discriminator().to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldSpec, FieldType};
    use serde_json::json;

    fn pet() -> Arc<SchemaDescriptor> {
        SchemaDescriptor::builder("Pet")
            .field("name", FieldSpec::string().required())
            .field("tags", FieldSpec::list(Some(FieldType::String)))
            .field("seen", FieldSpec::datetime().auto_now())
            .build()
            .unwrap()
    }

    #[test]
    fn new_document_is_seeded_and_stamped() {
        let doc = Document::new(&pet()).unwrap();

        assert_eq!(doc.doc_type(), Some("Pet"));
        assert_eq!(doc.encode()["tags"], json!([]));
        assert_eq!(doc.id(), None);
        assert_eq!(
            doc.validate(),
            vec![Violation::RequiredFieldMissing { field: "name".into() }]
        );
    }

    #[test]
    fn decode_fills_defaults_and_keeps_unknown_keys() {
        let doc = Document::decode(&pet(), json!({"_id": "p1", "name": 5, "extra": "2024-02-29"})).unwrap();

        assert_eq!(doc.id(), Some("p1"));
        assert_eq!(doc.encode()["tags"], json!([]));
        assert_eq!(doc.dynamic_keys(), vec!["extra".to_string()]);
        assert!(matches!(doc.get("name"), Err(DocumentError::TypeMismatch { .. })));
        assert!(matches!(
            Document::decode(&pet(), json!([1, 2])),
            Err(DocumentError::Serialization(_))
        ));
    }

    #[test]
    fn reserved_keys_cannot_be_assigned_as_fields() {
        let mut doc = Document::new(&pet()).unwrap();

        assert!(matches!(doc.set("_id", "x"), Err(DocumentError::ReservedName(_))));
        assert!(matches!(doc.set("doc_type", "Cat"), Err(DocumentError::ReservedName(_))));
        doc.set_id("x").unwrap();
        doc.set_revision("1-abc").unwrap();

        assert_eq!(doc.id(), Some("x"));
        assert_eq!(doc.revision(), Some("1-abc"));
    }

    #[test]
    fn attachment_index_round_trips() {
        let mut doc = Document::new(&pet()).unwrap();
        doc.put_attachment("photo.png", Attachment::inline("image/png", "aGVsbG8=", 5)).unwrap();
        doc.put_attachment("old.txt", Attachment::stub("text/plain", 12)).unwrap();

        assert_eq!(
            doc.encode()["_attachments"]["old.txt"],
            json!({"content_type": "text/plain", "length": 12, "stub": true})
        );
        assert_eq!(doc.attachments().unwrap().len(), 2);
        assert_eq!(
            doc.remove_attachment("photo.png").unwrap(),
            Some(Attachment::inline("image/png", "aGVsbG8=", 5))
        );
        assert!(doc.dynamic_keys().is_empty());
    }

    #[test]
    fn touch_refreshes_auto_now_fields() {
        let mut doc = Document::decode(&pet(), json!({"name": "Rex", "seen": null})).unwrap();
        doc.touch().unwrap();

        assert!(matches!(doc.get("seen").unwrap(), Value::DateTime(_)));
    }

    #[test]
    fn bson_bridge_keeps_the_canonical_tree() {
        let mut doc = Document::new(&pet()).unwrap();
        doc.set("name", "Rex").unwrap();
        doc.list_mut("tags").unwrap().push("good").unwrap();

        let back = Document::from_bson(doc.schema(), doc.to_bson().unwrap()).unwrap();

        assert_eq!(back.encode(), doc.encode());
    }
}
