//! Schema descriptors: ordered field declarations, inheritance and dynamic fields.
//!
//! A [`SchemaDescriptor`] is built once with a [`SchemaBuilder`] and is
//! immutable afterwards; documents share it through an `Arc`.
//!
//! # Example
//!
//! ```ignore
//! use docschema::{field::FieldSpec, schema::SchemaDescriptor};
//!
//! let animal = SchemaDescriptor::builder("Animal")
//!     .field("name", FieldSpec::string().required())
//!     .build()?;
//!
//! let pet = SchemaDescriptor::builder("Pet")
//!     .inherit(&animal)
//!     .field("birthdate", FieldSpec::date())
//!     .build()?;
//!
//! let mut fluffy = pet.instantiate()?;
//! fluffy.set("name", "Fluffy")?;
//! assert!(fluffy.validate().is_empty());
//! ```

use serde_json::{Map, Value as JsonValue};
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    codec,
    document::Document,
    error::{DocumentError, DocumentResult, Violation},
    field::{FieldSpec, FieldType},
    value::Value,
};

/// Canonical key holding the document identity.
pub const ID_KEY: &str = "_id";
/// Canonical key holding the revision token.
pub const REV_KEY: &str = "_rev";
/// Canonical key holding the attachment index.
pub const ATTACHMENTS_KEY: &str = "_attachments";
/// Canonical key holding the type discriminator.
pub const DOC_TYPE_KEY: &str = "doc_type";

const RESERVED_NAMES: [&str; 3] = [ID_KEY, REV_KEY, ATTACHMENTS_KEY];

/// An immutable, ordered collection of field declarations.
pub struct SchemaDescriptor {
    name: String,
    discriminator: String,
    fields: Vec<FieldSpec>,
    allow_dynamic: bool,
}

impl SchemaDescriptor {
    /// Starts declaring a schema with the given name.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value written to the `doc_type` key of new documents.
    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Returns the declared fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.name() == name)
    }

    pub fn allows_dynamic(&self) -> bool {
        self.allow_dynamic
    }

    /// Returns `true` for canonical keys that can never be declared as fields.
    pub fn is_reserved(name: &str) -> bool {
        RESERVED_NAMES.contains(&name)
    }

    /// Returns `true` for keys managed by the document itself rather than by
    /// a field: the reserved keys and an undeclared discriminator.
    pub(crate) fn is_managed_key(&self, key: &str) -> bool {
        Self::is_reserved(key) || (key == DOC_TYPE_KEY && self.field(DOC_TYPE_KEY).is_none())
    }

    /// Creates a new document seeded from this schema's defaults.
    pub fn instantiate(self: &Arc<Self>) -> DocumentResult<Document> {
        Document::new(self)
    }

    /// Builds the canonical object for a fresh instance of this schema: every
    /// declared field holds its own freshly produced default.
    pub(crate) fn skeleton(&self) -> DocumentResult<Map<String, JsonValue>> {
        let mut object = Map::with_capacity(self.fields.len());

        for spec in &self.fields {
            object.insert(spec.name().to_string(), spec.to_wire(&spec.default_value())?);
        }

        Ok(object)
    }

    /// Fills declared fields missing from `object` with their defaults and
    /// collapses repeated elements of declared set slots.
    pub(crate) fn fill_defaults(&self, object: &mut Map<String, JsonValue>) -> DocumentResult<()> {
        for spec in &self.fields {
            match object.get_mut(spec.name()) {
                Some(slot) => normalize_sets(spec.field_type(), slot),
                None => {
                    object.insert(spec.name().to_string(), spec.to_wire(&spec.default_value())?);
                }
            }
        }

        Ok(())
    }

    /// Encodes a native map as an instance of this schema, used when a whole
    /// nested sub-document is assigned. Declared fields missing from the map
    /// get their defaults.
    pub(crate) fn encode_map(
        &self,
        map: &BTreeMap<String, Value>,
        path: &str,
    ) -> DocumentResult<Map<String, JsonValue>> {
        let mut object = Map::with_capacity(self.fields.len().max(map.len()));

        for spec in &self.fields {
            let field_path = format!("{path}.{}", spec.name());
            let json = match map.get(spec.name()) {
                Some(value) => codec::encode_named(value, Some(spec.field_type()), &field_path)?,
                None => spec.to_wire(&spec.default_value())?,
            };
            object.insert(spec.name().to_string(), json);
        }

        for (key, value) in map {
            if self.field(key).is_some() {
                continue;
            }
            if !self.allow_dynamic {
                return Err(DocumentError::UnknownField(format!("{path}.{key}")));
            }
            object.insert(key.clone(), codec::encode_named(value, None, &format!("{path}.{key}"))?);
        }

        Ok(object)
    }

    /// Decodes a canonical object of this schema into a native map. Declared
    /// fields use their types, other keys are inferred.
    pub(crate) fn decode_map(
        &self,
        object: &Map<String, JsonValue>,
        path: &str,
    ) -> DocumentResult<BTreeMap<String, Value>> {
        object
            .iter()
            .map(|(key, json)| {
                let field_path = format!("{path}.{key}");
                let expected = self.field(key).map(FieldSpec::field_type);
                codec::decode_named(json, expected, &field_path).map(|value| (key.clone(), value))
            })
            .collect()
    }

    /// Validates a native map against every declared field, collecting
    /// violations across fields.
    pub fn validate_map(&self, map: &BTreeMap<String, Value>, required: bool) -> Vec<Violation> {
        self.fields
            .iter()
            .flat_map(|spec| {
                let value = map.get(spec.name()).cloned().unwrap_or(Value::Null);
                spec.validate(&value, required)
            })
            .collect()
    }

    /// Validates a canonical object against every declared field.
    ///
    /// Slots that cannot be decoded as their declared type are reported as a
    /// failure of the built-in `type` validator.
    pub(crate) fn validate_object(&self, object: &Map<String, JsonValue>) -> Vec<Violation> {
        self.fields
            .iter()
            .flat_map(|spec| {
                let decoded = object
                    .get(spec.name())
                    .map(|json| spec.to_native(json))
                    .unwrap_or(Ok(Value::Null));

                match decoded {
                    Ok(value) => spec.validate(&value, true),
                    Err(err) => vec![Violation::ValidatorFailure {
                        field: spec.name().to_string(),
                        validator: "type".to_string(),
                        message: err.to_string(),
                    }],
                }
            })
            .collect()
    }

    /// Reads a field from a canonical object. Declared fields decode with
    /// their type and fall back to their default when absent; other keys are
    /// inferred from their JSON shape.
    pub(crate) fn read_field(
        &self,
        object: &Map<String, JsonValue>,
        name: &str,
    ) -> DocumentResult<Value> {
        match (self.field(name), object.get(name)) {
            (Some(spec), Some(json)) => spec.to_native(json),
            (Some(spec), None) => Ok(spec.default_value()),
            (None, Some(json)) => Ok(codec::infer(json)),
            (None, None) => Err(DocumentError::UnknownField(name.to_string())),
        }
    }

    /// Writes a field into a canonical object. The value is encoded and
    /// validated first; on failure the object is left untouched.
    pub(crate) fn write_field(
        &self,
        object: &mut Map<String, JsonValue>,
        name: &str,
        value: Value,
    ) -> DocumentResult<()> {
        let json = match self.field(name) {
            Some(spec) => spec.prepare(&value)?,
            None if self.is_managed_key(name) => {
                return Err(DocumentError::ReservedName(name.to_string()));
            }
            None if !self.allow_dynamic => {
                return Err(DocumentError::UnknownField(name.to_string()));
            }
            None => codec::encode_named(&value, None, name)?,
        };

        object.insert(name.to_string(), json);

        Ok(())
    }

    /// Removes a field from a canonical object. Declared fields are reset to
    /// their default, dynamic fields are dropped. Returns the previous value.
    pub(crate) fn remove_field(
        &self,
        object: &mut Map<String, JsonValue>,
        name: &str,
    ) -> DocumentResult<Option<Value>> {
        if self.is_managed_key(name) {
            return Err(DocumentError::ReservedName(name.to_string()));
        }

        match self.field(name) {
            Some(spec) => {
                let previous = object.get(name).map(|json| spec.to_native(json)).transpose()?;
                object.insert(name.to_string(), spec.to_wire(&spec.default_value())?);
                Ok(previous)
            }
            None => Ok(object.shift_remove(name).map(|json| codec::infer(&json))),
        }
    }

    /// Returns the keys of `object` that are neither declared nor managed.
    pub(crate) fn dynamic_keys(&self, object: &Map<String, JsonValue>) -> Vec<String> {
        object
            .keys()
            .filter(|key| self.field(key).is_none() && !self.is_managed_key(key))
            .cloned()
            .collect()
    }
}

/// Walks a declared slot and removes duplicate set elements wherever the
/// declared type reaches a set, including sets inside nested schemas.
fn normalize_sets(field_type: &FieldType, slot: &mut JsonValue) {
    match (field_type, slot) {
        (FieldType::Set(_), JsonValue::Array(items)) => codec::dedup_set(items),
        (FieldType::List(Some(item)), JsonValue::Array(items)) => {
            items.iter_mut().for_each(|child| normalize_sets(item, child));
        }
        (FieldType::Dict(Some(item)), JsonValue::Object(map)) => {
            map.values_mut().for_each(|child| normalize_sets(item, child));
        }
        (FieldType::Schema(schema), JsonValue::Object(object)) => {
            for spec in &schema.fields {
                if let Some(child) = object.get_mut(spec.name()) {
                    normalize_sets(spec.field_type(), child);
                }
            }
        }
        _ => {}
    }
}

impl fmt::Debug for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDescriptor")
            .field("name", &self.name)
            .field("discriminator", &self.discriminator)
            .field("fields", &self.fields.iter().map(FieldSpec::name).collect::<Vec<_>>())
            .field("allow_dynamic", &self.allow_dynamic)
            .finish()
    }
}

/// Builder for [`SchemaDescriptor`].
///
/// Declaration errors are reported by [`build`](SchemaBuilder::build); no
/// descriptor exists until every declaration is valid.
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    parents: Vec<Arc<SchemaDescriptor>>,
    fields: Vec<(String, FieldSpec)>,
    allow_dynamic: Option<bool>,
    discriminator: Option<String>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parents: Vec::new(),
            fields: Vec::new(),
            allow_dynamic: None,
            discriminator: None,
        }
    }

    /// Declares a field. A field re-declared from a parent overrides it.
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.fields.push((name.into(), spec));
        self
    }

    /// Inherits every field of `parent`. With several parents, the first one
    /// declaring a name wins.
    pub fn inherit(mut self, parent: &Arc<SchemaDescriptor>) -> Self {
        self.parents.push(Arc::clone(parent));
        self
    }

    /// Controls whether undeclared keys may be written. Defaults to the first
    /// parent's setting, or `true` without parents.
    pub fn allow_dynamic(mut self, allow: bool) -> Self {
        self.allow_dynamic = Some(allow);
        self
    }

    /// Overrides the `doc_type` value, which defaults to the schema name.
    pub fn discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Validates the declarations and builds the descriptor.
    ///
    /// # Errors
    ///
    /// - [`DocumentError::ReservedName`] if a field uses a reserved key
    /// - [`DocumentError::DuplicateField`] if a field is declared twice here
    /// - [`DocumentError::TypeMismatch`] if a fixed default has the wrong type
    pub fn build(self) -> DocumentResult<Arc<SchemaDescriptor>> {
        let mut fields: Vec<FieldSpec> = Vec::new();

        for parent in &self.parents {
            for spec in parent.fields() {
                if !fields.iter().any(|existing| existing.name() == spec.name()) {
                    fields.push(spec.clone());
                }
            }
        }

        let mut declared: Vec<&str> = Vec::with_capacity(self.fields.len());

        for (name, spec) in &self.fields {
            if SchemaDescriptor::is_reserved(name) {
                return Err(DocumentError::ReservedName(name.clone()));
            }
            if declared.contains(&name.as_str()) {
                return Err(DocumentError::DuplicateField(name.clone()));
            }
            declared.push(name);

            let mut spec = spec.clone();
            spec.name = name.clone();

            if let Some(value) = spec.has_static_default() {
                spec.to_wire(value)?;
            }

            match fields.iter_mut().find(|existing| existing.name() == name) {
                Some(existing) => *existing = spec,
                None => fields.push(spec),
            }
        }

        let declared_discriminator = fields
            .iter()
            .find(|spec| spec.name() == DOC_TYPE_KEY)
            .and_then(|spec| spec.has_static_default())
            .and_then(|value| value.as_str().map(str::to_string));

        let discriminator = self
            .discriminator
            .or(declared_discriminator)
            .unwrap_or_else(|| self.name.clone());

        let allow_dynamic = self
            .allow_dynamic
            .or_else(|| self.parents.first().map(|parent| parent.allows_dynamic()))
            .unwrap_or(true);

        tracing::debug!(
            schema = %self.name,
            discriminator = %discriminator,
            fields = fields.len(),
            allow_dynamic,
            "built schema descriptor"
        );

        Ok(Arc::new(SchemaDescriptor {
            name: self.name,
            discriminator,
            fields,
            allow_dynamic,
        }))
    }
}
