//! Write-through proxies over slots of a document's canonical tree.
//!
//! A proxy is a `(root, path)` pair: it mutably borrows the document's tree
//! and resolves its [`Path`] on every call, so every mutation lands in the
//! canonical tree within the same call and no value is ever cached.
//!
//! Child proxies are materialized lazily, one slot at a time, and borrow
//! their parent. While a child is alive its slot cannot be replaced, and once
//! the slot has been replaced the child must be materialized again:
//!
//! ```compile_fail
//! # use docschema_core::{field::FieldSpec, schema::SchemaDescriptor};
//! let schema = SchemaDescriptor::builder("Doc")
//!     .field("meta", FieldSpec::dict(None))
//!     .build()
//!     .unwrap();
//! let mut doc = schema.instantiate().unwrap();
//!
//! let mut child = doc.dict_mut("meta").unwrap();
//! doc.set("meta", std::collections::BTreeMap::<String, i64>::new()).unwrap();
//! child.insert("stale", 1).unwrap();
//! ```
//!
//! A path that no longer resolves to a slot of the expected shape yields
//! [`DocumentError::StaleProxy`].

use serde_json::{Map, Value as JsonValue};
use std::{collections::BTreeMap, sync::Arc};

use crate::{
    codec::{self, json_kind},
    error::{DocumentError, DocumentResult, Violation},
    field::FieldType,
    schema::SchemaDescriptor,
    tree::Path,
    value::{FromValue, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerKind {
    List,
    Dict,
    Set,
    Schema,
}

impl ContainerKind {
    fn name(self) -> &'static str {
        match self {
            ContainerKind::List => "list",
            ContainerKind::Dict => "dict",
            ContainerKind::Set => "set",
            ContainerKind::Schema => "schema",
        }
    }

    fn accepts(self, field_type: &FieldType) -> bool {
        matches!(
            (self, field_type),
            (ContainerKind::List, FieldType::List(_))
                | (ContainerKind::Dict, FieldType::Dict(_))
                | (ContainerKind::Set, FieldType::Set(_))
                | (ContainerKind::Schema, FieldType::Schema(_))
        )
    }

    fn shape_matches(self, json: &JsonValue) -> bool {
        match self {
            ContainerKind::List | ContainerKind::Set => json.is_array(),
            ContainerKind::Dict | ContainerKind::Schema => json.is_object(),
        }
    }
}

fn stale(path: &Path, expected: &'static str) -> DocumentError {
    DocumentError::StaleProxy {
        path: path.to_string(),
        expected,
    }
}

fn object_at<'r>(root: &'r JsonValue, path: &Path) -> DocumentResult<&'r Map<String, JsonValue>> {
    path.resolve(root)
        .and_then(JsonValue::as_object)
        .ok_or_else(|| stale(path, "object"))
}

fn object_at_mut<'r>(
    root: &'r mut JsonValue,
    path: &Path,
) -> DocumentResult<&'r mut Map<String, JsonValue>> {
    path.resolve_mut(root)
        .and_then(JsonValue::as_object_mut)
        .ok_or_else(|| stale(path, "object"))
}

fn array_at<'r>(root: &'r JsonValue, path: &Path) -> DocumentResult<&'r Vec<JsonValue>> {
    path.resolve(root)
        .and_then(JsonValue::as_array)
        .ok_or_else(|| stale(path, "array"))
}

fn array_at_mut<'r>(root: &'r mut JsonValue, path: &Path) -> DocumentResult<&'r mut Vec<JsonValue>> {
    path.resolve_mut(root)
        .and_then(JsonValue::as_array_mut)
        .ok_or_else(|| stale(path, "array"))
}

/// Returns the item type of a container type.
fn inner_item(declared: Option<FieldType>) -> Option<FieldType> {
    match declared {
        Some(FieldType::List(item) | FieldType::Dict(item) | FieldType::Set(item)) => {
            item.map(|item| *item)
        }
        _ => None,
    }
}

/// Checks that a slot can back a proxy of the given kind, replacing a null
/// slot with an empty container (or the nested skeleton) first.
fn materialize_slot(
    slot: &mut JsonValue,
    declared: Option<&FieldType>,
    kind: ContainerKind,
    path: &Path,
) -> DocumentResult<()> {
    let mismatch = |found: String| DocumentError::TypeMismatch {
        field: path.to_string(),
        expected: kind.name().to_string(),
        found,
    };

    match declared {
        Some(field_type) if !kind.accepts(field_type) => return Err(mismatch(field_type.name())),
        None if kind == ContainerKind::Schema => return Err(mismatch("dynamic".to_string())),
        _ => {}
    }

    if slot.is_null() {
        *slot = match declared {
            Some(FieldType::Schema(schema)) => JsonValue::Object(schema.skeleton()?),
            _ => match kind {
                ContainerKind::List | ContainerKind::Set => JsonValue::Array(Vec::new()),
                ContainerKind::Dict | ContainerKind::Schema => JsonValue::Object(Map::new()),
            },
        };
    }

    if !kind.shape_matches(slot) {
        return Err(mismatch(json_kind(slot).to_string()));
    }

    if let (ContainerKind::Set, JsonValue::Array(items)) = (kind, slot) {
        codec::dedup_set(items);
    }

    Ok(())
}

/// Materializes the slot of field `name` of the object at `path` and returns
/// the child path with the field's declared type.
fn materialize_field(
    root: &mut JsonValue,
    path: &Path,
    schema: &SchemaDescriptor,
    name: &str,
    kind: ContainerKind,
) -> DocumentResult<(Path, Option<FieldType>)> {
    let object = object_at_mut(root, path)?;

    let declared = match schema.field(name) {
        Some(spec) => {
            if !object.contains_key(name) {
                object.insert(name.to_string(), spec.to_wire(&spec.default_value())?);
            }
            Some(spec.field_type().clone())
        }
        None if schema.is_managed_key(name) => {
            return Err(DocumentError::ReservedName(name.to_string()));
        }
        None if !object.contains_key(name) => {
            return Err(DocumentError::UnknownField(name.to_string()));
        }
        None => None,
    };

    let child = path.key(name);
    let slot = object
        .get_mut(name)
        .ok_or_else(|| stale(&child, kind.name()))?;
    materialize_slot(slot, declared.as_ref(), kind, &child)?;

    Ok((child, declared))
}

pub(crate) fn list_field<'r>(
    root: &'r mut JsonValue,
    path: &Path,
    schema: &SchemaDescriptor,
    name: &str,
) -> DocumentResult<ListProxy<'r>> {
    let (child, declared) = materialize_field(root, path, schema, name, ContainerKind::List)?;
    Ok(ListProxy::new(root, child, inner_item(declared)))
}

pub(crate) fn dict_field<'r>(
    root: &'r mut JsonValue,
    path: &Path,
    schema: &SchemaDescriptor,
    name: &str,
) -> DocumentResult<DictProxy<'r>> {
    let (child, declared) = materialize_field(root, path, schema, name, ContainerKind::Dict)?;
    Ok(DictProxy::new(root, child, inner_item(declared)))
}

pub(crate) fn set_field<'r>(
    root: &'r mut JsonValue,
    path: &Path,
    schema: &SchemaDescriptor,
    name: &str,
) -> DocumentResult<SetProxy<'r>> {
    let (child, declared) = materialize_field(root, path, schema, name, ContainerKind::Set)?;
    Ok(SetProxy::new(root, child, inner_item(declared)))
}

pub(crate) fn schema_field<'r>(
    root: &'r mut JsonValue,
    path: &Path,
    schema: &SchemaDescriptor,
    name: &str,
) -> DocumentResult<SchemaProxy<'r>> {
    match materialize_field(root, path, schema, name, ContainerKind::Schema)? {
        (child, Some(FieldType::Schema(nested))) => Ok(SchemaProxy::new(root, child, nested)),
        (child, _) => Err(stale(&child, "object")),
    }
}

/// Encodes an item written through a list, dict or set proxy. Items of a
/// nested schema type also go through that schema's choices and validators,
/// so a rejected item never reaches the tree.
fn encode_checked(value: &Value, item: Option<&FieldType>, path: &Path) -> DocumentResult<JsonValue> {
    let location = path.to_string();
    let json = codec::encode_named(value, item, &location)?;

    if let (Some(FieldType::Schema(schema)), Value::Dict(map)) = (item, value) {
        if let Some(violation) = schema.validate_map(map, false).into_iter().next() {
            return Err(DocumentError::Validation(violation.nested_under(&location)));
        }
    }

    Ok(json)
}

/// Encodes a value only to compare it with stored items. A value that cannot
/// take the item type cannot be stored, so it yields `None`.
fn encode_lookup(value: &Value, item: Option<&FieldType>, path: &Path) -> Option<JsonValue> {
    codec::encode_named(value, item, &path.to_string()).ok()
}

/// Materializes the item slot at `path` (an element of a list or dict proxy).
fn materialize_item(
    root: &mut JsonValue,
    path: &Path,
    item: Option<&FieldType>,
    kind: ContainerKind,
    missing: impl FnOnce() -> DocumentError,
) -> DocumentResult<()> {
    let slot = path.resolve_mut(root).ok_or_else(missing)?;
    materialize_slot(slot, item, kind, path)
}

/// A write-through proxy over a canonical array slot.
#[derive(Debug)]
pub struct ListProxy<'a> {
    root: &'a mut JsonValue,
    path: Path,
    item: Option<FieldType>,
}

impl<'a> ListProxy<'a> {
    pub(crate) fn new(root: &'a mut JsonValue, path: Path, item: Option<FieldType>) -> Self {
        Self { root, path, item }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the homogeneous item type, if one is declared.
    pub fn item_type(&self) -> Option<&FieldType> {
        self.item.as_ref()
    }

    fn items(&self) -> DocumentResult<&Vec<JsonValue>> {
        array_at(&*self.root, &self.path)
    }

    fn items_mut(&mut self) -> DocumentResult<&mut Vec<JsonValue>> {
        array_at_mut(&mut *self.root, &self.path)
    }

    fn encode_item(&self, value: &Value, index: usize) -> DocumentResult<JsonValue> {
        encode_checked(value, self.item.as_ref(), &self.path.index(index))
    }

    fn decode_item(&self, json: &JsonValue, index: usize) -> DocumentResult<Value> {
        codec::decode_named(json, self.item.as_ref(), &self.path.index(index).to_string())
    }

    pub fn len(&self) -> DocumentResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn is_empty(&self) -> DocumentResult<bool> {
        Ok(self.items()?.is_empty())
    }

    pub fn get(&self, index: usize) -> DocumentResult<Option<Value>> {
        self.items()?
            .get(index)
            .map(|json| self.decode_item(json, index))
            .transpose()
    }

    /// Decodes every item into a native vector.
    pub fn to_vec(&self) -> DocumentResult<Vec<Value>> {
        self.items()?
            .iter()
            .enumerate()
            .map(|(i, json)| self.decode_item(json, i))
            .collect()
    }

    /// Returns the index of the first item equal to `value` in encoded form.
    pub fn position(&self, value: &Value) -> DocumentResult<Option<usize>> {
        let items = self.items()?;
        let Some(encoded) = encode_lookup(value, self.item.as_ref(), &self.path) else {
            return Ok(None);
        };
        Ok(items.iter().position(|json| *json == encoded))
    }

    pub fn contains(&self, value: &Value) -> DocumentResult<bool> {
        Ok(self.position(value)?.is_some())
    }

    /// Replaces the item at `index`.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> DocumentResult<()> {
        let json = self.encode_item(&value.into(), index)?;
        let len = self.len()?;
        let slot = self
            .items_mut()?
            .get_mut(index)
            .ok_or(DocumentError::IndexOutOfRange { index, len })?;

        *slot = json;
        Ok(())
    }

    pub fn push(&mut self, value: impl Into<Value>) -> DocumentResult<()> {
        let len = self.len()?;
        let json = self.encode_item(&value.into(), len)?;
        self.items_mut()?.push(json);
        Ok(())
    }

    /// Inserts an item at `index`, shifting later items. `index` may equal
    /// the length to append.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> DocumentResult<()> {
        let len = self.len()?;
        if index > len {
            return Err(DocumentError::IndexOutOfRange { index, len });
        }

        let json = self.encode_item(&value.into(), index)?;
        self.items_mut()?.insert(index, json);
        Ok(())
    }

    /// Appends every value. All values are encoded before any is written.
    pub fn extend<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> DocumentResult<()> {
        let len = self.len()?;
        let encoded = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| self.encode_item(&value.into(), len + i))
            .collect::<DocumentResult<Vec<_>>>()?;

        self.items_mut()?.extend(encoded);
        Ok(())
    }

    pub fn pop(&mut self) -> DocumentResult<Option<Value>> {
        let len = self.len()?;
        let Some(last) = self.items()?.last() else {
            return Ok(None);
        };

        let value = self.decode_item(last, len - 1)?;
        self.items_mut()?.pop();
        Ok(Some(value))
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&mut self, index: usize) -> DocumentResult<Value> {
        let items = self.items()?;
        let Some(json) = items.get(index) else {
            return Err(DocumentError::IndexOutOfRange {
                index,
                len: items.len(),
            });
        };

        let value = self.decode_item(json, index)?;
        self.items_mut()?.remove(index);
        Ok(value)
    }

    /// Removes the first item equal to `value`; returns whether one was found.
    pub fn remove_value(&mut self, value: &Value) -> DocumentResult<bool> {
        match self.position(value)? {
            Some(index) => {
                self.items_mut()?.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn clear(&mut self) -> DocumentResult<()> {
        self.items_mut()?.clear();
        Ok(())
    }

    pub fn reverse(&mut self) -> DocumentResult<()> {
        self.items_mut()?.reverse();
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) -> DocumentResult<()> {
        self.items_mut()?.truncate(len);
        Ok(())
    }

    /// Materializes a proxy over the list stored at `index`.
    pub fn list_at(&mut self, index: usize) -> DocumentResult<ListProxy<'_>> {
        let path = self.path.index(index);
        let len = self.len()?;
        materialize_item(&mut *self.root, &path, self.item.as_ref(), ContainerKind::List, || {
            DocumentError::IndexOutOfRange { index, len }
        })?;
        Ok(ListProxy::new(&mut *self.root, path, inner_item(self.item.clone())))
    }

    /// Materializes a proxy over the dict stored at `index`.
    pub fn dict_at(&mut self, index: usize) -> DocumentResult<DictProxy<'_>> {
        let path = self.path.index(index);
        let len = self.len()?;
        materialize_item(&mut *self.root, &path, self.item.as_ref(), ContainerKind::Dict, || {
            DocumentError::IndexOutOfRange { index, len }
        })?;
        Ok(DictProxy::new(&mut *self.root, path, inner_item(self.item.clone())))
    }

    /// Materializes a proxy over the nested sub-document stored at `index`.
    pub fn schema_at(&mut self, index: usize) -> DocumentResult<SchemaProxy<'_>> {
        let path = self.path.index(index);
        let len = self.len()?;
        materialize_item(&mut *self.root, &path, self.item.as_ref(), ContainerKind::Schema, || {
            DocumentError::IndexOutOfRange { index, len }
        })?;
        match &self.item {
            Some(FieldType::Schema(schema)) => {
                Ok(SchemaProxy::new(&mut *self.root, path, Arc::clone(schema)))
            }
            _ => Err(stale(&path, "object")),
        }
    }
}

/// A write-through proxy over a canonical object slot with string keys.
#[derive(Debug)]
pub struct DictProxy<'a> {
    root: &'a mut JsonValue,
    path: Path,
    item: Option<FieldType>,
}

impl<'a> DictProxy<'a> {
    pub(crate) fn new(root: &'a mut JsonValue, path: Path, item: Option<FieldType>) -> Self {
        Self { root, path, item }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn item_type(&self) -> Option<&FieldType> {
        self.item.as_ref()
    }

    fn entries(&self) -> DocumentResult<&Map<String, JsonValue>> {
        object_at(&*self.root, &self.path)
    }

    fn entries_mut(&mut self) -> DocumentResult<&mut Map<String, JsonValue>> {
        object_at_mut(&mut *self.root, &self.path)
    }

    fn encode_item(&self, key: &str, value: &Value) -> DocumentResult<JsonValue> {
        encode_checked(value, self.item.as_ref(), &self.path.key(key))
    }

    /// Decodes the entry being replaced or removed. A slot that no longer
    /// decodes as the item type is inferred from its JSON shape instead.
    fn previous(&self, key: &str) -> DocumentResult<Option<Value>> {
        Ok(self
            .entries()?
            .get(key)
            .map(|json| self.decode_item(key, json).unwrap_or_else(|_| codec::infer(json))))
    }

    fn decode_item(&self, key: &str, json: &JsonValue) -> DocumentResult<Value> {
        codec::decode_named(json, self.item.as_ref(), &self.path.key(key).to_string())
    }

    pub fn len(&self) -> DocumentResult<usize> {
        Ok(self.entries()?.len())
    }

    pub fn is_empty(&self) -> DocumentResult<bool> {
        Ok(self.entries()?.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> DocumentResult<bool> {
        Ok(self.entries()?.contains_key(key))
    }

    pub fn keys(&self) -> DocumentResult<Vec<String>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    pub fn get(&self, key: &str) -> DocumentResult<Option<Value>> {
        self.entries()?
            .get(key)
            .map(|json| self.decode_item(key, json))
            .transpose()
    }

    /// Decodes every entry into a native map.
    pub fn to_map(&self) -> DocumentResult<BTreeMap<String, Value>> {
        self.entries()?
            .iter()
            .map(|(key, json)| self.decode_item(key, json).map(|value| (key.clone(), value)))
            .collect()
    }

    /// Inserts or replaces the entry for `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> DocumentResult<Option<Value>> {
        let key = key.into();
        let json = self.encode_item(&key, &value.into())?;
        let previous = self.previous(&key)?;
        self.entries_mut()?.insert(key, json);
        Ok(previous)
    }

    pub fn remove(&mut self, key: &str) -> DocumentResult<Option<Value>> {
        let previous = self.previous(key)?;
        self.entries_mut()?.shift_remove(key);
        Ok(previous)
    }

    /// Inserts every entry. All values are encoded before any is written.
    pub fn update<K, V>(&mut self, entries: impl IntoIterator<Item = (K, V)>) -> DocumentResult<()>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let encoded = entries
            .into_iter()
            .map(|(key, value)| {
                let key = key.into();
                self.encode_item(&key, &value.into()).map(|json| (key, json))
            })
            .collect::<DocumentResult<Vec<_>>>()?;

        self.entries_mut()?.extend(encoded);
        Ok(())
    }

    /// Returns the value for `key`, first inserting `default` if it is absent.
    pub fn setdefault(&mut self, key: impl Into<String>, default: impl Into<Value>) -> DocumentResult<Value> {
        let key = key.into();

        if let Some(existing) = self.get(&key)? {
            return Ok(existing);
        }

        let default = default.into();
        let json = self.encode_item(&key, &default)?;
        self.entries_mut()?.insert(key.clone(), json);
        self.get(&key).map(|value| value.unwrap_or(default))
    }

    pub fn clear(&mut self) -> DocumentResult<()> {
        self.entries_mut()?.clear();
        Ok(())
    }

    fn materialize_entry(&mut self, key: &str, kind: ContainerKind) -> DocumentResult<Path> {
        let path = self.path.key(key);
        materialize_item(&mut *self.root, &path, self.item.as_ref(), kind, || {
            DocumentError::UnknownField(path.to_string())
        })?;
        Ok(path)
    }

    /// Materializes a proxy over the list stored under `key`.
    pub fn list_mut(&mut self, key: &str) -> DocumentResult<ListProxy<'_>> {
        let path = self.materialize_entry(key, ContainerKind::List)?;
        Ok(ListProxy::new(&mut *self.root, path, inner_item(self.item.clone())))
    }

    /// Materializes a proxy over the dict stored under `key`.
    pub fn dict_mut(&mut self, key: &str) -> DocumentResult<DictProxy<'_>> {
        let path = self.materialize_entry(key, ContainerKind::Dict)?;
        Ok(DictProxy::new(&mut *self.root, path, inner_item(self.item.clone())))
    }

    /// Materializes a proxy over the set stored under `key`.
    pub fn set_mut(&mut self, key: &str) -> DocumentResult<SetProxy<'_>> {
        let path = self.materialize_entry(key, ContainerKind::Set)?;
        Ok(SetProxy::new(&mut *self.root, path, inner_item(self.item.clone())))
    }

    /// Materializes a proxy over the nested sub-document stored under `key`.
    pub fn schema_mut(&mut self, key: &str) -> DocumentResult<SchemaProxy<'_>> {
        let path = self.materialize_entry(key, ContainerKind::Schema)?;
        match &self.item {
            Some(FieldType::Schema(schema)) => {
                Ok(SchemaProxy::new(&mut *self.root, path, Arc::clone(schema)))
            }
            _ => Err(stale(&path, "object")),
        }
    }
}

/// A write-through proxy presenting a canonical array as a set.
///
/// Element identity is the encoded JSON form, and the array holds each
/// encoded element at most once. Methods returning new collections never
/// touch the array; the in-place `*_update` family and `add`/`discard` do.
#[derive(Debug)]
pub struct SetProxy<'a> {
    root: &'a mut JsonValue,
    path: Path,
    item: Option<FieldType>,
}

impl<'a> SetProxy<'a> {
    pub(crate) fn new(root: &'a mut JsonValue, path: Path, item: Option<FieldType>) -> Self {
        Self { root, path, item }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn item_type(&self) -> Option<&FieldType> {
        self.item.as_ref()
    }

    fn items(&self) -> DocumentResult<&Vec<JsonValue>> {
        array_at(&*self.root, &self.path)
    }

    fn items_mut(&mut self) -> DocumentResult<&mut Vec<JsonValue>> {
        array_at_mut(&mut *self.root, &self.path)
    }

    fn encode(&self, value: &Value) -> DocumentResult<JsonValue> {
        encode_checked(value, self.item.as_ref(), &self.path)
    }

    /// Encodes every value, dropping duplicates, before anything is written.
    fn encode_all<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<Vec<JsonValue>> {
        let mut encoded: Vec<JsonValue> = Vec::new();

        for value in values {
            let json = self.encode(&value.into())?;
            if !encoded.contains(&json) {
                encoded.push(json);
            }
        }

        Ok(encoded)
    }

    fn decode_all(&self, items: &[JsonValue]) -> DocumentResult<Vec<Value>> {
        items
            .iter()
            .map(|json| codec::decode_named(json, self.item.as_ref(), &self.path.to_string()))
            .collect()
    }

    pub fn len(&self) -> DocumentResult<usize> {
        Ok(self.items()?.len())
    }

    pub fn is_empty(&self) -> DocumentResult<bool> {
        Ok(self.items()?.is_empty())
    }

    pub fn contains(&self, value: impl Into<Value>) -> DocumentResult<bool> {
        let items = self.items()?;
        Ok(encode_lookup(&value.into(), self.item.as_ref(), &self.path)
            .is_some_and(|json| items.contains(&json)))
    }

    pub fn to_vec(&self) -> DocumentResult<Vec<Value>> {
        self.decode_all(self.items()?)
    }

    /// Adds an element; returns `false` if it was already present.
    pub fn add(&mut self, value: impl Into<Value>) -> DocumentResult<bool> {
        let json = self.encode(&value.into())?;
        let items = self.items_mut()?;

        if items.contains(&json) {
            return Ok(false);
        }

        items.push(json);
        Ok(true)
    }

    /// Removes an element if present; returns whether it was present.
    pub fn discard(&mut self, value: impl Into<Value>) -> DocumentResult<bool> {
        let Some(json) = encode_lookup(&value.into(), self.item.as_ref(), &self.path) else {
            return Ok(false);
        };
        let items = self.items_mut()?;
        let before = items.len();
        items.retain(|item| *item != json);
        Ok(items.len() != before)
    }

    /// Removes and returns an arbitrary element (the oldest one).
    pub fn pop(&mut self) -> DocumentResult<Option<Value>> {
        let Some(first) = self.items()?.first() else {
            return Ok(None);
        };

        let value = codec::decode_named(first, self.item.as_ref(), &self.path.to_string())?;
        self.items_mut()?.remove(0);
        Ok(Some(value))
    }

    pub fn clear(&mut self) -> DocumentResult<()> {
        self.items_mut()?.clear();
        Ok(())
    }

    /// Adds every element not already present.
    pub fn update<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> DocumentResult<()> {
        let encoded = self.encode_all(values)?;
        let items = self.items_mut()?;

        for json in encoded {
            if !items.contains(&json) {
                items.push(json);
            }
        }

        Ok(())
    }

    /// Keeps only the elements also present in `values`.
    pub fn intersection_update<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> DocumentResult<()> {
        let other = self.encode_all(values)?;
        self.items_mut()?.retain(|item| other.contains(item));
        Ok(())
    }

    /// Removes every element present in `values`.
    pub fn difference_update<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> DocumentResult<()> {
        let other = self.encode_all(values)?;
        self.items_mut()?.retain(|item| !other.contains(item));
        Ok(())
    }

    /// Keeps the elements present in exactly one of the set and `values`.
    pub fn symmetric_difference_update<V: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = V>,
    ) -> DocumentResult<()> {
        let other = self.encode_all(values)?;
        let items = self.items_mut()?;
        let current = items.clone();

        items.retain(|item| !other.contains(item));
        items.extend(other.into_iter().filter(|json| !current.contains(json)));
        Ok(())
    }

    /// Returns the union with `values` without modifying the set.
    pub fn union<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<Vec<Value>> {
        let other = self.encode_all(values)?;
        let mut result = self.items()?.clone();

        for json in other {
            if !result.contains(&json) {
                result.push(json);
            }
        }

        self.decode_all(&result)
    }

    /// Returns the elements also present in `values` without modifying the set.
    pub fn intersection<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<Vec<Value>> {
        let other = self.encode_all(values)?;
        let result: Vec<JsonValue> = self
            .items()?
            .iter()
            .filter(|item| other.contains(item))
            .cloned()
            .collect();
        self.decode_all(&result)
    }

    /// Returns the elements not present in `values` without modifying the set.
    pub fn difference<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<Vec<Value>> {
        let other = self.encode_all(values)?;
        let result: Vec<JsonValue> = self
            .items()?
            .iter()
            .filter(|item| !other.contains(item))
            .cloned()
            .collect();
        self.decode_all(&result)
    }

    /// Returns the elements present in exactly one side without modifying the set.
    pub fn symmetric_difference<V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = V>,
    ) -> DocumentResult<Vec<Value>> {
        let other = self.encode_all(values)?;
        let items = self.items()?;
        let result: Vec<JsonValue> = items
            .iter()
            .filter(|item| !other.contains(item))
            .chain(other.iter().filter(|json| !items.contains(json)))
            .cloned()
            .collect();
        self.decode_all(&result)
    }

    pub fn is_subset<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<bool> {
        let other = self.encode_all(values)?;
        Ok(self.items()?.iter().all(|item| other.contains(item)))
    }

    pub fn is_superset<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<bool> {
        let other = self.encode_all(values)?;
        let items = self.items()?;
        Ok(other.iter().all(|json| items.contains(json)))
    }

    pub fn is_disjoint<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> DocumentResult<bool> {
        let other = self.encode_all(values)?;
        Ok(!self.items()?.iter().any(|item| other.contains(item)))
    }
}

/// A proxy over a nested sub-document, with the same field API as a document.
#[derive(Debug)]
pub struct SchemaProxy<'a> {
    root: &'a mut JsonValue,
    path: Path,
    schema: Arc<SchemaDescriptor>,
}

impl<'a> SchemaProxy<'a> {
    pub(crate) fn new(root: &'a mut JsonValue, path: Path, schema: Arc<SchemaDescriptor>) -> Self {
        Self { root, path, schema }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<SchemaDescriptor> {
        &self.schema
    }

    fn object(&self) -> DocumentResult<&Map<String, JsonValue>> {
        object_at(&*self.root, &self.path)
    }

    pub fn get(&self, name: &str) -> DocumentResult<Value> {
        self.schema.read_field(self.object()?, name)
    }

    pub fn get_as<T: FromValue>(&self, name: &str) -> DocumentResult<T> {
        T::from_value(self.get(name)?)
    }

    /// Assigns a field; fails without writing anything if the value is
    /// mistyped or rejected by the field's choices or validators.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> DocumentResult<()> {
        let object = object_at_mut(&mut *self.root, &self.path)?;
        self.schema.write_field(object, name, value.into())
    }

    /// Resets a declared field to its default or drops a dynamic one.
    pub fn remove(&mut self, name: &str) -> DocumentResult<Option<Value>> {
        let object = object_at_mut(&mut *self.root, &self.path)?;
        self.schema.remove_field(object, name)
    }

    pub fn dynamic_keys(&self) -> DocumentResult<Vec<String>> {
        Ok(self.schema.dynamic_keys(self.object()?))
    }

    /// Decodes the whole sub-document into a native map.
    pub fn to_map(&self) -> DocumentResult<BTreeMap<String, Value>> {
        self.schema.decode_map(self.object()?, &self.path.to_string())
    }

    /// Validates the sub-document; violation paths are relative to it.
    pub fn validate(&self) -> DocumentResult<Vec<Violation>> {
        Ok(self.schema.validate_object(self.object()?))
    }

    pub fn list_mut(&mut self, name: &str) -> DocumentResult<ListProxy<'_>> {
        list_field(&mut *self.root, &self.path, &self.schema, name)
    }

    pub fn dict_mut(&mut self, name: &str) -> DocumentResult<DictProxy<'_>> {
        dict_field(&mut *self.root, &self.path, &self.schema, name)
    }

    pub fn set_mut(&mut self, name: &str) -> DocumentResult<SetProxy<'_>> {
        set_field(&mut *self.root, &self.path, &self.schema, name)
    }

    pub fn schema_mut(&mut self, name: &str) -> DocumentResult<SchemaProxy<'_>> {
        schema_field(&mut *self.root, &self.path, &self.schema, name)
    }
}
