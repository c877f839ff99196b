//! In-memory storage implementation for the persistence seam.
//!
//! This module provides a simple backend that keeps every revision of every
//! canonical document in a HashMap guarded by an async-aware read-write lock.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Arc};
use uuid::Uuid;

use docschema_core::{
    backend::{DocumentBackend, DocumentBackendBuilder, SavedRevision},
    error::{DocumentError, DocumentResult},
    schema::{ID_KEY, REV_KEY},
};

/// Revision history of one document, oldest first.
#[derive(Debug, Default, Clone)]
struct Revisions {
    history: Vec<(String, JsonValue)>,
}

impl Revisions {
    fn current(&self) -> Option<&(String, JsonValue)> {
        self.history.last()
    }

    fn generation(&self) -> usize {
        self.history.len()
    }
}

type StoreMap = HashMap<String, Revisions>;

/// Thread-safe in-memory document backend.
///
/// Identities are random UUIDs and revision tokens have the form
/// `<generation>-<hex>`. A write must carry the current `_rev` of an existing
/// document or it is rejected with [`DocumentError::Conflict`].
///
/// # Thread Safety
///
/// `InMemoryBackend` is cloneable and uses an `Arc`-wrapped internal state,
/// allowing it to be shared across async tasks. Clones share the same data.
///
/// # Example
///
/// ```ignore
/// use docschema_memory::InMemoryBackend;
/// use docschema::backend::DocumentBackend;
/// use serde_json::json;
///
/// let backend = InMemoryBackend::new();
/// let saved = backend.save(json!({"name": "Alice"})).await?;
/// assert!(saved.revision.starts_with("1-"));
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryBackend {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryBackend`.
    pub fn builder() -> InMemoryBackendBuilder {
        InMemoryBackendBuilder::default()
    }

    /// Returns the number of live documents.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    fn next_revision(generation: usize) -> String {
        format!("{}-{}", generation + 1, Uuid::new_v4().simple())
    }
}

fn string_key<'a>(document: &'a JsonValue, key: &str) -> DocumentResult<Option<&'a str>> {
    match document.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(value)) => Ok(Some(value.as_str())),
        Some(other) => Err(DocumentError::Serialization(format!(
            "'{key}' must be a string, found {other}"
        ))),
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn get(&self, id: &str, revision: Option<&str>) -> DocumentResult<JsonValue> {
        let store = self.store.read().await;
        let revisions = store
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?;

        let found = match revision {
            Some(revision) => revisions.history.iter().find(|(rev, _)| rev == revision),
            None => revisions.current(),
        };

        found
            .map(|(_, document)| document.clone())
            .ok_or_else(|| DocumentError::NotFound(format!("{id}@{}", revision.unwrap_or("latest"))))
    }

    async fn save(&self, mut document: JsonValue) -> DocumentResult<SavedRevision> {
        if !document.is_object() {
            return Err(DocumentError::Serialization("expected a JSON object".into()));
        }

        let id = match string_key(&document, ID_KEY)? {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().simple().to_string(),
        };
        let given = string_key(&document, REV_KEY)?.map(str::to_string);

        let mut store = self.store.write().await;
        let current = store
            .get(&id)
            .and_then(Revisions::current)
            .map(|(rev, _)| rev.clone());

        if current != given {
            tracing::debug!(id = %id, current = ?current, given = ?given, "revision conflict");
            return Err(DocumentError::Conflict(format!(
                "{id}: expected revision {}, got {}",
                current.as_deref().unwrap_or("<none>"),
                given.as_deref().unwrap_or("<none>")
            )));
        }

        let revisions = store.entry(id.clone()).or_default();
        let revision = Self::next_revision(revisions.generation());
        if let Some(object) = document.as_object_mut() {
            object.insert(ID_KEY.to_string(), JsonValue::String(id.clone()));
            object.insert(REV_KEY.to_string(), JsonValue::String(revision.clone()));
        }
        revisions.history.push((revision.clone(), document));

        Ok(SavedRevision { id, revision })
    }

    async fn delete(&self, id: &str, revision: &str) -> DocumentResult<()> {
        let mut store = self.store.write().await;
        let current = store
            .get(id)
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))?
            .current()
            .map(|(rev, _)| rev.clone());

        if current.as_deref() != Some(revision) {
            tracing::debug!(id, ?current, revision, "revision conflict on delete");
            return Err(DocumentError::Conflict(format!(
                "{id}: expected revision {}, got {revision}",
                current.as_deref().unwrap_or("<none>")
            )));
        }

        store.remove(id);
        Ok(())
    }
}

/// Builder for [`InMemoryBackend`].
#[derive(Debug, Default)]
pub struct InMemoryBackendBuilder {
    seed: Vec<JsonValue>,
}

impl InMemoryBackendBuilder {
    /// Adds a document to save when the backend is built.
    pub fn seed(mut self, document: JsonValue) -> Self {
        self.seed.push(document);
        self
    }
}

#[async_trait]
impl DocumentBackendBuilder for InMemoryBackendBuilder {
    type Backend = InMemoryBackend;

    async fn build(self) -> DocumentResult<Self::Backend> {
        let backend = InMemoryBackend::new();
        for document in self.seed {
            backend.save(document).await?;
        }
        Ok(backend)
    }
}
