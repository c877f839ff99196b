//! Typed document store over a persistence backend.
//!
//! [`DocumentStore`] is the glue between schema-aware [`Document`]s and a
//! [`DocumentBackend`] that only speaks canonical JSON. It validates before
//! every write and copies the identity and revision the backend assigns back
//! into the document.

use std::sync::Arc;

use crate::{
    backend::{DocumentBackend, SavedRevision},
    document::Document,
    error::{DocumentError, DocumentResult},
    registry::SchemaRegistry,
    schema::SchemaDescriptor,
};

/// A document store bound to a specific backend implementation.
///
/// # Example
///
/// ```ignore
/// use docschema::{DocumentStore, memory::InMemoryBackend};
///
/// let store = DocumentStore::new(InMemoryBackend::new());
///
/// let mut rex = pet.instantiate()?;
/// rex.set("name", "Rex")?;
/// store.save(&mut rex).await?;
///
/// let again = store.get(&pet, rex.id().unwrap()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentStore<B: DocumentBackend> {
    backend: B,
}

impl<B: DocumentBackend> DocumentStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Validates and refreshes a document ahead of a write.
    fn prepare(document: &mut Document) -> DocumentResult<()> {
        let violations = document.validate();
        if !violations.is_empty() {
            tracing::debug!(
                schema = document.schema().name(),
                violations = violations.len(),
                "refusing to save invalid document"
            );
            return Err(DocumentError::Invalid(violations));
        }

        document.touch()
    }

    fn write_back(document: &mut Document, saved: &SavedRevision) -> DocumentResult<()> {
        document.set_id(saved.id.clone())?;
        document.set_revision(saved.revision.clone())
    }

    /// Validates, touches and saves a document, then records the identity and
    /// revision assigned by the backend.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Invalid`] with every violation if validation
    /// fails; nothing is sent to the backend in that case. Backend errors such
    /// as `Conflict` are passed through unchanged.
    pub async fn save(&self, document: &mut Document) -> DocumentResult<SavedRevision> {
        Self::prepare(document)?;

        let saved = self.backend.save(document.encode()).await.inspect_err(|err| {
            tracing::debug!(id = document.id(), error = %err, "save rejected by backend");
        })?;
        Self::write_back(document, &saved)?;

        tracing::debug!(id = %saved.id, revision = %saved.revision, "saved document");
        Ok(saved)
    }

    /// Fetches a document and decodes it with the given schema.
    pub async fn get(&self, schema: &Arc<SchemaDescriptor>, id: &str) -> DocumentResult<Document> {
        let raw = self.backend.get(id, None).await?;
        Document::decode(schema, raw)
    }

    /// Fetches a document and decodes it with the schema its `doc_type` names.
    pub async fn get_any(&self, registry: &SchemaRegistry, id: &str) -> DocumentResult<Document> {
        let raw = self.backend.get(id, None).await?;
        registry.decode(raw)
    }

    /// Deletes a saved document at its current revision.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotFound`] if the document was never saved.
    pub async fn delete(&self, document: &Document) -> DocumentResult<()> {
        let (Some(id), Some(revision)) = (document.id(), document.revision()) else {
            return Err(DocumentError::NotFound(
                document.id().unwrap_or("<unsaved>").to_string(),
            ));
        };

        self.backend.delete(id, revision).await?;
        tracing::debug!(id, revision, "deleted document");
        Ok(())
    }

    /// Saves several documents, reporting a result per document.
    ///
    /// Invalid documents are not sent to the backend; their slot carries
    /// [`DocumentError::Invalid`]. Successful saves are written back.
    pub async fn bulk_save(&self, documents: &mut [Document]) -> DocumentResult<Vec<DocumentResult<SavedRevision>>> {
        let mut results: Vec<Option<DocumentResult<SavedRevision>>> = Vec::with_capacity(documents.len());
        let mut pending = Vec::new();
        let mut encoded = Vec::new();

        for (index, document) in documents.iter_mut().enumerate() {
            match Self::prepare(document) {
                Ok(()) => {
                    pending.push(index);
                    encoded.push(document.encode());
                    results.push(None);
                }
                Err(err) => results.push(Some(Err(err))),
            }
        }

        let saved = self.backend.bulk_save(encoded).await?;
        for (index, result) in pending.into_iter().zip(saved) {
            if let Ok(saved) = &result {
                Self::write_back(&mut documents[index], saved)?;
            }
            results[index] = Some(result);
        }

        Ok(results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| Err(DocumentError::Backend("missing bulk save result".into())))
            })
            .collect())
    }
}
