//! Persistence seam for canonical documents.
//!
//! This module defines the traits a storage collaborator implements so that
//! [`DocumentStore`](crate::store::DocumentStore) can persist documents. The
//! collaborator only ever sees canonical JSON objects; schemas, proxies and
//! validation stay on this side of the seam.
//!
//! # Traits
//!
//! - [`DocumentBackend`]: The core trait for storage collaborators
//! - [`DocumentBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Revisions
//!
//! Backends assign a revision token on every successful write and reject a
//! write whose `_rev` does not match the stored one with
//! [`DocumentError::Conflict`](crate::error::DocumentError::Conflict).
//! Retrying is the caller's business.
//!
//! # Examples
//!
//! ```ignore
//! use docschema::backend::DocumentBackend;
//! use serde_json::json;
//!
//! let backend = MyBackendImpl::new();
//!
//! let saved = backend.save(json!({"doc_type": "Pet", "name": "Rex"})).await?;
//! let raw = backend.get(&saved.id, None).await?;
//! assert_eq!(raw["_rev"], saved.revision);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::Debug;

use crate::error::DocumentResult;

/// Identity and revision assigned by a backend for a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedRevision {
    pub id: String,
    pub revision: String,
}

/// Abstract interface for document storage collaborators.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from
/// multiple tasks.
#[async_trait]
pub trait DocumentBackend: Send + Sync + Debug {
    /// Fetches a canonical document, optionally at a specific revision.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such document (or revision) exists.
    async fn get(&self, id: &str, revision: Option<&str>) -> DocumentResult<JsonValue>;

    /// Creates or updates a canonical document.
    ///
    /// A document without `_id` gets one assigned. A document whose `_id`
    /// already exists must carry the current `_rev`.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` on a missing or stale revision.
    async fn save(&self, document: JsonValue) -> DocumentResult<SavedRevision>;

    /// Deletes a document at the given revision.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the document does not exist and `Conflict` if
    /// `revision` is stale.
    async fn delete(&self, id: &str, revision: &str) -> DocumentResult<()>;

    /// Saves several documents independently; one failure does not abort the
    /// others.
    async fn bulk_save(&self, documents: Vec<JsonValue>) -> DocumentResult<Vec<DocumentResult<SavedRevision>>> {
        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            results.push(self.save(document).await);
        }
        Ok(results)
    }
}

/// Factory trait for backends that need asynchronous setup.
#[async_trait]
pub trait DocumentBackendBuilder {
    type Backend: DocumentBackend;

    async fn build(self) -> DocumentResult<Self::Backend>;
}
