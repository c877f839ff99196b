//! In-memory persistence backend for docschema.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! `DocumentBackend` trait. It uses async-aware read-write locks for
//! concurrent access and is ideal for development and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Revision tracking** - Every write gets a `<generation>-<hex>` token and stale writes conflict
//! - **Revision history** - Earlier revisions stay readable until the document is deleted
//!
//! # Quick Start
//!
//! ```ignore
//! use docschema::{prelude::*, memory::InMemoryBackend};
//!
//! let pet = SchemaDescriptor::builder("Pet")
//!     .field("name", FieldSpec::string().required())
//!     .build()?;
//!
//! let store = DocumentStore::new(InMemoryBackend::builder().build().await?);
//!
//! let mut rex = pet.instantiate()?;
//! rex.set("name", "Rex")?;
//! store.save(&mut rex).await?;
//!
//! assert!(rex.revision().unwrap().starts_with("1-"));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docschema_memory;

pub mod store;

pub use store::{InMemoryBackend, InMemoryBackendBuilder};
