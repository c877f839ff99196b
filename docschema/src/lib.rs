//! Main docschema crate: typed document schemas over a canonical JSON tree.
//!
//! This crate is the primary entry point for users of docschema. It
//! re-exports the core types from the sub-crates, adds the [`document!`]
//! accessor macro and provides access to the bundled backends.
//!
//! # Features
//!
//! - **Typed fields** - Strings, numbers, decimals, dates, times, datetimes, nested schemas and containers
//! - **Write-through containers** - List, dict and set proxies that edit the canonical tree in place
//! - **Schema composition** - Nesting, multiple inheritance and dynamic fields
//! - **Persistence seam** - Validate-before-save store over any [`backend::DocumentBackend`]
//!
//! # Quick Start
//!
//! ```ignore
//! use docschema::{prelude::*, memory::InMemoryBackend};
//!
//! let animal = SchemaDescriptor::builder("Animal")
//!     .field("name", FieldSpec::string().required())
//!     .build()?;
//!
//! let pet = SchemaDescriptor::builder("Pet")
//!     .inherit(&animal)
//!     .field("birthdate", FieldSpec::date())
//!     .field("tags", FieldSpec::set(Some(FieldType::String)))
//!     .build()?;
//!
//! let mut fluffy = pet.instantiate()?;
//! fluffy.set("name", "Fluffy")?;
//! fluffy.set("birthdate", NaiveDate::from_ymd_opt(2020, 2, 29).unwrap())?;
//! fluffy.set_mut("tags")?.add("cat")?;
//!
//! let store = DocumentStore::new(InMemoryBackend::new());
//! store.save(&mut fluffy).await?;
//! ```
//!
//! # Typed Accessors
//!
//! The [`document!`] macro wraps a [`Document`] in a newtype with a cached
//! descriptor and one getter/setter pair per declared field:
//!
//! ```ignore
//! docschema::document! {
//!     pub struct Pet("Pet") {
//!         name / set_name: Option<String> = FieldSpec::string().required(),
//!         birthdate / set_birthdate: Option<NaiveDate> = FieldSpec::date(),
//!     }
//! }
//!
//! let mut rex = Pet::new()?;
//! rex.set_name(Some("Rex".into()))?;
//! assert_eq!(rex.name()?, Some("Rex".to_string()));
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing

mod macros;
pub mod prelude;

pub use docschema_core::{
    backend, codec, document, error, field, proxy, registry, schema, store, tree, value,
};
pub use docschema_core::{
    document::Document,
    error::{DocumentError, DocumentResult},
    store::DocumentStore,
};

// Re-export the value crates for convenience
pub use bigdecimal;
pub use bson;
pub use chrono;
pub use serde_json;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docschema_memory::{InMemoryBackend, InMemoryBackendBuilder};
}

#[doc(hidden)]
pub mod __private {
    pub use lazy_static::lazy_static;
}
