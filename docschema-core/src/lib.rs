//! Typed document schemas mapped onto a canonical JSON tree.
//!
//! This crate is the core of the docschema project and provides:
//!
//! - **Native values** ([`value`]) - The tagged union every field reads and writes
//! - **Value codec** ([`codec`]) - Encoding native values to JSON, decoding back, and inference for untyped data
//! - **Field declarations** ([`field`]) - Field types, defaults, choices and validators
//! - **Schemas** ([`schema`]) - Ordered field sets with inheritance and dynamic fields
//! - **Documents** ([`document`]) - A schema bound to its canonical tree
//! - **Proxies** ([`proxy`]) - Write-through list, dict, set and nested-schema views
//! - **Registry** ([`registry`]) - Discriminator dispatch for raw documents
//! - **Persistence seam** ([`backend`], [`store`]) - Backend traits and the validating store wrapper
//! - **Error handling** ([`error`]) - Error, violation and result types
//!
//! # Example
//!
//! ```ignore
//! use docschema_core::{field::{FieldSpec, FieldType}, schema::SchemaDescriptor};
//!
//! let pet = SchemaDescriptor::builder("Pet")
//!     .field("name", FieldSpec::string().required())
//!     .field("birthdate", FieldSpec::date())
//!     .field("tags", FieldSpec::list(Some(FieldType::String)))
//!     .build()?;
//!
//! let mut fluffy = pet.instantiate()?;
//! fluffy.set("name", "Fluffy")?;
//! fluffy.list_mut("tags")?.push("cat")?;
//!
//! let json = fluffy.encode();
//! assert_eq!(json["doc_type"], "Pet");
//! ```

#[allow(unused_extern_crates)]
extern crate self as docschema_core;

pub mod backend;
pub mod codec;
pub mod document;
pub mod error;
pub mod field;
pub mod proxy;
pub mod registry;
pub mod schema;
pub mod store;
pub mod tree;
pub mod value;
