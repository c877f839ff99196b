//! Convenient re-exports of commonly used types from docschema.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docschema::prelude::*;
//! ```

pub use docschema_core::{
    backend::{DocumentBackend, DocumentBackendBuilder, SavedRevision},
    document::{Attachment, Document},
    error::{DocumentError, DocumentResult, Violation},
    field::{FieldSpec, FieldType, item},
    proxy::{DictProxy, ListProxy, SchemaProxy, SetProxy},
    registry::SchemaRegistry,
    schema::{SchemaBuilder, SchemaDescriptor},
    store::DocumentStore,
    value::{FromValue, Value},
};

pub use bigdecimal::BigDecimal;
pub use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
