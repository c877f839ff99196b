//! Error types, validation violations and result types.
//!
//! Assignment-time failures (type mismatches, choice or validator failures on
//! `set`) are returned as a [`DocumentError`] and leave the canonical tree
//! untouched. Save-time validation instead collects [`Violation`]s across all
//! fields of a document.

use std::fmt;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// A single validation failure reported for a field.
///
/// The `field` of each variant is a dotted path relative to the document root
/// (for example `address.city` or `owners.1.name`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A required field is empty or absent.
    RequiredFieldMissing { field: String },
    /// The value is not a member of the field's allowed choices.
    ChoiceViolation { field: String, value: String },
    /// A custom validator rejected the value.
    ValidatorFailure {
        field: String,
        validator: String,
        message: String,
    },
}

impl Violation {
    /// Returns the dotted path of the field this violation was reported for.
    pub fn field(&self) -> &str {
        match self {
            Violation::RequiredFieldMissing { field }
            | Violation::ChoiceViolation { field, .. }
            | Violation::ValidatorFailure { field, .. } => field,
        }
    }

    /// Re-roots the violation under `prefix`, used when validating nested schemas.
    pub(crate) fn nested_under(self, prefix: &str) -> Self {
        let join = |field: String| format!("{prefix}.{field}");

        match self {
            Violation::RequiredFieldMissing { field } => {
                Violation::RequiredFieldMissing { field: join(field) }
            }
            Violation::ChoiceViolation { field, value } => Violation::ChoiceViolation {
                field: join(field),
                value,
            },
            Violation::ValidatorFailure {
                field,
                validator,
                message,
            } => Violation::ValidatorFailure {
                field: join(field),
                validator,
                message,
            },
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RequiredFieldMissing { field } => {
                write!(f, "field '{field}' is required")
            }
            Violation::ChoiceViolation { field, value } => {
                write!(f, "value {value} of field '{field}' is not an allowed choice")
            }
            Violation::ValidatorFailure {
                field,
                validator,
                message,
            } => write!(f, "validator '{validator}' rejected field '{field}': {message}"),
        }
    }
}

/// Represents all errors raised by schema declaration, field access and the
/// persistence seam.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The assigned value does not match the field's declared native type.
    #[error("Type mismatch on '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    /// An assignment was rejected by the field's choices or validators.
    #[error("Invalid value: {0}")]
    Validation(Violation),
    /// A schema declared a field under a reserved canonical key.
    #[error("Field name '{0}' is reserved")]
    ReservedName(String),
    /// A schema declared the same field twice.
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),
    /// A cached schema declaration failed to build; carries the original error message.
    #[error("Invalid schema declaration: {0}")]
    SchemaDeclaration(String),
    /// The field is not declared and the schema does not accept dynamic fields.
    #[error("Unknown field '{0}'")]
    UnknownField(String),
    /// A proxy's path no longer resolves to a slot of the expected shape.
    #[error("Stale proxy: no {expected} at '{path}'")]
    StaleProxy { path: String, expected: &'static str },
    /// A list index was outside of the list bounds.
    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    /// No schema is registered for the discriminator found in a raw document.
    #[error("No schema registered for doc_type '{0}'")]
    UnknownDiscriminator(String),
    /// Serialization or deserialization failure (JSON, BSON or value parsing).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The document failed save-time validation.
    #[error("Document failed validation with {} violation(s)", .0.len())]
    Invalid(Vec<Violation>),
    /// The persistence collaborator has no document with the given id.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The persistence collaborator rejected a write because of a stale revision.
    #[error("Document update conflict: {0}")]
    Conflict(String),
    /// An error reported by the persistence collaborator.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for schema and document operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

impl From<BsonError> for DocumentError {
    fn from(err: BsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentError::Serialization(err.to_string())
    }
}

impl From<Violation> for DocumentError {
    fn from(violation: Violation) -> Self {
        DocumentError::Validation(violation)
    }
}
