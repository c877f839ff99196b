//! Field declarations: native types, defaults, choices and validators.
//!
//! A [`FieldSpec`] describes one declared field of a schema. It never stores
//! data itself; the value lives in the owning document's canonical tree and
//! a `FieldSpec` only encodes, decodes, defaults and validates it.
//!
//! # Example
//!
//! ```ignore
//! use docschema::field::{FieldSpec, FieldType};
//!
//! let name = FieldSpec::string().required();
//! let kind = FieldSpec::string().choices(["cat", "dog"]);
//! let tags = FieldSpec::set(Some(FieldType::String));
//! let age = FieldSpec::integer().validator("non_negative", |v| match v.as_i64() {
//!     Some(n) if n < 0 => Err("must not be negative".to_string()),
//!     _ => Ok(()),
//! });
//! ```

use chrono::{SubsecRound, Utc};
use serde_json::Value as JsonValue;
use std::{fmt, sync::Arc};

use crate::{
    codec,
    document::Document,
    error::{DocumentError, DocumentResult, Violation},
    schema::SchemaDescriptor,
    value::Value,
};

/// The native type of a declared field.
///
/// Container variants carry an optional homogeneous item type; without one
/// their items are encoded by kind and inferred on read, like dynamic fields.
#[derive(Clone)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Decimal,
    Date,
    Time,
    DateTime,
    /// A nested sub-document described by its own schema.
    Schema(Arc<SchemaDescriptor>),
    List(Option<Box<FieldType>>),
    Dict(Option<Box<FieldType>>),
    /// Unique items stored in an ordered canonical array.
    Set(Option<Box<FieldType>>),
}

impl FieldType {
    /// Returns a readable name such as `string`, `list<date>` or `schema<Address>`.
    pub fn name(&self) -> String {
        let item_name = |item: &Option<Box<FieldType>>| {
            item.as_ref()
                .map(|item| item.name())
                .unwrap_or_else(|| "any".to_string())
        };

        match self {
            FieldType::String => "string".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Decimal => "decimal".to_string(),
            FieldType::Date => "date".to_string(),
            FieldType::Time => "time".to_string(),
            FieldType::DateTime => "datetime".to_string(),
            FieldType::Schema(schema) => format!("schema<{}>", schema.name()),
            FieldType::List(item) => format!("list<{}>", item_name(item)),
            FieldType::Dict(item) => format!("dict<{}>", item_name(item)),
            FieldType::Set(item) => format!("set<{}>", item_name(item)),
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            FieldType::Schema(_) | FieldType::List(_) | FieldType::Dict(_) | FieldType::Set(_)
        )
    }

    /// Returns the empty value used when a field has no explicit default.
    ///
    /// Containers default to an empty container and nested schemas to an
    /// empty dict, which encoding expands into the schema's skeleton.
    pub fn empty_value(&self) -> Value {
        match self {
            FieldType::List(_) | FieldType::Set(_) => Value::List(Vec::new()),
            FieldType::Dict(_) | FieldType::Schema(_) => Value::Dict(Default::default()),
            _ => Value::Null,
        }
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Shorthand for a boxed item type, e.g. `FieldType::List(item(FieldType::Date))`.
pub fn item(field_type: FieldType) -> Option<Box<FieldType>> {
    Some(Box::new(field_type))
}

type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;
type ValidatorFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A field's default: a fixed value cloned per document, or a factory called
/// once per document.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Factory(DefaultFactory),
}

impl DefaultValue {
    fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Factory(factory) => factory(),
        }
    }
}

/// A named check run against non-null field values.
#[derive(Clone)]
pub struct Validator {
    name: String,
    check: ValidatorFn,
}

impl Validator {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A declared field of a schema.
#[derive(Clone)]
pub struct FieldSpec {
    pub(crate) name: String,
    field_type: FieldType,
    default: Option<DefaultValue>,
    required: bool,
    choices: Option<Vec<Value>>,
    validators: Vec<Validator>,
    verbose_name: Option<String>,
    auto_now: bool,
    auto_now_add: bool,
}

impl FieldSpec {
    /// Creates a spec of the given type. The name is assigned on declaration.
    pub fn new(field_type: FieldType) -> Self {
        Self {
            name: String::new(),
            field_type,
            default: None,
            required: false,
            choices: None,
            validators: Vec::new(),
            verbose_name: None,
            auto_now: false,
            auto_now_add: false,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldType::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Boolean)
    }

    pub fn decimal() -> Self {
        Self::new(FieldType::Decimal)
    }

    pub fn date() -> Self {
        Self::new(FieldType::Date)
    }

    pub fn time() -> Self {
        Self::new(FieldType::Time)
    }

    pub fn datetime() -> Self {
        Self::new(FieldType::DateTime)
    }

    pub fn list(item: Option<FieldType>) -> Self {
        Self::new(FieldType::List(item.map(Box::new)))
    }

    pub fn dict(item: Option<FieldType>) -> Self {
        Self::new(FieldType::Dict(item.map(Box::new)))
    }

    pub fn set(item: Option<FieldType>) -> Self {
        Self::new(FieldType::Set(item.map(Box::new)))
    }

    /// A nested sub-document field. Each parent document gets its own copy of
    /// the nested skeleton.
    pub fn schema(schema: &Arc<SchemaDescriptor>) -> Self {
        Self::new(FieldType::Schema(Arc::clone(schema)))
    }

    /// Marks the field as required; checked by explicit validation only.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a fixed default, cloned into every new document.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Sets a default factory, called once for every new document.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Restricts non-null values to the given set.
    pub fn choices<V: Into<Value>>(mut self, choices: impl IntoIterator<Item = V>) -> Self {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    /// Appends a validator to the chain. Validators run in declaration order
    /// and the first failure stops the chain.
    pub fn validator<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Validator {
            name: name.into(),
            check: Arc::new(check),
        });
        self
    }

    pub fn verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    /// Fills the field with the current time when a document is created.
    /// Only meaningful for date, time and datetime fields.
    pub fn auto_now_add(mut self) -> Self {
        self.auto_now_add = true;
        self
    }

    /// Refreshes the field with the current time on every [`touch`].
    ///
    /// [`touch`]: crate::document::Document::touch
    pub fn auto_now(mut self) -> Self {
        self.auto_now = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn choices_list(&self) -> Option<&[Value]> {
        self.choices.as_deref()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    /// Returns the display name, falling back to the field name.
    pub fn display_name(&self) -> &str {
        self.verbose_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_auto_now(&self) -> bool {
        self.auto_now
    }

    pub fn is_auto_now_add(&self) -> bool {
        self.auto_now_add
    }

    pub(crate) fn has_static_default(&self) -> Option<&Value> {
        match &self.default {
            Some(DefaultValue::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Returns a fresh default value for a new document.
    ///
    /// Fixed defaults are cloned and factories are called, so no two
    /// documents ever share a default container.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(default) => default.produce(),
            None if self.auto_now || self.auto_now_add => {
                self.current_time().unwrap_or(Value::Null)
            }
            None => self.field_type.empty_value(),
        }
    }

    /// Returns the current time in this field's native type, if it is a
    /// date, time or datetime field.
    pub(crate) fn current_time(&self) -> Option<Value> {
        let now = Utc::now().trunc_subsecs(0);

        match self.field_type {
            FieldType::Date => Some(Value::Date(now.date_naive())),
            FieldType::Time => Some(Value::Time(now.time())),
            FieldType::DateTime => Some(Value::DateTime(now)),
            _ => None,
        }
    }

    /// Encodes a native value for this field's canonical slot.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::TypeMismatch`] if the value has the wrong type.
    pub fn to_wire(&self, value: &Value) -> DocumentResult<JsonValue> {
        codec::encode_named(value, Some(&self.field_type), &self.name)
    }

    /// Decodes this field's canonical slot into a native value.
    pub fn to_native(&self, json: &JsonValue) -> DocumentResult<Value> {
        codec::decode_named(json, Some(&self.field_type), &self.name)
    }

    /// Reads this field from a document, falling back to the default when
    /// the slot is absent.
    pub fn read(&self, document: &Document) -> DocumentResult<Value> {
        document.get(&self.name)
    }

    /// Writes this field into a document's canonical tree. Fails without
    /// writing if the value is mistyped or rejected by choices or validators.
    pub fn write(&self, document: &mut Document, value: impl Into<Value>) -> DocumentResult<()> {
        document.set(&self.name, value)
    }

    /// Type-checks and validates a value about to be assigned, returning its
    /// encoded form. Nothing is written when this fails.
    ///
    /// The required flag is not checked here; it only applies at save time.
    pub(crate) fn prepare(&self, value: &Value) -> DocumentResult<JsonValue> {
        let encoded = self.to_wire(value)?;

        if let Some(violation) = self.validate(value, false).into_iter().next() {
            return Err(DocumentError::Validation(violation));
        }

        Ok(encoded)
    }

    /// Validates a value against this field's rules.
    ///
    /// With `required` set, an empty value on a required field yields
    /// [`Violation::RequiredFieldMissing`]. Non-null values must be members of
    /// the full choice set, then pass every validator in order; the first
    /// failure ends the checks for this field. Nested schema values are
    /// validated field by field and may yield several violations.
    pub fn validate(&self, value: &Value, required: bool) -> Vec<Violation> {
        if value.is_empty() && required && self.required {
            return vec![Violation::RequiredFieldMissing {
                field: self.name.clone(),
            }];
        }

        if value.is_null() {
            return Vec::new();
        }

        if let Some(choices) = &self.choices {
            if !choices.contains(value) {
                return vec![Violation::ChoiceViolation {
                    field: self.name.clone(),
                    value: value.to_string(),
                }];
            }
        }

        for validator in &self.validators {
            if let Err(message) = (validator.check)(value) {
                return vec![Violation::ValidatorFailure {
                    field: self.name.clone(),
                    validator: validator.name.clone(),
                    message,
                }];
            }
        }

        self.validate_nested(value, required)
    }

    fn validate_nested(&self, value: &Value, required: bool) -> Vec<Violation> {
        let item_schema = match &self.field_type {
            FieldType::Schema(schema) => {
                return match value {
                    Value::Dict(map) => schema
                        .validate_map(map, required)
                        .into_iter()
                        .map(|violation| violation.nested_under(&self.name))
                        .collect(),
                    _ => Vec::new(),
                };
            }
            FieldType::List(Some(item)) | FieldType::Dict(Some(item)) => match item.as_ref() {
                FieldType::Schema(schema) => schema,
                _ => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        let entries: Vec<(String, &Value)> = match value {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("{}.{i}", self.name), item))
                .collect(),
            Value::Dict(map) => map
                .iter()
                .map(|(key, item)| (format!("{}.{key}", self.name), item))
                .collect(),
            _ => Vec::new(),
        };

        entries
            .into_iter()
            .flat_map(|(path, item)| match item {
                Value::Dict(map) => item_schema
                    .validate_map(map, required)
                    .into_iter()
                    .map(|violation| violation.nested_under(&path))
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("choices", &self.choices)
            .field(
                "validators",
                &self.validators.iter().map(Validator::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(mut spec: FieldSpec, name: &str) -> FieldSpec {
        spec.name = name.to_string();
        spec
    }

    #[test]
    fn read_and_write_go_through_the_document() {
        let schema = SchemaDescriptor::builder("Pet")
            .field("name", FieldSpec::string())
            .build()
            .unwrap();
        let spec = schema.field("name").unwrap();
        let mut doc = schema.instantiate().unwrap();

        spec.write(&mut doc, "Rex").unwrap();
        assert!(spec.write(&mut doc, 7).is_err());

        assert_eq!(spec.read(&doc).unwrap(), Value::from("Rex"));
        assert_eq!(doc.encode()["name"], json!("Rex"));
    }

    #[test]
    fn required_only_checked_when_requested() {
        let spec = named(FieldSpec::string().required(), "name");

        assert!(spec.validate(&Value::Null, false).is_empty());
        assert_eq!(
            spec.validate(&Value::from(""), true),
            vec![Violation::RequiredFieldMissing { field: "name".into() }]
        );
    }

    #[test]
    fn choices_test_membership_against_the_whole_set() {
        let spec = named(FieldSpec::string().choices(["cat", "dog", "bird"]), "kind");

        assert!(spec.validate(&Value::from("bird"), true).is_empty());
        assert!(spec.validate(&Value::from("dog"), true).is_empty());
        assert!(matches!(
            spec.validate(&Value::from("fish"), true).as_slice(),
            [Violation::ChoiceViolation { field, .. }] if field == "kind"
        ));
    }

    #[test]
    fn validator_chain_stops_at_first_failure() {
        let spec = named(
            FieldSpec::integer()
                .validator("positive", |v| match v.as_i64() {
                    Some(n) if n <= 0 => Err("must be positive".into()),
                    _ => Ok(()),
                })
                .validator("never_reached", |_| panic!("chain should have stopped")),
            "age",
        );

        let violations = spec.validate(&Value::Integer(-1), false);

        assert_eq!(
            violations,
            vec![Violation::ValidatorFailure {
                field: "age".into(),
                validator: "positive".into(),
                message: "must be positive".into(),
            }]
        );
    }

    #[test]
    fn prepare_type_checks_before_validating() {
        let spec = named(FieldSpec::string(), "name");

        assert!(matches!(
            spec.prepare(&Value::Integer(123)),
            Err(DocumentError::TypeMismatch { .. })
        ));
        assert_eq!(spec.prepare(&Value::from("Fluffy")).unwrap(), json!("Fluffy"));
    }

    #[test]
    fn default_factories_run_per_call() {
        let spec = FieldSpec::list(Some(FieldType::String))
            .default_with(|| Value::from(vec!["seed"]));

        let mut first = spec.default_value();
        if let Value::List(items) = &mut first {
            items.push(Value::from("mutated"));
        }

        assert_eq!(spec.default_value(), Value::from(vec!["seed"]));
    }

    #[test]
    fn container_types_default_to_empty_containers() {
        assert_eq!(FieldSpec::set(None).default_value(), Value::List(vec![]));
        assert_eq!(FieldSpec::dict(None).default_value(), Value::Dict(Default::default()));
        assert_eq!(FieldSpec::string().default_value(), Value::Null);
    }

    #[test]
    fn type_names_describe_items() {
        assert_eq!(FieldType::List(item(FieldType::Date)).name(), "list<date>");
        assert_eq!(FieldType::Set(None).name(), "set<any>");
    }
}
