/// Declares a typed wrapper around a [`Document`](crate::Document).
///
/// The wrapper caches its [`SchemaDescriptor`](crate::schema::SchemaDescriptor)
/// on first use and exposes one getter/setter pair per field. Getters decode
/// from the canonical tree and setters go through the same type and
/// validation checks as [`Document::set`](crate::Document::set). Parent
/// wrappers listed after the schema name are inherited in order; their
/// fields stay reachable through [`document`](#method.document).
///
/// # Reserved accessor names
///
/// The wrapper defines `schema`, `new`, `decode`, `document`,
/// `document_mut`, `into_document`, `validate` and `encode` itself. A field
/// with one of these names cannot use its own name as the getter; declare it
/// through [`Document::get`](crate::Document::get) on
/// [`document`](#method.document) instead, or give the schema field a
/// different name.
///
/// ```compile_fail
/// use docschema::prelude::*;
///
/// docschema::document! {
///     pub struct Report("Report") {
///         encode / set_encode: Option<String> = FieldSpec::string(),
///     }
/// }
/// ```
///
/// ```ignore
/// use docschema::prelude::*;
///
/// docschema::document! {
///     pub struct Animal("Animal") {
///         name / set_name: Option<String> = FieldSpec::string().required(),
///     }
/// }
///
/// docschema::document! {
///     pub struct Pet("Pet"): Animal {
///         birthdate / set_birthdate: Option<NaiveDate> = FieldSpec::date(),
///     }
/// }
/// ```
#[macro_export]
macro_rules! document {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident($schema_name:literal) $(: $($parent:ty),+)? {
            $(
                $(#[$field_meta:meta])*
                $field:ident / $setter:ident : $ty:ty = $spec:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name($crate::document::Document);

        impl $name {
            /// Returns the cached schema descriptor.
            pub fn schema() -> $crate::error::DocumentResult<::std::sync::Arc<$crate::schema::SchemaDescriptor>> {
                fn build() -> $crate::error::DocumentResult<::std::sync::Arc<$crate::schema::SchemaDescriptor>> {
                    let builder = $crate::schema::SchemaDescriptor::builder($schema_name);
                    $($(let builder = builder.inherit(&<$parent>::schema()?);)+)?
                    $(let builder = builder.field(stringify!($field), $spec);)*
                    builder.build()
                }

                $crate::__private::lazy_static! {
                    static ref SCHEMA: ::std::result::Result<
                        ::std::sync::Arc<$crate::schema::SchemaDescriptor>,
                        ::std::string::String,
                    > = build().map_err(|err| err.to_string());
                }

                match &*SCHEMA {
                    Ok(schema) => Ok(::std::sync::Arc::clone(schema)),
                    Err(message) => Err($crate::error::DocumentError::SchemaDeclaration(message.clone())),
                }
            }

            /// Creates an empty instance seeded from the field defaults.
            pub fn new() -> $crate::error::DocumentResult<Self> {
                Ok(Self($crate::document::Document::new(&Self::schema()?)?))
            }

            /// Wraps a raw canonical object without validating it.
            pub fn decode(json: $crate::serde_json::Value) -> $crate::error::DocumentResult<Self> {
                Ok(Self($crate::document::Document::decode(&Self::schema()?, json)?))
            }

            pub fn document(&self) -> &$crate::document::Document {
                &self.0
            }

            pub fn document_mut(&mut self) -> &mut $crate::document::Document {
                &mut self.0
            }

            pub fn into_document(self) -> $crate::document::Document {
                self.0
            }

            pub fn validate(&self) -> ::std::vec::Vec<$crate::error::Violation> {
                self.0.validate()
            }

            pub fn encode(&self) -> $crate::serde_json::Value {
                self.0.encode()
            }

            $(
                $(#[$field_meta])*
                pub fn $field(&self) -> $crate::error::DocumentResult<$ty> {
                    self.0.get_as::<$ty>(stringify!($field))
                }

                pub fn $setter(&mut self, value: $ty) -> $crate::error::DocumentResult<()> {
                    self.0.set(stringify!($field), value)
                }
            )*
        }

        impl ::std::convert::From<$name> for $crate::document::Document {
            fn from(wrapper: $name) -> Self {
                wrapper.0
            }
        }
    };
}
