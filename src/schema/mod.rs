//! Validation and coercion of parsed query values.
//!
//! A schema is built once through a chain of calls and then reused for any
//! number of [`parse`](SchemaType::parse) calls:
//!
//! ```
//! use querykit::schema::{self, SchemaType};
//! use querykit::QueryValue;
//!
//! let search = schema::object()
//!     .field("q", schema::string().trim().min(1))
//!     .field("page", schema::number().int().min(1).default(1));
//!
//! let query = querykit::parse("q=+rust+").unwrap();
//! let valid = search.parse(query).unwrap();
//! assert_eq!(valid.get("q"), Some(&QueryValue::from("rust")));
//! assert_eq!(valid.get("page"), Some(&QueryValue::from(1)));
//! ```
//!
//! Every node validates in the same order: the default replaces an
//! `Undefined` input, the variant checks and coerces the value, its
//! constraints run in the order they were chained, then refinements, and
//! finally transforms. The first failure wins.

mod composite;
mod object;
mod primitive;

use std::fmt;
use std::sync::Arc;

pub use composite::{ArraySchema, NullableSchema, OptionalSchema, UnionSchema};
pub use object::{ExtraKeys, ObjectSchema, Shape};
pub use primitive::{
    BasicSchema, BooleanSchema, DateSchema, EnumSchema, LiteralSchema, NumberSchema, StringSchema,
};

use crate::error::ValidationError;
use crate::value::QueryValue;

type Refinement = (Arc<dyn Fn(&QueryValue) -> bool + Send + Sync>, String);
type Transform = Arc<dyn Fn(QueryValue) -> QueryValue + Send + Sync>;

/// State every schema node carries besides its variant-specific checks.
#[derive(Clone, Default)]
pub struct BaseInfo {
    default: Option<QueryValue>,
    refinements: Vec<Refinement>,
    transforms: Vec<Transform>,
}

impl BaseInfo {
    fn apply_default(&self, value: QueryValue) -> QueryValue {
        match (&self.default, value) {
            (Some(default), QueryValue::Undefined) => default.clone(),
            (_, value) => value,
        }
    }

    /// Refinements, then transforms.
    fn finish(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        for (check, message) in &self.refinements {
            if !check(&value) {
                return Err(ValidationError::new(message.clone()));
            }
        }
        Ok(self
            .transforms
            .iter()
            .fold(value, |value, transform| transform(value)))
    }
}

impl fmt::Debug for BaseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseInfo")
            .field("default", &self.default)
            .field("refinements", &self.refinements.len())
            .field("transforms", &self.transforms.len())
            .finish()
    }
}

/// The variant tag of a schema node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaKind {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
    Enum,
    Union,
    Optional,
    Nullable,
    Literal,
    Any,
    Unknown,
    Null,
    Undefined,
    Void,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaKind::String => "string",
            SchemaKind::Number => "number",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Date => "date",
            SchemaKind::Array => "array",
            SchemaKind::Object => "object",
            SchemaKind::Enum => "enum",
            SchemaKind::Union => "union",
            SchemaKind::Optional => "optional",
            SchemaKind::Nullable => "nullable",
            SchemaKind::Literal => "literal",
            SchemaKind::Any => "any",
            SchemaKind::Unknown => "unknown",
            SchemaKind::Null => "null",
            SchemaKind::Undefined => "undefined",
            SchemaKind::Void => "void",
        };
        f.write_str(name)
    }
}

/// One problem reported by [`SchemaType::safe_parse`].
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub value: QueryValue,
}

/// Outcome of [`SchemaType::safe_parse`].
#[derive(Clone, Debug, PartialEq)]
pub enum SafeParseResult {
    Success(QueryValue),
    Failure(Vec<ValidationIssue>),
}

impl SafeParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SafeParseResult::Success(_))
    }

    pub fn data(&self) -> Option<&QueryValue> {
        match self {
            SafeParseResult::Success(data) => Some(data),
            SafeParseResult::Failure(_) => None,
        }
    }

    pub fn errors(&self) -> &[ValidationIssue] {
        match self {
            SafeParseResult::Success(_) => &[],
            SafeParseResult::Failure(errors) => errors,
        }
    }
}

/// Behaviour shared by every schema node.
///
/// Implementors provide the variant check; the trait supplies the uniform
/// default/refine/transform pipeline and the builder methods around it.
pub trait SchemaType: Sized + Into<Schema> {
    fn base(&self) -> &BaseInfo;

    fn base_mut(&mut self) -> &mut BaseInfo;

    fn kind(&self) -> SchemaKind;

    /// Type check, coercion and the variant's own constraints.
    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError>;

    /// Validate `value`, failing on the first violated rule.
    fn parse(&self, value: impl Into<QueryValue>) -> Result<QueryValue, ValidationError> {
        let base = self.base();
        let value = self.check(base.apply_default(value.into()))?;
        base.finish(value)
    }

    /// Like [`parse`](Self::parse), but reports failure as data.
    fn safe_parse(&self, value: impl Into<QueryValue>) -> SafeParseResult {
        let value = value.into();
        match self.parse(value.clone()) {
            Ok(data) => SafeParseResult::Success(data),
            Err(err) => SafeParseResult::Failure(vec![ValidationIssue {
                path: String::new(),
                message: err.message().to_owned(),
                value,
            }]),
        }
    }

    /// Value used in place of `Undefined`.
    fn default(mut self, value: impl Into<QueryValue>) -> Self {
        self.base_mut().default = Some(value.into());
        self
    }

    /// Add a predicate; a `false` result fails validation with `message`.
    fn refine<F>(mut self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&QueryValue) -> bool + Send + Sync + 'static,
    {
        self.base_mut()
            .refinements
            .push((Arc::new(check), message.into()));
        self
    }

    /// Add a transform applied to the validated value.
    fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(QueryValue) -> QueryValue + Send + Sync + 'static,
    {
        self.base_mut().transforms.push(Arc::new(transform));
        self
    }

    /// Accept `Undefined` as-is.
    fn optional(self) -> OptionalSchema {
        OptionalSchema::new(self)
    }

    /// Accept `Null` as-is.
    fn nullable(self) -> NullableSchema {
        NullableSchema::new(self)
    }
}

/// Any schema node.
#[derive(Clone, Debug)]
pub enum Schema {
    String(StringSchema),
    Number(NumberSchema),
    Boolean(BooleanSchema),
    Date(DateSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Enum(EnumSchema),
    Union(UnionSchema),
    Optional(OptionalSchema),
    Nullable(NullableSchema),
    Literal(LiteralSchema),
    /// `any`, `unknown`, `null`, `undefined` and `void`.
    Basic(BasicSchema),
}

macro_rules! dispatch {
    ($self:expr, $schema:ident => $body:expr) => {
        match $self {
            Schema::String($schema) => $body,
            Schema::Number($schema) => $body,
            Schema::Boolean($schema) => $body,
            Schema::Date($schema) => $body,
            Schema::Array($schema) => $body,
            Schema::Object($schema) => $body,
            Schema::Enum($schema) => $body,
            Schema::Union($schema) => $body,
            Schema::Optional($schema) => $body,
            Schema::Nullable($schema) => $body,
            Schema::Literal($schema) => $body,
            Schema::Basic($schema) => $body,
        }
    };
}

impl SchemaType for Schema {
    fn base(&self) -> &BaseInfo {
        dispatch!(self, s => s.base())
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        dispatch!(self, s => s.base_mut())
    }

    fn kind(&self) -> SchemaKind {
        dispatch!(self, s => s.kind())
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        dispatch!(self, s => s.check(value))
    }

    fn parse(&self, value: impl Into<QueryValue>) -> Result<QueryValue, ValidationError> {
        let value = value.into();
        dispatch!(self, s => s.parse(value))
    }
}

macro_rules! into_schema {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Schema {
                fn from(schema: $ty) -> Self {
                    Schema::$variant(schema)
                }
            }
        )*
    };
}

into_schema!(
    String(StringSchema),
    Number(NumberSchema),
    Boolean(BooleanSchema),
    Date(DateSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    Enum(EnumSchema),
    Union(UnionSchema),
    Optional(OptionalSchema),
    Nullable(NullableSchema),
    Literal(LiteralSchema),
    Basic(BasicSchema),
);

pub fn string() -> StringSchema {
    StringSchema::new()
}

pub fn number() -> NumberSchema {
    NumberSchema::new()
}

pub fn boolean() -> BooleanSchema {
    BooleanSchema::new()
}

pub fn date() -> DateSchema {
    DateSchema::new()
}

/// A sequence schema; without an item schema the items are not checked.
pub fn array(items: Option<Schema>) -> ArraySchema {
    ArraySchema::new(items)
}

/// An object schema without a shape, which accepts any object as-is.
pub fn object() -> ObjectSchema {
    ObjectSchema::new()
}

/// An object schema with the given shape.
pub fn schema<K, S, I>(shape: I) -> ObjectSchema
where
    I: IntoIterator<Item = (K, S)>,
    K: Into<String>,
    S: Into<Schema>,
{
    ObjectSchema::new().shape(shape)
}

pub fn enum_of<I, S>(options: I) -> EnumSchema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    EnumSchema::new(options)
}

pub fn union<I>(options: I) -> UnionSchema
where
    I: IntoIterator<Item = Schema>,
{
    UnionSchema::new(options)
}

pub fn literal(value: impl Into<QueryValue>) -> LiteralSchema {
    LiteralSchema::new(value)
}

pub fn any() -> BasicSchema {
    BasicSchema::new(SchemaKind::Any)
}

pub fn unknown() -> BasicSchema {
    BasicSchema::new(SchemaKind::Unknown)
}

pub fn null() -> BasicSchema {
    BasicSchema::new(SchemaKind::Null)
}

pub fn undefined() -> BasicSchema {
    BasicSchema::new(SchemaKind::Undefined)
}

pub fn void() -> BasicSchema {
    BasicSchema::new(SchemaKind::Void)
}

/// Validate `value` against `schema`.
pub fn validate<S: SchemaType>(
    schema: &S,
    value: impl Into<QueryValue>,
) -> Result<QueryValue, ValidationError> {
    schema.parse(value)
}

pub fn is_valid<S: SchemaType>(schema: &S, value: impl Into<QueryValue>) -> bool {
    schema.safe_parse(value).is_success()
}
