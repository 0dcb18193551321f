use super::{BaseInfo, Schema, SchemaKind, SchemaType};
use crate::error::ValidationError;
use crate::value::QueryValue;

#[derive(Clone, Copy, Debug)]
enum ArrayCheck {
    Min(usize),
    Max(usize),
    Length(usize),
    NonEmpty,
}

/// Sequences, optionally validating every item.
#[derive(Clone, Debug)]
pub struct ArraySchema {
    base: BaseInfo,
    items: Option<Box<Schema>>,
    checks: Vec<ArrayCheck>,
}

impl ArraySchema {
    pub fn new(items: Option<Schema>) -> Self {
        Self {
            base: BaseInfo::default(),
            items: items.map(Box::new),
            checks: Vec::new(),
        }
    }

    fn with(mut self, check: ArrayCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn min(self, length: usize) -> Self {
        self.with(ArrayCheck::Min(length))
    }

    pub fn max(self, length: usize) -> Self {
        self.with(ArrayCheck::Max(length))
    }

    pub fn length(self, length: usize) -> Self {
        self.with(ArrayCheck::Length(length))
    }

    pub fn nonempty(self) -> Self {
        self.with(ArrayCheck::NonEmpty)
    }
}

impl SchemaType for ArraySchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Array
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let QueryValue::Array(items) = value else {
            return Err(ValidationError::new(format!(
                "Expected array, got {}",
                value.type_name()
            )));
        };

        let len = items.len();
        for check in &self.checks {
            let failure = match *check {
                ArrayCheck::Min(min) if len < min => format!("Array must have at least {min} items"),
                ArrayCheck::Max(max) if len > max => format!("Array must have at most {max} items"),
                ArrayCheck::Length(exact) if len != exact => {
                    format!("Array must have exactly {exact} items")
                }
                ArrayCheck::NonEmpty if len == 0 => "Array must not be empty".to_owned(),
                _ => continue,
            };
            return Err(ValidationError::new(failure));
        }

        let Some(schema) = &self.items else {
            return Ok(QueryValue::Array(items));
        };
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                schema
                    .parse(item)
                    .map_err(|e| e.context(format_args!("Invalid item at index {i}")))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(QueryValue::Array)
    }
}

/// The first option that accepts the value wins.
#[derive(Clone, Debug)]
pub struct UnionSchema {
    base: BaseInfo,
    options: Vec<Schema>,
}

impl UnionSchema {
    pub fn new<I>(options: I) -> Self
    where
        I: IntoIterator<Item = Schema>,
    {
        Self {
            base: BaseInfo::default(),
            options: options.into_iter().collect(),
        }
    }

    pub fn options(&self) -> &[Schema] {
        &self.options
    }
}

impl SchemaType for UnionSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Union
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let mut failures = Vec::with_capacity(self.options.len());
        for option in &self.options {
            match option.parse(value.clone()) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => failures.push(e.message().to_owned()),
            }
        }
        Err(ValidationError::new(format!(
            "Union validation failed: {}",
            failures.join("; ")
        )))
    }
}

/// Passes `Undefined` through untouched; anything else goes to the inner
/// schema. The wrapper's own default, refinements and transforms are
/// skipped for `Undefined`.
#[derive(Clone, Debug)]
pub struct OptionalSchema {
    base: BaseInfo,
    inner: Box<Schema>,
}

impl OptionalSchema {
    pub fn new(inner: impl Into<Schema>) -> Self {
        Self {
            base: BaseInfo::default(),
            inner: Box::new(inner.into()),
        }
    }

    pub fn inner(&self) -> &Schema {
        &self.inner
    }

    pub fn into_inner(self) -> Schema {
        *self.inner
    }
}

impl SchemaType for OptionalSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Optional
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        self.inner.parse(value)
    }

    fn parse(&self, value: impl Into<QueryValue>) -> Result<QueryValue, ValidationError> {
        let value = value.into();
        if value.is_undefined() {
            return Ok(value);
        }
        let checked = self.check(value)?;
        self.base.finish(checked)
    }
}

/// Passes `Null` through untouched; anything else goes to the inner schema.
#[derive(Clone, Debug)]
pub struct NullableSchema {
    base: BaseInfo,
    inner: Box<Schema>,
}

impl NullableSchema {
    pub fn new(inner: impl Into<Schema>) -> Self {
        Self {
            base: BaseInfo::default(),
            inner: Box::new(inner.into()),
        }
    }

    pub fn inner(&self) -> &Schema {
        &self.inner
    }

    pub fn into_inner(self) -> Schema {
        *self.inner
    }
}

impl SchemaType for NullableSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Nullable
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        self.inner.parse(value)
    }

    fn parse(&self, value: impl Into<QueryValue>) -> Result<QueryValue, ValidationError> {
        let value = value.into();
        if value.is_null() {
            return Ok(value);
        }
        let checked = self.check(value)?;
        self.base.finish(checked)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{boolean, number, string};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn array_items_are_checked() {
        let numbers = ArraySchema::new(Some(number().into()));
        assert_eq!(
            numbers.parse(QueryValue::from(json!(["1", "2"]))).unwrap(),
            QueryValue::from(json!([1, 2]))
        );
        assert_eq!(
            numbers.parse(QueryValue::from(json!(["1", "x"]))).unwrap_err().message(),
            "Invalid item at index 1: Expected number, got string"
        );
        assert_eq!(
            numbers.parse("1").unwrap_err().message(),
            "Expected array, got string"
        );
    }

    #[test]
    fn array_lengths_in_chained_order() {
        let tags = ArraySchema::new(None).nonempty().max(2);
        assert_eq!(
            tags.parse(QueryValue::Array(vec![])).unwrap_err().message(),
            "Array must not be empty"
        );
        assert_eq!(
            tags.parse(QueryValue::from(vec!["a", "b", "c"])).unwrap_err().message(),
            "Array must have at most 2 items"
        );
        assert!(ArraySchema::new(None).length(1).parse(vec!["a"]).is_ok());
    }

    #[test]
    fn union_tries_in_order() {
        let flag = UnionSchema::new([Schema::from(boolean()), string().into()]);
        assert_eq!(flag.parse("true").unwrap(), QueryValue::Bool(true));
        assert_eq!(flag.parse("on").unwrap(), QueryValue::from("on"));
        assert_eq!(
            flag.parse(QueryValue::Null).unwrap_err().message(),
            "Union validation failed: Expected boolean, got null; Expected string, got null"
        );
    }

    #[test]
    fn optional_and_nullable_pass_their_empty_value() {
        let optional = string().optional();
        assert_eq!(optional.parse(QueryValue::Undefined).unwrap(), QueryValue::Undefined);
        assert!(optional.parse(QueryValue::Null).is_err());

        let nullable = string().nullable();
        assert_eq!(nullable.parse(QueryValue::Null).unwrap(), QueryValue::Null);
        assert!(nullable.parse(QueryValue::Undefined).is_err());
        assert_eq!(nullable.parse("x").unwrap(), QueryValue::from("x"));
    }

    #[test]
    fn inner_default_is_unreachable_through_optional() {
        let optional = number().default(5).optional();
        assert_eq!(optional.parse(QueryValue::Undefined).unwrap(), QueryValue::Undefined);
        assert_eq!(optional.into_inner().parse(QueryValue::Undefined).unwrap(), QueryValue::from(5));
    }
}
