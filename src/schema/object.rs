use super::{BaseInfo, Schema, SchemaKind, SchemaType};
use crate::error::{Error, Result, ValidationError};
use crate::map::Map;
use crate::value::{ParsedQuery, QueryValue};

/// Field schemas of an object, in declaration order.
pub type Shape = Map<String, Schema>;

/// What happens to input keys that the shape does not name.
#[derive(Clone, Debug, Default)]
pub enum ExtraKeys {
    /// Drop them.
    #[default]
    Strip,
    /// Fail with `Unknown key "k"`.
    Strict,
    /// Copy them through unchecked.
    Passthrough,
    /// Validate each of them with this schema.
    Catchall(Box<Schema>),
}

/// Objects, optionally with a field-by-field shape.
///
/// Without a shape any object is accepted unchanged. With one, every field
/// is validated in declaration order (missing keys are seen as
/// `Undefined`) and fields that come out `Undefined` are left out of the
/// result.
#[derive(Clone, Debug, Default)]
pub struct ObjectSchema {
    base: BaseInfo,
    shape: Option<Shape>,
    extra: ExtraKeys,
}

impl ObjectSchema {
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    fn with_shape(shape: Shape) -> Self {
        Self {
            shape: Some(shape),
            ..Default::default()
        }
    }

    /// Replace the shape.
    pub fn shape<K, S, I>(mut self, shape: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Schema>,
    {
        self.shape = Some(
            shape
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
        );
        self
    }

    /// Add or replace a single field.
    pub fn field(mut self, key: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.shape
            .get_or_insert_with(Shape::new)
            .insert(key.into(), schema.into());
        self
    }

    pub fn get_shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    pub fn strict(mut self) -> Self {
        self.extra = ExtraKeys::Strict;
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.extra = ExtraKeys::Passthrough;
        self
    }

    pub fn strip(mut self) -> Self {
        self.extra = ExtraKeys::Strip;
        self
    }

    pub fn catchall(mut self, schema: impl Into<Schema>) -> Self {
        self.extra = ExtraKeys::Catchall(Box::new(schema.into()));
        self
    }

    /// A new schema holding only the named fields that exist in the shape.
    pub fn pick<I, K>(&self, keys: I) -> Result<ObjectSchema>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let shape = self.shape.as_ref().ok_or(Error::MissingShape)?;
        let picked = keys
            .into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                shape.get(key).map(|s| (key.to_owned(), s.clone()))
            })
            .collect();
        Ok(Self::with_shape(picked))
    }

    /// A new schema holding every field except the named ones.
    pub fn omit<I, K>(&self, keys: I) -> Result<ObjectSchema>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut shape = self.shape.clone().ok_or(Error::MissingShape)?;
        for key in keys {
            shape.shift_remove(key.as_ref());
        }
        Ok(Self::with_shape(shape))
    }

    /// A new schema with this shape plus `extension`; later fields win.
    pub fn extend<K, S, I>(&self, extension: I) -> ObjectSchema
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Schema>,
    {
        let mut shape = self.shape.clone().unwrap_or_default();
        shape.extend(extension.into_iter().map(|(k, s)| (k.into(), s.into())));
        Self::with_shape(shape)
    }

    /// A new schema with both shapes; fields of `other` win.
    pub fn merge(&self, other: &ObjectSchema) -> ObjectSchema {
        let mut shape = self.shape.clone().unwrap_or_default();
        if let Some(theirs) = &other.shape {
            shape.extend(theirs.iter().map(|(k, s)| (k.clone(), s.clone())));
        }
        Self::with_shape(shape)
    }

    /// Every field becomes optional.
    pub fn partial(&self) -> ObjectSchema {
        self.map_fields(|schema| match schema {
            Schema::Optional(_) => schema,
            other => other.optional().into(),
        })
    }

    /// Like [`partial`](Self::partial), recursing into nested object schemas.
    pub fn deep_partial(&self) -> ObjectSchema {
        self.map_fields(deep_partial_field)
    }

    /// Every optional field becomes required again.
    pub fn required(&self) -> ObjectSchema {
        self.map_fields(|schema| match schema {
            Schema::Optional(optional) => optional.into_inner(),
            other => other,
        })
    }

    fn map_fields(&self, f: impl Fn(Schema) -> Schema) -> ObjectSchema {
        match &self.shape {
            Some(shape) => Self::with_shape(
                shape
                    .iter()
                    .map(|(k, s)| (k.clone(), f(s.clone())))
                    .collect(),
            ),
            None => self.clone(),
        }
    }

    fn check_shape(&self, shape: &Shape, mut input: ParsedQuery) -> Result<ParsedQuery, ValidationError> {
        let mut result = ParsedQuery::with_capacity(shape.len());
        for (key, schema) in shape {
            let value = input.shift_remove(key).unwrap_or_default();
            let parsed = schema
                .parse(value)
                .map_err(|e| e.context(format_args!("Invalid value for key \"{key}\"")))?;
            if !parsed.is_undefined() {
                result.insert(key.clone(), parsed);
            }
        }

        for (key, value) in input {
            match &self.extra {
                ExtraKeys::Strip => {}
                ExtraKeys::Strict => {
                    return Err(ValidationError::new(format!("Unknown key \"{key}\"")));
                }
                ExtraKeys::Passthrough => {
                    result.insert(key, value);
                }
                ExtraKeys::Catchall(schema) => {
                    let parsed = schema
                        .parse(value)
                        .map_err(|e| e.context(format_args!("Invalid value for key \"{key}\"")))?;
                    result.insert(key, parsed);
                }
            }
        }
        Ok(result)
    }
}

fn deep_partial_field(schema: Schema) -> Schema {
    match schema {
        Schema::Object(object) => object.deep_partial().optional().into(),
        Schema::Optional(optional) => match optional.into_inner() {
            Schema::Object(object) => object.deep_partial().optional().into(),
            inner => inner.optional().into(),
        },
        other => other.optional().into(),
    }
}

impl SchemaType for ObjectSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Object
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let QueryValue::Object(input) = value else {
            return Err(ValidationError::new(format!(
                "Expected object, got {}",
                value.type_name()
            )));
        };
        match &self.shape {
            Some(shape) => self.check_shape(shape, input).map(QueryValue::Object),
            None => Ok(QueryValue::Object(input)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{number, string};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user() -> ObjectSchema {
        ObjectSchema::new()
            .field("name", string())
            .field("age", number().optional())
    }

    fn input(value: serde_json::Value) -> QueryValue {
        QueryValue::from(value)
    }

    #[test]
    fn shapeless_accepts_any_object() {
        let value = input(json!({"x": "1"}));
        assert_eq!(ObjectSchema::new().parse(value.clone()).unwrap(), value);
        assert_eq!(
            ObjectSchema::new().parse("x").unwrap_err().message(),
            "Expected object, got string"
        );
    }

    #[test]
    fn fields_are_coerced_and_extras_stripped() {
        let parsed = user()
            .parse(input(json!({"name": "ann", "age": "30", "x": "y"})))
            .unwrap();
        assert_eq!(parsed, input(json!({"name": "ann", "age": 30})));

        let parsed = user().parse(input(json!({"name": "bob"}))).unwrap();
        assert_eq!(parsed, input(json!({"name": "bob"})));
    }

    #[test]
    fn field_errors_carry_the_key() {
        let err = user().parse(input(json!({"age": "1"}))).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid value for key \"name\": Expected string, got undefined"
        );
    }

    #[test]
    fn extra_key_policies() {
        let value = input(json!({"name": "a", "extra": "5"}));
        assert_eq!(
            user().strict().parse(value.clone()).unwrap_err().message(),
            "Unknown key \"extra\""
        );
        assert_eq!(
            user().passthrough().parse(value.clone()).unwrap(),
            input(json!({"name": "a", "extra": "5"}))
        );
        assert_eq!(
            user().catchall(number()).parse(value.clone()).unwrap(),
            input(json!({"name": "a", "extra": 5}))
        );
        assert_eq!(
            user().strict().strip().parse(value).unwrap(),
            input(json!({"name": "a"}))
        );
    }

    #[test]
    fn pick_and_omit() {
        let picked = user().pick(["age", "missing"]).unwrap();
        assert_eq!(picked.get_shape().unwrap().len(), 1);
        let omitted = user().omit(["age"]).unwrap();
        assert!(omitted.get_shape().unwrap().contains_key("name"));
        assert!(matches!(ObjectSchema::new().pick(["a"]), Err(Error::MissingShape)));
        assert!(matches!(ObjectSchema::new().omit(["a"]), Err(Error::MissingShape)));
    }

    #[test]
    fn extend_and_merge() {
        let extended = user().extend([("name", number())]);
        assert!(extended.parse(input(json!({"name": "1"}))).is_ok());

        let merged = user().merge(&ObjectSchema::new().field("tag", string()));
        assert_eq!(merged.get_shape().unwrap().len(), 3);
    }

    #[test]
    fn partial_and_required() {
        assert!(user().partial().parse(input(json!({}))).is_ok());
        let err = user().required().parse(input(json!({"name": "a"}))).unwrap_err();
        assert_eq!(
            err.message(),
            "Invalid value for key \"age\": Expected number, got undefined"
        );
    }

    #[test]
    fn deep_partial_reaches_nested_objects() {
        let nested = ObjectSchema::new().field("user", user());
        let value = input(json!({"user": {}}));
        assert!(nested.partial().parse(value.clone()).is_err());
        assert_eq!(nested.deep_partial().parse(value.clone()).unwrap(), value);
    }
}
