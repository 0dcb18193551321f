//! The in-memory side of the codec.
//!
//! A [`QueryValue`] is what [`parse`](crate::parse) produces, what
//! [`stringify`](crate::stringify) consumes and what the schema layer validates.

use std::fmt;
use std::ops::Index;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::map::Map;
use crate::utils;

/// One decoded query string: top-level keys are unique.
pub type ParsedQuery = Map<String, QueryValue>;

/// A recursive query value.
///
/// `Undefined` stands for an absent value (a missing object key, an optional
/// schema that received nothing) while `Null` is an explicit null, e.g. a bare
/// key parsed with `strict_null_handling`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum QueryValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(DateTime<Utc>),
    Array(Vec<QueryValue>),
    Object(ParsedQuery),
}

impl QueryValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, QueryValue::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// True for `Null` and `Undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, QueryValue::Null | QueryValue::Undefined)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            QueryValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            QueryValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            QueryValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            QueryValue::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<QueryValue>> {
        match self {
            QueryValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<QueryValue>> {
        match self {
            QueryValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ParsedQuery> {
        match self {
            QueryValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ParsedQuery> {
        match self {
            QueryValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Look up a key when this value is an object.
    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Short name of the variant, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            QueryValue::Undefined => "undefined",
            QueryValue::Null => "null",
            QueryValue::Bool(_) => "boolean",
            QueryValue::Number(_) => "number",
            QueryValue::String(_) => "string",
            QueryValue::Date(_) => "date",
            QueryValue::Array(_) => "array",
            QueryValue::Object(_) => "object",
        }
    }

    /// Convert to a `serde_json::Value`.
    ///
    /// Dates become ISO-8601 strings and `Undefined` becomes `null`, which is
    /// what JSON text produced for the `json` array format expects.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            QueryValue::Undefined | QueryValue::Null => Value::Null,
            QueryValue::Bool(b) => Value::Bool(*b),
            QueryValue::Number(n) if utils::is_safe_integer(*n) => Value::from(*n as i64),
            QueryValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            QueryValue::String(s) => Value::String(s.clone()),
            QueryValue::Date(d) => Value::String(iso_string(d)),
            QueryValue::Array(a) => Value::Array(a.iter().map(QueryValue::to_json).collect()),
            QueryValue::Object(o) => Value::Object(
                o.iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

static UNDEFINED: QueryValue = QueryValue::Undefined;

/// Missing keys, and keys on non-objects, index to `Undefined`.
impl Index<&str> for QueryValue {
    type Output = QueryValue;

    fn index(&self, key: &str) -> &QueryValue {
        self.get(key).unwrap_or(&UNDEFINED)
    }
}

/// Out-of-range positions, and positions on non-arrays, index to `Undefined`.
impl Index<usize> for QueryValue {
    type Output = QueryValue;

    fn index(&self, index: usize) -> &QueryValue {
        self.as_array()
            .and_then(|items| items.get(index))
            .unwrap_or(&UNDEFINED)
    }
}

/// Render a date the way `Date.prototype.toISOString` does.
pub fn iso_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for QueryValue {
    /// Scalar text form: strings verbatim, numbers in shortest form,
    /// containers as JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Undefined => f.write_str("undefined"),
            QueryValue::Null => f.write_str("null"),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::Number(n) => f.write_str(&utils::number_to_string(*n)),
            QueryValue::String(s) => f.write_str(s),
            QueryValue::Date(d) => f.write_str(&iso_string(d)),
            QueryValue::Array(_) | QueryValue::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<serde_json::Value> for QueryValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => QueryValue::Null,
            Value::Bool(b) => QueryValue::Bool(b),
            Value::Number(n) => QueryValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => QueryValue::String(s),
            Value::Array(a) => QueryValue::Array(a.into_iter().map(QueryValue::from).collect()),
            Value::Object(o) => {
                QueryValue::Object(o.into_iter().map(|(k, v)| (k, QueryValue::from(v))).collect())
            }
        }
    }
}

impl From<QueryValue> for serde_json::Value {
    fn from(value: QueryValue) -> Self {
        value.to_json()
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        QueryValue::String(s.to_owned())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        QueryValue::String(s)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        QueryValue::Bool(b)
    }
}

macro_rules! from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for QueryValue {
                fn from(n: $ty) -> Self {
                    QueryValue::Number(n as f64)
                }
            }
        )*
    };
}

from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl From<DateTime<Utc>> for QueryValue {
    fn from(d: DateTime<Utc>) -> Self {
        QueryValue::Date(d)
    }
}

impl From<ParsedQuery> for QueryValue {
    fn from(map: ParsedQuery) -> Self {
        QueryValue::Object(map)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        QueryValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QueryValue::Null, Into::into)
    }
}

impl<K: Into<String>, V: Into<QueryValue>> FromIterator<(K, V)> for QueryValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        QueryValue::Object(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for QueryValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            QueryValue::Undefined | QueryValue::Null => serializer.serialize_none(),
            QueryValue::Bool(b) => serializer.serialize_bool(*b),
            QueryValue::Number(n) => {
                if utils::is_safe_integer(*n) {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            QueryValue::String(s) => serializer.serialize_str(s),
            QueryValue::Date(d) => serializer.serialize_str(&iso_string(d)),
            QueryValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            QueryValue::Object(map) => {
                let mut out = serializer.serialize_map(None)?;
                for (k, v) in map.iter().filter(|(_, v)| !v.is_undefined()) {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct QueryValueVisitor;

impl<'de> Visitor<'de> for QueryValueVisitor {
    type Value = QueryValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any query value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<QueryValue, E> {
        Ok(QueryValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<QueryValue, E> {
        Ok(QueryValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<QueryValue, E> {
        Ok(QueryValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<QueryValue, E> {
        Ok(QueryValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<QueryValue, E> {
        Ok(QueryValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<QueryValue, E> {
        Ok(QueryValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<QueryValue, E> {
        Ok(QueryValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<QueryValue, E> {
        Ok(QueryValue::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<QueryValue, D::Error> {
        QueryValue::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<QueryValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(QueryValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<QueryValue, A::Error> {
        let mut map = ParsedQuery::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, QueryValue>()? {
            map.insert(k, v);
        }
        Ok(QueryValue::Object(map))
    }
}

impl<'de> Deserialize<'de> for QueryValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(QueryValueVisitor)
    }
}
