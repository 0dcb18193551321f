use serde::de::value::{MapDeserializer, SeqDeserializer};
use serde::de::{self, IntoDeserializer, Unexpected};
use serde::forward_to_deserialize_any;

use crate::error::{Error, Result};
use crate::utils;
use crate::value::{QueryValue, iso_string};

/// Deserializes typed values out of a parsed [`QueryValue`] tree.
///
/// Query strings carry every leaf as text, so string leaves are parsed on
/// demand into whatever primitive the target type asks for. A text leaf that
/// doesn't parse is handed over as a string and the visitor reports the
/// mismatch. A single scalar is accepted where a sequence is expected.
#[derive(Debug)]
pub struct ValueDeserializer {
    value: QueryValue,
}

impl ValueDeserializer {
    pub fn new(value: QueryValue) -> Self {
        Self { value }
    }

    fn as_text(&self) -> Option<&str> {
        self.value.as_str()
    }
}

macro_rules! deserialize_primitive {
    ($ty:ident, $method:ident, $visit_method:ident) => {
        fn $method<V>(self, visitor: V) -> Result<V::Value>
        where
            V: de::Visitor<'de>,
        {
            if let Some(text) = self.as_text() {
                if let Ok(val) = text.parse::<$ty>() {
                    return visitor.$visit_method(val);
                }
            }
            self.deserialize_any(visitor)
        }
    };
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            QueryValue::Undefined | QueryValue::Null => visitor.visit_unit(),
            QueryValue::Bool(b) => visitor.visit_bool(b),
            QueryValue::Number(n) if utils::is_safe_integer(n) => visitor.visit_i64(n as i64),
            QueryValue::Number(n) => visitor.visit_f64(n),
            QueryValue::String(s) => visitor.visit_string(s),
            QueryValue::Date(d) => visitor.visit_string(iso_string(&d)),
            QueryValue::Array(items) => {
                let mut seq = SeqDeserializer::<_, Error>::new(items.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            QueryValue::Object(map) => {
                let mut access =
                    MapDeserializer::<_, Error>::new(map.into_iter().map(|(k, v)| (Key(k), v)));
                let value = visitor.visit_map(&mut access)?;
                access.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if self.value.is_nullish() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        if matches!(&self.value, QueryValue::String(s) if s.is_empty()) {
            return visitor.visit_unit();
        }
        self.deserialize_any(visitor)
    }

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            QueryValue::Array(_) => self.deserialize_any(visitor),
            QueryValue::Undefined | QueryValue::Null => {
                visitor.visit_seq(SeqDeserializer::<_, Error>::new(std::iter::empty::<QueryValue>()))
            }
            scalar => {
                let mut seq = SeqDeserializer::<_, Error>::new(std::iter::once(scalar));
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        match self.value {
            QueryValue::String(variant) => visitor.visit_enum(variant.into_deserializer()),
            QueryValue::Object(map) if map.len() == 1 => {
                let Some((variant, value)) = map.into_iter().next() else {
                    return Err(Error::custom("expected a single-key map for an enum"));
                };
                visitor.visit_enum(VariantDeserializer { variant, value })
            }
            other => Err(de::Error::invalid_type(
                Unexpected::Other(other.type_name()),
                &"a string or a single-key map",
            )),
        }
    }

    deserialize_primitive!(bool, deserialize_bool, visit_bool);
    deserialize_primitive!(i8, deserialize_i8, visit_i8);
    deserialize_primitive!(i16, deserialize_i16, visit_i16);
    deserialize_primitive!(i32, deserialize_i32, visit_i32);
    deserialize_primitive!(i64, deserialize_i64, visit_i64);
    deserialize_primitive!(u8, deserialize_u8, visit_u8);
    deserialize_primitive!(u16, deserialize_u16, visit_u16);
    deserialize_primitive!(u32, deserialize_u32, visit_u32);
    deserialize_primitive!(u64, deserialize_u64, visit_u64);
    deserialize_primitive!(f32, deserialize_f32, visit_f32);
    deserialize_primitive!(f64, deserialize_f64, visit_f64);
    deserialize_primitive!(char, deserialize_char, visit_char);

    forward_to_deserialize_any! {
        str string bytes byte_buf unit_struct tuple
        tuple_struct map struct identifier ignored_any
    }
}

impl<'de> IntoDeserializer<'de, Error> for QueryValue {
    type Deserializer = ValueDeserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        ValueDeserializer::new(self)
    }
}

/// A map key. Keys are always text, parsed on demand like leaves so maps
/// keyed by numbers work.
struct Key(String);

impl<'de> IntoDeserializer<'de, Error> for Key {
    type Deserializer = KeyDeserializer;

    fn into_deserializer(self) -> Self::Deserializer {
        KeyDeserializer(self.0)
    }
}

struct KeyDeserializer(String);

impl KeyDeserializer {
    fn as_text(&self) -> Option<&str> {
        Some(&self.0)
    }
}

impl<'de> de::Deserializer<'de> for KeyDeserializer {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_string(self.0)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_enum(self.0.into_deserializer())
    }

    fn deserialize_newtype_struct<V>(self, _name: &'static str, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    deserialize_primitive!(bool, deserialize_bool, visit_bool);
    deserialize_primitive!(i8, deserialize_i8, visit_i8);
    deserialize_primitive!(i16, deserialize_i16, visit_i16);
    deserialize_primitive!(i32, deserialize_i32, visit_i32);
    deserialize_primitive!(i64, deserialize_i64, visit_i64);
    deserialize_primitive!(u8, deserialize_u8, visit_u8);
    deserialize_primitive!(u16, deserialize_u16, visit_u16);
    deserialize_primitive!(u32, deserialize_u32, visit_u32);
    deserialize_primitive!(u64, deserialize_u64, visit_u64);
    deserialize_primitive!(f32, deserialize_f32, visit_f32);
    deserialize_primitive!(f64, deserialize_f64, visit_f64);

    forward_to_deserialize_any! {
        char str string bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

/// `{"Variant": value}` read as an externally tagged enum.
struct VariantDeserializer {
    variant: String,
    value: QueryValue,
}

impl<'de> de::EnumAccess<'de> for VariantDeserializer {
    type Error = Error;
    type Variant = ValueDeserializer;

    fn variant_seed<T>(self, seed: T) -> Result<(T::Value, Self::Variant)>
    where
        T: de::DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(KeyDeserializer(self.variant))?;
        Ok((variant, ValueDeserializer::new(self.value)))
    }
}

impl<'de> de::VariantAccess<'de> for ValueDeserializer {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value>
    where
        T: de::DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value>
    where
        V: de::Visitor<'de>,
    {
        de::Deserializer::deserialize_any(self, visitor)
    }
}
