//! Writing query strings.

mod encode;
mod key;

use std::borrow::Cow;

pub use encode::encode;

use crate::config::{ArrayFormat, Filter, StringifyOptions};
use crate::value::{ParsedQuery, QueryValue, iso_string};

use key::KeyPath;

/// Stringify a value into a query string.
///
/// Only objects and arrays produce output; any other root gives `""`.
/// Nothing in here fails: values the wire format can't express are
/// written in their text or JSON form.
pub fn stringify(value: &QueryValue, options: &StringifyOptions) -> String {
    if !matches!(value, QueryValue::Object(_) | QueryValue::Array(_)) {
        return String::new();
    }

    let root: Option<Cow<'_, QueryValue>> = match &options.filter {
        Some(Filter::Function(filter)) => filter("", value).map(Cow::Owned),
        Some(Filter::Keys(keys)) => Some(Cow::Owned(select_keys(value, keys))),
        None => Some(Cow::Borrowed(value)),
    };

    let mut serializer = QsSerializer::new(options);
    match root.as_deref() {
        Some(QueryValue::Object(map)) => {
            for (k, v) in map {
                serializer.visit(k, v);
            }
        }
        Some(QueryValue::Array(items)) => {
            let mut index = itoa::Buffer::new();
            for (i, v) in items.iter().enumerate() {
                serializer.visit(index.format(i), v);
            }
        }
        _ => {}
    }
    serializer.finish()
}

fn select_keys(value: &QueryValue, keys: &[String]) -> QueryValue {
    let mut selected = ParsedQuery::with_capacity(keys.len());
    for key in keys {
        let found = match value {
            QueryValue::Object(map) => map.get(key),
            QueryValue::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        if let Some(found) = found {
            selected.insert(key.clone(), found.clone());
        }
    }
    QueryValue::Object(selected)
}

/// Walks a value tree depth-first, collecting encoded `(key, value)` pairs.
///
/// The key stack holds the raw key path; encoding happens once per emitted
/// pair so that brackets from nesting are treated consistently.
struct QsSerializer<'o> {
    options: &'o StringifyOptions,
    key: KeyPath,
    pairs: Vec<(String, Option<String>)>,
}

impl<'o> QsSerializer<'o> {
    fn new(options: &'o StringifyOptions) -> Self {
        Self {
            options,
            key: KeyPath::new(options.allow_dots),
            pairs: Vec::new(),
        }
    }

    fn visit(&mut self, segment: &str, value: &QueryValue) {
        self.key.push_key(segment);
        let options = self.options;
        let replaced;
        let value = match &options.filter {
            Some(Filter::Function(filter)) => match filter(self.key.as_str(), value) {
                Some(v) => {
                    replaced = v;
                    &replaced
                }
                None => {
                    tracing::trace!(key = self.key.as_str(), "filter suppressed node");
                    self.key.pop_key();
                    return;
                }
            },
            _ => value,
        };

        match value {
            QueryValue::Undefined | QueryValue::Null => self.write_null(),
            QueryValue::Array(items) => self.write_array(items),
            QueryValue::Object(map) => {
                for (k, v) in map {
                    self.visit(k, v);
                }
            }
            scalar => {
                let text = self.scalar_text(scalar);
                self.write_pair(self.key.as_str().to_owned(), &text);
            }
        }
        self.key.pop_key();
    }

    /// A bare key under `strict_null_handling`, even with `skip_nulls` set.
    fn write_null(&mut self) {
        if self.options.strict_null_handling {
            let key = self.encode_key(self.key.as_str());
            self.pairs.push((key, None));
        } else if !self.options.skip_nulls {
            let key = self.encode_key(self.key.as_str());
            self.pairs.push((key, Some(String::new())));
        }
    }

    fn write_array(&mut self, items: &[QueryValue]) {
        if items.is_empty() {
            return;
        }
        let format = self.options.array_format;
        let raw_key = self.key.as_str().to_owned();

        if format == ArrayFormat::Json {
            let json = serde_json::Value::Array(items.iter().map(QueryValue::to_json).collect());
            let key = format.element_key(&raw_key, 0).into_owned();
            self.write_pair(key, &json.to_string());
        } else if format.is_joined() {
            let separator = format.join_separator(&self.options.array_format_separator);
            let joined = items
                .iter()
                .map(|item| self.encode_value(&self.scalar_text(item)))
                .collect::<Vec<_>>()
                .join(separator);
            let key = self.encode_key(&format.element_key(&raw_key, 0));
            self.pairs.push((key, Some(joined)));
        } else {
            for (i, item) in items.iter().enumerate() {
                let text = self.scalar_text(item);
                let key = format.element_key(&raw_key, i).into_owned();
                self.write_pair(key, &text);
            }
        }
    }

    fn write_pair(&mut self, raw_key: String, raw_value: &str) {
        let key = self.encode_key(&raw_key);
        let value = self.encode_value(raw_value);
        self.pairs.push((key, Some(value)));
    }

    /// Text for a leaf: dates via `serialize_date`, nested containers as JSON.
    fn scalar_text(&self, value: &QueryValue) -> String {
        match value {
            QueryValue::Undefined | QueryValue::Null => String::new(),
            QueryValue::Date(d) => match &self.options.serialize_date {
                Some(serialize) => serialize(d),
                None => iso_string(d),
            },
            QueryValue::Array(_) | QueryValue::Object(_) => value.to_json().to_string(),
            other => other.to_string(),
        }
    }

    fn encode_key(&self, raw: &str) -> String {
        if self.options.encode_values_only {
            return raw.to_owned();
        }
        self.encode_with(raw, true)
    }

    fn encode_value(&self, raw: &str) -> String {
        self.encode_with(raw, false)
    }

    fn encode_with(&self, raw: &str, is_key: bool) -> String {
        let options = self.options;
        if !options.encode {
            return raw.to_owned();
        }
        let default = |s: &str| encode(s, options.format, options.charset, is_key).into_owned();
        match &options.encoder {
            Some(custom) => custom(raw, &default, options.charset),
            None => default(raw),
        }
    }

    fn finish(mut self) -> String {
        let options = self.options;
        if let Some(sort) = &options.sort {
            self.pairs.sort_by(|(a, _), (b, _)| sort.compare(a, b));
        }

        let mut out = String::new();
        if options.add_query_prefix {
            out.push('?');
        }
        if options.charset_sentinel {
            out.push_str(options.charset.sentinel());
            if !self.pairs.is_empty() {
                out.push_str(&options.delimiter);
            }
        }
        for (i, (key, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push_str(&options.delimiter);
            }
            out.push_str(key);
            if let Some(value) = value {
                out.push('=');
                out.push_str(value);
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Sort;
    use serde_json::json;

    fn stringify_json(value: serde_json::Value, options: &StringifyOptions) -> String {
        stringify(&QueryValue::from(value), options)
    }

    #[test]
    fn non_containers_give_nothing() {
        let options = StringifyOptions::default();
        assert_eq!(stringify(&QueryValue::Null, &options), "");
        assert_eq!(stringify(&QueryValue::from("x"), &options), "");
    }

    #[test]
    fn nested_keys() {
        let value = json!({"a": {"b": {"c": "d"}}, "e": 1});
        assert_eq!(
            stringify_json(value.clone(), &StringifyOptions::default()),
            "a[b][c]=d&e=1"
        );
        assert_eq!(
            stringify_json(value, &StringifyOptions::new().allow_dots(true)),
            "a.b.c=d&e=1"
        );
    }

    #[test]
    fn root_array_uses_indices() {
        let options = StringifyOptions::default();
        assert_eq!(stringify_json(json!(["a", "b"]), &options), "0=a&1=b");
    }

    #[test]
    fn array_elements_are_encoded() {
        let options = StringifyOptions::new().array_format(ArrayFormat::Comma);
        assert_eq!(stringify_json(json!({"a": ["x y", "z,w"]}), &options), "a=x%20y,z%2Cw");
    }

    #[test]
    fn sort_by_key_only() {
        let options = StringifyOptions::new().sort(Sort::Lexical);
        assert_eq!(stringify_json(json!({"b": "1", "a": "2"}), &options), "a=2&b=1");
    }

    #[test]
    fn sentinel_and_prefix() {
        let options = StringifyOptions::new()
            .charset_sentinel(true)
            .add_query_prefix(true);
        assert_eq!(stringify_json(json!({"a": "b"}), &options), "?utf8=%E2%9C%93&a=b");
    }
}
