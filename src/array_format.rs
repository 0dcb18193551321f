//! Joining sequences into wire pairs and splitting wire values back into
//! sequences, per [`ArrayFormat`].

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ArrayFormat;
use crate::value::QueryValue;

static INDEX_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]$").expect("valid index marker pattern"));

impl ArrayFormat {
    /// Formats that write the whole sequence into a single pair.
    pub fn is_joined(self) -> bool {
        matches!(
            self,
            ArrayFormat::Comma
                | ArrayFormat::Separator
                | ArrayFormat::Json
                | ArrayFormat::BracketSeparator
        )
    }

    /// Separator between joined elements; `Comma` ignores the configured one.
    pub(crate) fn join_separator<'a>(self, configured: &'a str) -> &'a str {
        match self {
            ArrayFormat::Comma => ",",
            _ => configured,
        }
    }

    /// Key for element `index` of the sequence stored under `key`.
    pub(crate) fn element_key<'a>(self, key: &'a str, index: usize) -> Cow<'a, str> {
        match self {
            ArrayFormat::Repeat | ArrayFormat::Comma | ArrayFormat::Separator | ArrayFormat::Json => {
                Cow::Borrowed(key)
            }
            ArrayFormat::Brackets | ArrayFormat::BracketSeparator => Cow::Owned(format!("{key}[]")),
            ArrayFormat::Indices => Cow::Owned(format!("{key}[{index}]")),
        }
    }

    /// Strip the trailing sequence marker a key carries under this format:
    /// `[]` for `Brackets`/`BracketSeparator`, `[N]` for `Indices`.
    pub(crate) fn strip_marker(self, key: &str) -> Option<&str> {
        match self {
            ArrayFormat::Brackets | ArrayFormat::BracketSeparator => key.strip_suffix("[]"),
            ArrayFormat::Indices => INDEX_MARKER.find(key).map(|m| &key[..m.start()]),
            _ => None,
        }
    }

    /// Split a decoded wire value into a sequence, when the format calls for
    /// it and the value holds a separator (or JSON array text). Anything else
    /// passes through unchanged.
    pub(crate) fn split_value(self, value: QueryValue, separator: &str) -> QueryValue {
        let QueryValue::String(text) = value else {
            return value;
        };
        match self {
            ArrayFormat::Comma => split_on(text, ","),
            ArrayFormat::Separator | ArrayFormat::BracketSeparator => split_on(text, separator),
            ArrayFormat::Json => match serde_json::from_str::<serde_json::Value>(&text) {
                Ok(parsed @ serde_json::Value::Array(_)) => QueryValue::from(parsed),
                Ok(_) => QueryValue::String(text),
                Err(err) => {
                    tracing::trace!(value = %text, error = %err, "malformed json array text kept as-is");
                    QueryValue::String(text)
                }
            },
            _ => QueryValue::String(text),
        }
    }
}

fn split_on(text: String, separator: &str) -> QueryValue {
    if separator.is_empty() || !text.contains(separator) {
        return QueryValue::String(text);
    }
    QueryValue::Array(
        text.split(separator)
            .map(|part| QueryValue::from(part.trim()))
            .collect(),
    )
}

/// Merge a repeated assignment into the value already stored.
///
/// Sequences concatenate with the incoming side appended; two scalars become
/// a two-element sequence. Nested sequences are not flattened.
pub fn combine(existing: QueryValue, incoming: QueryValue) -> QueryValue {
    match (existing, incoming) {
        (QueryValue::Undefined, incoming) => incoming,
        (QueryValue::Array(mut items), QueryValue::Array(more)) => {
            items.extend(more);
            QueryValue::Array(items)
        }
        (QueryValue::Array(mut items), incoming) => {
            items.push(incoming);
            QueryValue::Array(items)
        }
        (existing, QueryValue::Array(more)) => {
            let mut items = Vec::with_capacity(more.len() + 1);
            items.push(existing);
            items.extend(more);
            QueryValue::Array(items)
        }
        (existing, incoming) => QueryValue::Array(vec![existing, incoming]),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markers() {
        assert_eq!(ArrayFormat::Brackets.strip_marker("a[]"), Some("a"));
        assert_eq!(ArrayFormat::Brackets.strip_marker("a[b][]"), Some("a[b]"));
        assert_eq!(ArrayFormat::Brackets.strip_marker("a[0]"), None);
        assert_eq!(ArrayFormat::Indices.strip_marker("a[12]"), Some("a"));
        assert_eq!(ArrayFormat::Indices.strip_marker("a[x]"), None);
        assert_eq!(ArrayFormat::Repeat.strip_marker("a[]"), None);
    }

    #[test]
    fn element_keys() {
        assert_eq!(ArrayFormat::Repeat.element_key("a", 1), "a");
        assert_eq!(ArrayFormat::Brackets.element_key("a", 1), "a[]");
        assert_eq!(ArrayFormat::Indices.element_key("a", 1), "a[1]");
    }

    #[test]
    fn split_values() {
        let split = ArrayFormat::Comma.split_value("a, b,c".into(), "|");
        assert_eq!(split, QueryValue::from(vec!["a", "b", "c"]));

        let split = ArrayFormat::Separator.split_value("a|b".into(), "|");
        assert_eq!(split, QueryValue::from(vec!["a", "b"]));

        let single = ArrayFormat::Comma.split_value("a".into(), ",");
        assert_eq!(single, QueryValue::from("a"));

        let json = ArrayFormat::Json.split_value(r#"["a",1]"#.into(), ",");
        assert_eq!(json, QueryValue::from(vec![QueryValue::from("a"), QueryValue::from(1)]));

        let broken = ArrayFormat::Json.split_value("[a,".into(), ",");
        assert_eq!(broken, QueryValue::from("[a,"));

        let object = ArrayFormat::Json.split_value(r#"{"a":1}"#.into(), ",");
        assert_eq!(object, QueryValue::from(r#"{"a":1}"#));
    }

    #[test]
    fn combine_rule() {
        assert_eq!(combine(QueryValue::Undefined, "a".into()), QueryValue::from("a"));
        assert_eq!(combine("a".into(), "b".into()), QueryValue::from(vec!["a", "b"]));
        assert_eq!(
            combine(QueryValue::from(vec!["a"]), QueryValue::from(vec!["b", "c"])),
            QueryValue::from(vec!["a", "b", "c"])
        );
        assert_eq!(
            combine("a".into(), QueryValue::from(vec!["b"])),
            QueryValue::from(vec!["a", "b"])
        );
        // nested sequences are kept as elements
        let nested = combine(
            QueryValue::from(vec![QueryValue::from(vec!["x"])]),
            QueryValue::from_iter([("k", "v")]),
        );
        assert_eq!(
            nested,
            QueryValue::from(vec![
                QueryValue::from(vec!["x"]),
                QueryValue::from_iter([("k", "v")]),
            ])
        );
    }
}
