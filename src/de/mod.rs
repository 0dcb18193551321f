//! Reading query strings.
//!
//! ### How a query string becomes a tree
//!
//! Parsing is a single pass over the `delimiter`-separated pairs. Each pair
//! is split on its first `=` and both halves are decoded independently (see
//! [`decode`]). The value then goes through the enabled scalar conversions
//! ([`coerce`]) and, for the array formats that pack a whole sequence into
//! one value, is split into a sequence.
//!
//! Keys are handled last: an explicit `[]`/`[N]` marker is stripped (and forces
//! a sequence), the rest of the key is cut into path segments and the value is
//! stored along that path ([`key_path`]). Repeated paths are resolved by the
//! [`Duplicates`](crate::Duplicates) policy.
//!
//! Dirty input never fails the parse: undecodable escapes and malformed JSON
//! come back as raw text. The one hard failure is the parameter limit, which
//! rejects the whole input before any pair is looked at.
//!
//! Typed deserialization ([`from_str`](crate::from_str)) runs on top of the
//! finished tree through [`ValueDeserializer`].

mod coerce;
mod decode;
pub(crate) mod key_path;
mod value_de;

use std::borrow::Cow;

pub use decode::{decode, interpret_numeric_entities};
pub use value_de::ValueDeserializer;

use crate::config::{Charset, ParseOptions};
use crate::error::{Error, Result};
use crate::value::{ParsedQuery, QueryValue};

use key_path::Assign;

/// Parse `input` into a [`ParsedQuery`].
///
/// Fails only when the number of pairs exceeds
/// [`ParseOptions::parameter_limit`].
pub fn parse(input: &str, options: &ParseOptions) -> Result<ParsedQuery> {
    let mut query = input;
    if options.ignore_query_prefix {
        query = query.strip_prefix('?').unwrap_or(query);
    }

    let mut result = ParsedQuery::new();
    if query.is_empty() {
        return Ok(result);
    }

    let mut pairs: Vec<&str> = if options.delimiter.is_empty() {
        vec![query]
    } else {
        query.split(options.delimiter.as_str()).collect()
    };

    let mut charset = options.charset;
    if options.charset_sentinel {
        if let Some((pos, sentinel)) = pairs.iter().enumerate().find_map(|(pos, pair)| {
            [Charset::Utf8, Charset::Iso88591]
                .into_iter()
                .find(|c| c.sentinel() == *pair)
                .map(|c| (pos, c))
        }) {
            charset = sentinel;
            pairs.remove(pos);
        }
    }

    if pairs.len() > options.parameter_limit {
        tracing::debug!(
            pairs = pairs.len(),
            limit = options.parameter_limit,
            "query string rejected by parameter limit"
        );
        return Err(Error::ParameterLimitExceeded {
            limit: options.parameter_limit,
        });
    }

    let mut rules = Assign::new(
        options.depth,
        options.duplicates,
        options.allow_prototypes || options.plain_objects,
    );

    for pair in pairs.into_iter().filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = match pair.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (pair, None),
        };

        let key = decode_component(raw_key, options, charset);
        let mut value = match raw_value {
            Some(raw) => {
                let text = decode_component(raw, options, charset);
                if options.interpret_numeric_entities && charset == Charset::Iso88591 {
                    QueryValue::String(interpret_numeric_entities(&text).into_owned())
                } else {
                    QueryValue::String(text.into_owned())
                }
            }
            None if options.strict_null_handling => QueryValue::Null,
            None => QueryValue::String(String::new()),
        };

        if options.coercion.any() {
            value = coerce::coerce(value, &options.coercion);
        }

        let mut key: &str = &key;
        if options.parse_arrays {
            let format = options.array_format;
            let marked = format.strip_marker(key);
            if let Some(stripped) = marked {
                key = stripped;
            }
            if format.is_joined() {
                value = format.split_value(value, &options.array_format_separator);
            }
            if marked.is_some() && !matches!(value, QueryValue::Array(_)) {
                value = QueryValue::Array(vec![value]);
            }
        }

        let path = key_path::split(key, options.allow_dots);
        rules.assign(&mut result, &path, value);
    }

    Ok(result)
}

fn decode_component<'a>(text: &'a str, options: &ParseOptions, charset: Charset) -> Cow<'a, str> {
    if !options.decode {
        return Cow::Borrowed(text);
    }
    match &options.decoder {
        Some(custom) => {
            let default = |s: &str| decode(s, charset).into_owned();
            Cow::Owned(custom(text, &default, charset))
        }
        None => decode(text, charset),
    }
}
