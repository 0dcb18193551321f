//! Nested querystrings: parse, stringify and validate.
//!
//! Querystrings are not formally defined and loosely take the form of
//! _nested_ urlencoded queries. This library reads and writes the syntax of
//! [qs](https://github.com/ljharb/qs): bracket (`a[b][c]=1`) and dot
//! (`a.b.c=1`) key paths, several array conventions, duplicate-key
//! policies, optional scalar coercion and the ISO-8859-1 charset.
//!
//! ## Values
//!
//! Parsing produces a [`ParsedQuery`], an insertion-ordered map of
//! [`QueryValue`]s. Stringifying walks any [`QueryValue`] tree. Both sides
//! are configured with a plain options struct ([`ParseOptions`],
//! [`StringifyOptions`]) built through chained calls.
//!
//! ```
//! use querykit::{ParseOptions, QueryValue};
//!
//! let query = querykit::parse("user[name]=Acme&user[tags][]=a&user[tags][]=b").unwrap();
//! assert_eq!(
//!     querykit::stringify(&QueryValue::from(query)),
//!     "user[name]=Acme&user[tags]=a&user[tags]=b"
//! );
//!
//! let options = ParseOptions::new().parse_numbers(true);
//! let query = options.parse("page=2").unwrap();
//! assert_eq!(query["page"], QueryValue::from(2));
//! ```
//!
//! ## Typed values
//!
//! With serde, query strings can be read into and written from your own
//! types. String leaves are parsed on demand, so `id=42` fills a `u8`.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Deserialize, Serialize)]
//! struct Address {
//!     city: String,
//!     postcode: String,
//! }
//!
//! #[derive(Debug, PartialEq, Deserialize, Serialize)]
//! struct QueryParams {
//!     id: u8,
//!     name: String,
//!     address: Address,
//!     user_ids: Vec<u8>,
//! }
//!
//! let params: QueryParams = querykit::from_str(
//!     "name=Acme&id=42&address[postcode]=12345&address[city]=Carrot+City&user_ids[0]=1&user_ids[1]=2",
//! )
//! .unwrap();
//! assert_eq!(params.address.city, "Carrot City");
//! assert_eq!(params.user_ids, [1, 2]);
//!
//! let encoded = querykit::to_string(&params).unwrap();
//! assert_eq!(
//!     encoded,
//!     "id=42&name=Acme&address[city]=Carrot%20City&address[postcode]=12345&user_ids=1&user_ids=2"
//! );
//! ```
//!
//! ## Validation
//!
//! The [`schema`] module checks and coerces parsed values; see its docs.
//! The [`builder`], [`plugins`] and [`security`] modules build on the codec
//! without changing it.

mod array_format;
pub mod builder;
mod config;
mod de;
mod error;
mod map;
pub mod plugins;
pub mod schema;
pub mod security;
mod ser;
mod utils;
mod value;

#[doc(inline)]
pub use array_format::combine;
#[doc(inline)]
pub use builder::QueryBuilder;
#[doc(inline)]
pub use config::{
    ArrayFormat, Charset, Decoder, Duplicates, Encoder, Filter, Format, ParseOptions,
    SerializeDate, Sort, StringifyOptions, TypeCoercion,
};
#[doc(inline)]
pub use de::{ValueDeserializer, decode, interpret_numeric_entities};
pub use error::{Error, Result, ValidationError};
pub use map::Map;
#[doc(inline)]
pub use ser::encode;
pub use value::{ParsedQuery, QueryValue};

/// Parse a query string with default options.
pub fn parse(input: &str) -> Result<ParsedQuery> {
    de::parse(input, &ParseOptions::default())
}

/// Stringify a value with default options.
pub fn stringify(value: &QueryValue) -> String {
    ser::stringify(value, &StringifyOptions::default())
}

/// A URL split at its first `?`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedUrl {
    pub base_url: String,
    pub query: ParsedQuery,
}

/// Split `url` at the first `?` and parse the query part with default
/// options.
pub fn parse_url(url: &str) -> Result<ParsedUrl> {
    parse_url_with(url, &ParseOptions::default())
}

/// Like [`parse_url`], with explicit options.
///
/// ```
/// use querykit::{ParseOptions, QueryValue};
///
/// let url = querykit::parse_url_with("/search?q=rust", &ParseOptions::new()).unwrap();
/// assert_eq!(url.base_url, "/search");
/// assert_eq!(url.query["q"], QueryValue::from("rust"));
/// ```
pub fn parse_url_with(url: &str, options: &ParseOptions) -> Result<ParsedUrl> {
    match url.split_once('?') {
        Some((base, query)) => Ok(ParsedUrl {
            base_url: base.to_owned(),
            query: de::parse(query, options)?,
        }),
        None => Ok(ParsedUrl {
            base_url: url.to_owned(),
            query: ParsedQuery::new(),
        }),
    }
}

/// Append the stringified `query` to `url`, after `?` or, when `url`
/// already has a query, after `&`.
///
/// An empty `url` gives `""`; an empty query gives `url` unchanged.
pub fn stringify_url(url: &str, query: &QueryValue, options: &StringifyOptions) -> String {
    if url.is_empty() {
        return String::new();
    }
    let encoded = ser::stringify(query, options);
    if encoded.is_empty() {
        return url.to_owned();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{encoded}")
}

/// Deserializes a querystring from a `&str` with default options.
pub fn from_str<T: serde::de::DeserializeOwned>(input: &str) -> Result<T> {
    ParseOptions::default().deserialize_str(input)
}

/// Serializes a value into a querystring with default options.
pub fn to_string<T: serde::Serialize>(input: &T) -> Result<String> {
    StringifyOptions::default().serialize_string(input)
}
