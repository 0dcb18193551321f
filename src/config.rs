use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de;

use crate::error::Result;
use crate::value::{ParsedQuery, QueryValue};

/// A custom percent-decoder: receives the raw text, the built-in decoder for
/// the active charset and the charset itself.
pub type Decoder = Arc<dyn Fn(&str, &dyn Fn(&str) -> String, Charset) -> String + Send + Sync>;

/// A custom percent-encoder, applied to keys and values. Receives the raw
/// text, the built-in encoder for the active format and the charset.
pub type Encoder = Arc<dyn Fn(&str, &dyn Fn(&str) -> String, Charset) -> String + Send + Sync>;

/// Renders a date leaf. The default is ISO-8601 with milliseconds.
pub type SerializeDate = Arc<dyn Fn(&DateTime<Utc>) -> String + Send + Sync>;

/// How sequences are written to, and read from, the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ArrayFormat {
    /// `a=1&a=2`
    #[default]
    Repeat,
    /// `a[]=1&a[]=2`
    Brackets,
    /// `a[0]=1&a[1]=2`
    Indices,
    /// `a=1,2`
    Comma,
    /// `a=1<sep>2` with the configured separator.
    Separator,
    /// `a=["1","2"]`, percent-encoded.
    Json,
    /// `a[]=1<sep>2` with the configured separator.
    BracketSeparator,
}

/// What to do when the same key path is assigned twice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Duplicates {
    /// Collect every value into a sequence.
    #[default]
    Combine,
    /// Keep the first value seen.
    First,
    /// Keep the last value seen.
    Last,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Charset {
    #[default]
    Utf8,
    Iso88591,
}

impl Charset {
    /// The `utf8=...` pair announcing this charset.
    pub fn sentinel(self) -> &'static str {
        match self {
            Charset::Utf8 => "utf8=%E2%9C%93",
            Charset::Iso88591 => "utf8=%26%2310003%3B",
        }
    }
}

/// Percent-encoding flavour used when writing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    /// Spaces as `%20`; only `A-Z a-z 0-9 - . _ ~` left bare.
    #[default]
    Rfc3986,
    /// Spaces as `+`; additionally leaves `! * ' ( )` bare.
    Rfc1738,
}

/// Which scalar conversions the parser applies to decoded values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeCoercion {
    pub numbers: bool,
    pub booleans: bool,
    pub dates: bool,
}

impl TypeCoercion {
    /// Every conversion switched on.
    pub const fn all() -> Self {
        Self {
            numbers: true,
            booleans: true,
            dates: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            numbers: false,
            booleans: false,
            dates: false,
        }
    }

    pub(crate) fn any(&self) -> bool {
        self.numbers || self.booleans || self.dates
    }
}

/// Ordering applied to emitted pairs, compared on their key portion.
#[derive(Clone)]
pub enum Sort {
    Lexical,
    Custom(Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>),
}

impl Sort {
    pub fn custom<F>(compare: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        Sort::Custom(Arc::new(compare))
    }

    pub(crate) fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            Sort::Lexical => a.cmp(b),
            Sort::Custom(compare) => compare(a, b),
        }
    }
}

impl fmt::Debug for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Lexical => f.write_str("Lexical"),
            Sort::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Restricts what the stringifier writes.
#[derive(Clone)]
pub enum Filter {
    /// Only these root keys, in this order.
    Keys(Vec<String>),
    /// Called with the raw key path and the value at every node (the root is
    /// visited with an empty path). `None` drops the node and everything
    /// below it, `Some` replaces the value that gets written.
    Function(Arc<dyn Fn(&str, &QueryValue) -> Option<QueryValue> + Send + Sync>),
}

impl Filter {
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Filter::Keys(keys.into_iter().map(Into::into).collect())
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&str, &QueryValue) -> Option<QueryValue> + Send + Sync + 'static,
    {
        Filter::Function(Arc::new(f))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            Filter::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// Options for reading a query string.
///
/// The defaults accept what browsers send: `&`-separated pairs, up to five
/// levels of bracket nesting and at most 1000 pairs.
///
/// ```
/// use querykit::{ArrayFormat, ParseOptions};
///
/// let options = ParseOptions::new().array_format(ArrayFormat::Comma).depth(2);
/// let query = options.parse("tags=a,b&user[name]=jo").unwrap();
/// assert_eq!(query["tags"], querykit::QueryValue::from(vec!["a", "b"]));
/// ```
#[derive(Clone)]
pub struct ParseOptions {
    pub(crate) delimiter: String,
    pub(crate) depth: usize,
    pub(crate) array_format: ArrayFormat,
    pub(crate) array_format_separator: String,
    pub(crate) decode: bool,
    pub(crate) decoder: Option<Decoder>,
    pub(crate) charset: Charset,
    pub(crate) charset_sentinel: bool,
    pub(crate) interpret_numeric_entities: bool,
    pub(crate) parameter_limit: usize,
    pub(crate) parse_arrays: bool,
    pub(crate) allow_dots: bool,
    pub(crate) plain_objects: bool,
    pub(crate) allow_prototypes: bool,
    pub(crate) strict_null_handling: bool,
    pub(crate) ignore_query_prefix: bool,
    pub(crate) duplicates: Duplicates,
    pub(crate) coercion: TypeCoercion,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self {
            delimiter: "&".to_owned(),
            depth: 5,
            array_format: ArrayFormat::Repeat,
            array_format_separator: ",".to_owned(),
            decode: true,
            decoder: None,
            charset: Charset::Utf8,
            charset_sentinel: false,
            interpret_numeric_entities: false,
            parameter_limit: 1000,
            parse_arrays: true,
            allow_dots: false,
            plain_objects: false,
            allow_prototypes: false,
            strict_null_handling: false,
            ignore_query_prefix: false,
            duplicates: Duplicates::Combine,
            coercion: TypeCoercion::none(),
        }
    }

    /// Pair separator, matched verbatim. Default `&`.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Maximum number of nested containers created for one key. Segments
    /// past the limit abandon the assignment. Default 5.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    pub fn array_format(mut self, array_format: ArrayFormat) -> Self {
        self.array_format = array_format;
        self
    }

    /// Separator for [`ArrayFormat::Separator`] and
    /// [`ArrayFormat::BracketSeparator`]. Default `,`.
    pub fn array_format_separator(mut self, separator: impl Into<String>) -> Self {
        self.array_format_separator = separator.into();
        self
    }

    /// Set to `false` to keep keys and values exactly as written.
    pub fn decode(mut self, decode: bool) -> Self {
        self.decode = decode;
        self
    }

    pub fn decoder<F>(mut self, decoder: F) -> Self
    where
        F: Fn(&str, &dyn Fn(&str) -> String, Charset) -> String + Send + Sync + 'static,
    {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Let a leading `utf8=...` pair pick the charset. The pair itself is
    /// removed from the result.
    pub fn charset_sentinel(mut self, charset_sentinel: bool) -> Self {
        self.charset_sentinel = charset_sentinel;
        self
    }

    /// Replace `&#N;` entities in values. Only honoured under
    /// [`Charset::Iso88591`].
    pub fn interpret_numeric_entities(mut self, interpret: bool) -> Self {
        self.interpret_numeric_entities = interpret;
        self
    }

    /// Maximum number of pairs accepted before parsing fails with
    /// [`Error::ParameterLimitExceeded`](crate::Error::ParameterLimitExceeded).
    /// Default 1000.
    pub fn parameter_limit(mut self, limit: usize) -> Self {
        self.parameter_limit = limit;
        self
    }

    /// When `false`, array markers and separators are left in place.
    pub fn parse_arrays(mut self, parse_arrays: bool) -> Self {
        self.parse_arrays = parse_arrays;
        self
    }

    /// Read `a.b.c` as a nested path instead of bracket notation.
    pub fn allow_dots(mut self, allow_dots: bool) -> Self {
        self.allow_dots = allow_dots;
        self
    }

    /// Build results as plain maps with no reserved names; implies
    /// [`allow_prototypes`](Self::allow_prototypes).
    pub fn plain_objects(mut self, plain_objects: bool) -> Self {
        self.plain_objects = plain_objects;
        self
    }

    /// Accept reserved key names (`__proto__`, `constructor`, `prototype`).
    pub fn allow_prototypes(mut self, allow_prototypes: bool) -> Self {
        self.allow_prototypes = allow_prototypes;
        self
    }

    /// A key without `=` parses to `Null` instead of an empty string.
    pub fn strict_null_handling(mut self, strict: bool) -> Self {
        self.strict_null_handling = strict;
        self
    }

    pub fn ignore_query_prefix(mut self, ignore: bool) -> Self {
        self.ignore_query_prefix = ignore;
        self
    }

    pub fn duplicates(mut self, duplicates: Duplicates) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn parse_numbers(mut self, enabled: bool) -> Self {
        self.coercion.numbers = enabled;
        self
    }

    pub fn parse_booleans(mut self, enabled: bool) -> Self {
        self.coercion.booleans = enabled;
        self
    }

    pub fn parse_dates(mut self, enabled: bool) -> Self {
        self.coercion.dates = enabled;
        self
    }

    /// Replace all three coercion switches at once.
    pub fn type_coercion(mut self, coercion: TypeCoercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Parse a query string with these options.
    pub fn parse(&self, input: &str) -> Result<ParsedQuery> {
        crate::de::parse(input, self)
    }

    /// Deserializes a typed value from a query string with these options.
    pub fn deserialize_str<T: de::DeserializeOwned>(&self, input: &str) -> Result<T> {
        let parsed = self.parse(input)?;
        T::deserialize(crate::de::ValueDeserializer::new(QueryValue::Object(parsed)))
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("delimiter", &self.delimiter)
            .field("depth", &self.depth)
            .field("array_format", &self.array_format)
            .field("array_format_separator", &self.array_format_separator)
            .field("decode", &self.decode)
            .field("decoder", &self.decoder.as_ref().map(|_| ".."))
            .field("charset", &self.charset)
            .field("charset_sentinel", &self.charset_sentinel)
            .field("interpret_numeric_entities", &self.interpret_numeric_entities)
            .field("parameter_limit", &self.parameter_limit)
            .field("parse_arrays", &self.parse_arrays)
            .field("allow_dots", &self.allow_dots)
            .field("plain_objects", &self.plain_objects)
            .field("allow_prototypes", &self.allow_prototypes)
            .field("strict_null_handling", &self.strict_null_handling)
            .field("ignore_query_prefix", &self.ignore_query_prefix)
            .field("duplicates", &self.duplicates)
            .field("coercion", &self.coercion)
            .finish()
    }
}

/// Options for writing a query string.
///
/// ```
/// use querykit::{ArrayFormat, QueryValue, StringifyOptions};
///
/// let value = QueryValue::from_iter([("a", vec!["x", "y"])]);
/// let options = StringifyOptions::new().array_format(ArrayFormat::Brackets);
/// assert_eq!(options.stringify(&value), "a[]=x&a[]=y");
/// ```
#[derive(Clone)]
pub struct StringifyOptions {
    pub(crate) delimiter: String,
    pub(crate) strict_null_handling: bool,
    pub(crate) skip_nulls: bool,
    pub(crate) encode: bool,
    pub(crate) encoder: Option<Encoder>,
    pub(crate) filter: Option<Filter>,
    pub(crate) array_format: ArrayFormat,
    pub(crate) array_format_separator: String,
    pub(crate) sort: Option<Sort>,
    pub(crate) serialize_date: Option<SerializeDate>,
    pub(crate) format: Format,
    pub(crate) encode_values_only: bool,
    pub(crate) add_query_prefix: bool,
    pub(crate) allow_dots: bool,
    pub(crate) charset: Charset,
    pub(crate) charset_sentinel: bool,
}

impl Default for StringifyOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl StringifyOptions {
    pub fn new() -> Self {
        Self {
            delimiter: "&".to_owned(),
            strict_null_handling: false,
            skip_nulls: false,
            encode: true,
            encoder: None,
            filter: None,
            array_format: ArrayFormat::Repeat,
            array_format_separator: ",".to_owned(),
            sort: None,
            serialize_date: None,
            format: Format::Rfc3986,
            encode_values_only: false,
            add_query_prefix: false,
            allow_dots: false,
            charset: Charset::Utf8,
            charset_sentinel: false,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Write `Null` as a bare key (`a`) instead of `a=`.
    pub fn strict_null_handling(mut self, strict: bool) -> Self {
        self.strict_null_handling = strict;
        self
    }

    /// Leave out `Null` and `Undefined` values entirely, unless
    /// [`strict_null_handling`](Self::strict_null_handling) asks for a bare key.
    /// Empty sequences are dropped either way.
    pub fn skip_nulls(mut self, skip: bool) -> Self {
        self.skip_nulls = skip;
        self
    }

    /// Set to `false` to write keys and values without percent-encoding.
    pub fn encode(mut self, encode: bool) -> Self {
        self.encode = encode;
        self
    }

    pub fn encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&str, &dyn Fn(&str) -> String, Charset) -> String + Send + Sync + 'static,
    {
        self.encoder = Some(Arc::new(encoder));
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn array_format(mut self, array_format: ArrayFormat) -> Self {
        self.array_format = array_format;
        self
    }

    pub fn array_format_separator(mut self, separator: impl Into<String>) -> Self {
        self.array_format_separator = separator.into();
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn serialize_date<F>(mut self, serialize: F) -> Self
    where
        F: Fn(&DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        self.serialize_date = Some(Arc::new(serialize));
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn encode_values_only(mut self, values_only: bool) -> Self {
        self.encode_values_only = values_only;
        self
    }

    pub fn add_query_prefix(mut self, prefix: bool) -> Self {
        self.add_query_prefix = prefix;
        self
    }

    /// Write nested keys as `a.b` instead of `a[b]`.
    pub fn allow_dots(mut self, allow_dots: bool) -> Self {
        self.allow_dots = allow_dots;
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Prefix the output with the `utf8=...` pair for the active charset.
    pub fn charset_sentinel(mut self, sentinel: bool) -> Self {
        self.charset_sentinel = sentinel;
        self
    }

    /// Stringify a value with these options.
    pub fn stringify(&self, value: &QueryValue) -> String {
        crate::ser::stringify(value, self)
    }

    /// Serializes any `Serialize` value into a query string with these options.
    pub fn serialize_string<T: serde::Serialize>(&self, input: &T) -> Result<String> {
        let value = QueryValue::from(serde_json::to_value(input)?);
        Ok(self.stringify(&value))
    }
}

impl fmt::Debug for StringifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringifyOptions")
            .field("delimiter", &self.delimiter)
            .field("strict_null_handling", &self.strict_null_handling)
            .field("skip_nulls", &self.skip_nulls)
            .field("encode", &self.encode)
            .field("encoder", &self.encoder.as_ref().map(|_| ".."))
            .field("filter", &self.filter)
            .field("array_format", &self.array_format)
            .field("array_format_separator", &self.array_format_separator)
            .field("sort", &self.sort)
            .field("serialize_date", &self.serialize_date.as_ref().map(|_| ".."))
            .field("format", &self.format)
            .field("encode_values_only", &self.encode_values_only)
            .field("add_query_prefix", &self.add_query_prefix)
            .field("allow_dots", &self.allow_dots)
            .field("charset", &self.charset)
            .field("charset_sentinel", &self.charset_sentinel)
            .finish()
    }
}
