//! Fluent accumulation of a query before it is written out.

use std::fmt;
use std::str::FromStr;

use crate::config::StringifyOptions;
use crate::error::{Error, Result};
use crate::map::Entry;
use crate::utils;
use crate::value::{ParsedQuery, QueryValue};

/// Collects query entries and writes them with a fixed set of
/// [`StringifyOptions`].
///
/// ```
/// use querykit::QueryBuilder;
///
/// let query = QueryBuilder::new()
///     .add("q", "rust")
///     .append("tag", "a")
///     .append("tag", "b")
///     .build();
/// assert_eq!(query, "q=rust&tag=a&tag=b");
/// ```
#[derive(Clone, Debug, Default)]
pub struct QueryBuilder {
    query: ParsedQuery,
    options: StringifyOptions,
    base_url: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing query.
    pub fn from_query(query: ParsedQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    /// Options used by [`build`](Self::build) and [`to_url`](Self::to_url).
    pub fn with_options(mut self, options: StringifyOptions) -> Self {
        self.options = options;
        self
    }

    /// Remember the part of `url` before `?` and merge its query into the
    /// builder.
    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        let parsed = crate::parse_url(url)?;
        utils::merge(&mut self.query, parsed.query);
        self.base_url = Some(parsed.base_url);
        Ok(self)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Insert or replace `key`.
    pub fn add(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Alias of [`add`](Self::add).
    pub fn set(self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.add(key, value)
    }

    pub fn add_multiple<K, V, I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<QueryValue>,
    {
        self.query
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Insert an array value; anything else is rejected.
    pub fn add_array(self, key: impl Into<String>, values: impl Into<QueryValue>) -> Result<Self> {
        match values.into() {
            values @ QueryValue::Array(_) => Ok(self.add(key, values)),
            _ => Err(Error::InvalidArgument("Values must be an array".to_owned())),
        }
    }

    /// Insert an object value; anything else is rejected.
    pub fn add_object(self, key: impl Into<String>, object: impl Into<QueryValue>) -> Result<Self> {
        match object.into() {
            object @ QueryValue::Object(_) => Ok(self.add(key, object)),
            _ => Err(Error::InvalidArgument("Value must be an object".to_owned())),
        }
    }

    /// Add a value to `key`, turning an existing scalar into an array.
    pub fn append(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        let value = value.into();
        match self.query.entry(key.into()) {
            Entry::Vacant(entry) => {
                entry.insert(value);
            }
            Entry::Occupied(mut entry) => match entry.get_mut() {
                QueryValue::Array(items) => items.push(value),
                existing => {
                    let previous = std::mem::take(existing);
                    *existing = QueryValue::Array(vec![previous, value]);
                }
            },
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.query.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.query.contains_key(key)
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.query.shift_remove(key);
        self
    }

    pub fn clear(mut self) -> Self {
        self.query.clear();
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.query.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &QueryValue> {
        self.query.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.query.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A new builder with the entries `predicate` accepts.
    pub fn filter(&self, mut predicate: impl FnMut(&str, &QueryValue) -> bool) -> QueryBuilder {
        let query = self
            .query
            .iter()
            .filter(|(k, v)| predicate(k, v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.derive(query)
    }

    /// A new builder with only the named keys, in the order given.
    pub fn pick<I, K>(&self, keys: I) -> QueryBuilder
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let query = keys
            .into_iter()
            .filter_map(|key| {
                self.query
                    .get_key_value(key.as_ref())
                    .map(|(k, v)| (k.clone(), v.clone()))
            })
            .collect();
        self.derive(query)
    }

    /// A new builder without the named keys.
    pub fn omit<I, K>(&self, keys: I) -> QueryBuilder
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut query = self.query.clone();
        for key in keys {
            query.shift_remove(key.as_ref());
        }
        self.derive(query)
    }

    fn derive(&self, query: ParsedQuery) -> QueryBuilder {
        QueryBuilder {
            query,
            options: self.options.clone(),
            base_url: self.base_url.clone(),
        }
    }

    /// Deep merge: objects merge key by key, arrays concatenate, and any
    /// other incoming value replaces the current one.
    pub fn merge(mut self, other: ParsedQuery) -> Self {
        utils::merge(&mut self.query, other);
        self
    }

    /// Parse `input` with default options and [`merge`](Self::merge) it.
    pub fn merge_str(self, input: &str) -> Result<Self> {
        let other = crate::parse(input)?;
        Ok(self.merge(other))
    }

    pub fn transform(mut self, transform: impl FnOnce(ParsedQuery) -> ParsedQuery) -> Self {
        self.query = transform(self.query);
        self
    }

    /// Run `validator` over the query; its error message becomes a
    /// [`Error::QueryValidation`].
    pub fn validate<F>(self, validator: F) -> Result<Self>
    where
        F: FnOnce(&ParsedQuery) -> std::result::Result<(), String>,
    {
        match validator(&self.query) {
            Ok(()) => Ok(self),
            Err(reason) => {
                tracing::debug!(%reason, "query validation failed");
                Err(Error::QueryValidation(reason))
            }
        }
    }

    pub fn when(self, condition: bool, then: impl FnOnce(Self) -> Self) -> Self {
        if condition { then(self) } else { self }
    }

    pub fn unless(self, condition: bool, then: impl FnOnce(Self) -> Self) -> Self {
        self.when(!condition, then)
    }

    /// Look at the builder without changing it.
    pub fn tap(self, inspect: impl FnOnce(&Self)) -> Self {
        inspect(&self);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }

    pub fn len(&self) -> usize {
        self.query.len()
    }

    pub fn to_query(&self) -> ParsedQuery {
        self.query.clone()
    }

    pub fn into_query(self) -> ParsedQuery {
        self.query
    }

    pub fn build(&self) -> String {
        self.build_with(&self.options)
    }

    pub fn build_with(&self, options: &StringifyOptions) -> String {
        crate::ser::stringify(&self.value(), options)
    }

    /// The query appended to the base URL.
    pub fn to_url(&self) -> Result<String> {
        let base_url = self.base_url.as_deref().ok_or(Error::MissingBaseUrl)?;
        Ok(self.to_url_with(base_url))
    }

    /// The query appended to `url` instead of the base URL.
    pub fn to_url_with(&self, url: &str) -> String {
        crate::stringify_url(url, &self.value(), &self.options)
    }

    fn value(&self) -> QueryValue {
        QueryValue::Object(self.query.clone())
    }
}

impl FromStr for QueryBuilder {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        Ok(Self::from_query(crate::parse(input)?))
    }
}

impl From<ParsedQuery> for QueryBuilder {
    fn from(query: ParsedQuery) -> Self {
        Self::from_query(query)
    }
}

impl<'a> IntoIterator for &'a QueryBuilder {
    type Item = (&'a String, &'a QueryValue);
    type IntoIter = indexmap::map::Iter<'a, String, QueryValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.query.iter()
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

impl Extend<(String, QueryValue)> for QueryBuilder {
    fn extend<T: IntoIterator<Item = (String, QueryValue)>>(&mut self, iter: T) {
        self.query.extend(iter);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_promotes_to_array() {
        let builder = QueryBuilder::new()
            .append("a", "1")
            .append("a", "2")
            .append("a", "3");
        assert_eq!(
            builder.get("a"),
            Some(&QueryValue::from(vec!["1", "2", "3"]))
        );
    }

    #[test]
    fn argument_guards() {
        assert!(matches!(
            QueryBuilder::new().add_array("a", "x"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            QueryBuilder::new().add_object("a", vec!["x"]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_maps_to_error() {
        let err = QueryBuilder::new()
            .validate(|q| if q.is_empty() { Err("empty".into()) } else { Ok(()) })
            .unwrap_err();
        assert_eq!(err.to_string(), "Query validation failed: empty");
    }

    #[test]
    fn base_url_is_split() {
        let builder = QueryBuilder::new()
            .with_base_url("https://x.dev/search?q=a")
            .unwrap()
            .add("page", 2);
        assert_eq!(builder.base_url(), Some("https://x.dev/search"));
        assert_eq!(builder.to_url().unwrap(), "https://x.dev/search?q=a&page=2");
        assert!(matches!(QueryBuilder::new().to_url(), Err(Error::MissingBaseUrl)));
    }
}
