//! Hooks that run around [`parse`](crate::parse) and
//! [`stringify`](crate::stringify).
//!
//! A [`PluginPipeline`] is an ordinary value: build one, register plugins on
//! it and call its [`parse`](PluginPipeline::parse) and
//! [`stringify`](PluginPipeline::stringify) wrappers. Hooks run in
//! registration order.

use std::fmt;
use std::sync::{Arc, LazyLock};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;

use crate::config::{ParseOptions, StringifyOptions};
use crate::error::{Error, Result};
use crate::utils;
use crate::value::{ParsedQuery, QueryValue};

/// A set of optional hooks around the codec. Every hook defaults to
/// passing its input through.
pub trait Plugin: Send + Sync {
    /// Unique, non-empty name within a pipeline.
    fn name(&self) -> &str;

    fn before_parse(&self, input: String, _options: &ParseOptions) -> String {
        input
    }

    fn after_parse(&self, query: ParsedQuery, _options: &ParseOptions) -> ParsedQuery {
        query
    }

    fn before_stringify(&self, query: ParsedQuery, _options: &StringifyOptions) -> ParsedQuery {
        query
    }

    fn after_stringify(&self, output: String, _options: &StringifyOptions) -> String {
        output
    }
}

/// An ordered list of plugins.
#[derive(Clone, Default)]
pub struct PluginPipeline {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from `plugins`, failing on the first rejected one.
    pub fn with_plugins<I>(plugins: I) -> Result<Self>
    where
        I: IntoIterator<Item = Arc<dyn Plugin>>,
    {
        let mut pipeline = Self::new();
        for plugin in plugins {
            pipeline.register_arc(plugin)?;
        }
        Ok(pipeline)
    }

    /// Append a plugin. Empty and duplicate names are rejected.
    pub fn register(&mut self, plugin: impl Plugin + 'static) -> Result<&mut Self> {
        self.register_arc(Arc::new(plugin))
    }

    pub fn register_arc(&mut self, plugin: Arc<dyn Plugin>) -> Result<&mut Self> {
        let name = plugin.name();
        if name.is_empty() {
            return Err(Error::Plugin("Plugin must have a name".to_owned()));
        }
        if self.has(name) {
            return Err(Error::Plugin(format!("Plugin \"{name}\" is already registered")));
        }
        tracing::debug!(plugin = name, "registered plugin");
        self.plugins.push(plugin);
        Ok(self)
    }

    /// Remove the named plugin, reporting whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name() != name);
        let removed = self.plugins.len() != before;
        if removed {
            tracing::debug!(plugin = name, "unregistered plugin");
        }
        removed
    }

    pub fn has(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn clear(&mut self) {
        self.plugins.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn apply_before_parse(&self, input: String, options: &ParseOptions) -> String {
        self.plugins
            .iter()
            .fold(input, |input, p| p.before_parse(input, options))
    }

    pub fn apply_after_parse(&self, query: ParsedQuery, options: &ParseOptions) -> ParsedQuery {
        self.plugins
            .iter()
            .fold(query, |query, p| p.after_parse(query, options))
    }

    pub fn apply_before_stringify(
        &self,
        query: ParsedQuery,
        options: &StringifyOptions,
    ) -> ParsedQuery {
        self.plugins
            .iter()
            .fold(query, |query, p| p.before_stringify(query, options))
    }

    pub fn apply_after_stringify(&self, output: String, options: &StringifyOptions) -> String {
        self.plugins
            .iter()
            .fold(output, |output, p| p.after_stringify(output, options))
    }

    /// `before_parse` hooks, the parser, then `after_parse` hooks.
    pub fn parse(&self, input: &str, options: &ParseOptions) -> Result<ParsedQuery> {
        let input = self.apply_before_parse(input.to_owned(), options);
        let query = options.parse(&input)?;
        Ok(self.apply_after_parse(query, options))
    }

    /// `before_stringify` hooks, the stringifier, then `after_stringify` hooks.
    pub fn stringify(&self, query: ParsedQuery, options: &StringifyOptions) -> String {
        let query = self.apply_before_stringify(query, options);
        let output = options.stringify(&QueryValue::Object(query));
        self.apply_after_stringify(output, options)
    }
}

impl fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Adds `_timestamp` (epoch milliseconds) before stringifying.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimestampPlugin;

impl Plugin for TimestampPlugin {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn before_stringify(&self, mut query: ParsedQuery, _: &StringifyOptions) -> ParsedQuery {
        let now = chrono::Utc::now().timestamp_millis();
        query.insert("_timestamp".to_owned(), QueryValue::from(now));
        query
    }
}

/// Orders top-level keys lexically before stringifying.
#[derive(Clone, Copy, Debug, Default)]
pub struct SortKeysPlugin;

impl Plugin for SortKeysPlugin {
    fn name(&self) -> &str {
        "sortKeys"
    }

    fn before_stringify(&self, mut query: ParsedQuery, _: &StringifyOptions) -> ParsedQuery {
        query.sort_keys();
        query
    }
}

/// Lowercases top-level keys in both directions. Keys that collide after
/// lowercasing keep the last value.
#[derive(Clone, Copy, Debug, Default)]
pub struct LowercaseKeysPlugin;

impl LowercaseKeysPlugin {
    fn lowercase(query: ParsedQuery) -> ParsedQuery {
        query
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect()
    }
}

impl Plugin for LowercaseKeysPlugin {
    fn name(&self) -> &str {
        "lowercaseKeys"
    }

    fn after_parse(&self, query: ParsedQuery, _: &ParseOptions) -> ParsedQuery {
        Self::lowercase(query)
    }

    fn before_stringify(&self, query: ParsedQuery, _: &StringifyOptions) -> ParsedQuery {
        Self::lowercase(query)
    }
}

/// Drops top-level entries that are empty strings, nullish or empty arrays.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterEmptyPlugin;

impl Plugin for FilterEmptyPlugin {
    fn name(&self) -> &str {
        "filterEmpty"
    }

    fn before_stringify(&self, mut query: ParsedQuery, _: &StringifyOptions) -> ParsedQuery {
        query.retain(|_, v| match v {
            QueryValue::String(s) => !s.is_empty(),
            QueryValue::Array(items) => !items.is_empty(),
            other => !other.is_nullish(),
        });
        query
    }
}

const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Base64-wraps the whole query string.
///
/// Input that does not round-trip through base64 as UTF-8 text is parsed
/// as-is, so plain query strings still work.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Plugin;

impl Plugin for Base64Plugin {
    fn name(&self) -> &str {
        "base64"
    }

    fn before_parse(&self, input: String, _: &ParseOptions) -> String {
        let Ok(bytes) = BASE64.decode(input.as_bytes()) else {
            return input;
        };
        let Ok(decoded) = String::from_utf8(bytes) else {
            return input;
        };
        let reencoded = BASE64.encode(decoded.as_bytes());
        if reencoded.trim_end_matches('=') == input.trim_end_matches('=') {
            decoded
        } else {
            input
        }
    }

    fn after_stringify(&self, output: String, _: &StringifyOptions) -> String {
        BASE64.encode(output.as_bytes())
    }
}

static ENCODED_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%20|%2520|\+").expect("valid space pattern"));

/// Un-escapes spaces and common URL punctuation in the output for
/// readability. The result is no longer guaranteed to parse back to the
/// same value.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompressPlugin;

impl Plugin for CompressPlugin {
    fn name(&self) -> &str {
        "compress"
    }

    fn after_stringify(&self, output: String, _: &StringifyOptions) -> String {
        ENCODED_SPACE
            .replace_all(&output, " ")
            .replace("%2F", "/")
            .replace("%3A", ":")
            .replace("%3D", "=")
            .replace("%26", "&")
            .replace("%3F", "?")
    }
}

/// Trims string leaves and turns `true`, `false`, `null`, `undefined` and
/// canonical number text into typed values.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizePlugin;

impl NormalizePlugin {
    fn normalize(value: QueryValue) -> QueryValue {
        match value {
            QueryValue::String(s) => {
                let trimmed = s.trim();
                match trimmed {
                    "true" => QueryValue::Bool(true),
                    "false" => QueryValue::Bool(false),
                    "null" => QueryValue::Null,
                    "undefined" => QueryValue::Undefined,
                    _ => {
                        let n = utils::string_to_number(trimmed);
                        if !n.is_nan() && utils::number_to_string(n) == trimmed {
                            QueryValue::Number(n)
                        } else {
                            QueryValue::String(trimmed.to_owned())
                        }
                    }
                }
            }
            QueryValue::Array(items) => {
                QueryValue::Array(items.into_iter().map(Self::normalize).collect())
            }
            QueryValue::Object(map) => QueryValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::normalize(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}

impl Plugin for NormalizePlugin {
    fn name(&self) -> &str {
        "normalize"
    }

    fn after_parse(&self, query: ParsedQuery, _: &ParseOptions) -> ParsedQuery {
        query
            .into_iter()
            .map(|(k, v)| (k, Self::normalize(v)))
            .collect()
    }
}

type StringHook<O> = Arc<dyn Fn(String, &O) -> String + Send + Sync>;
type QueryHook<O> = Arc<dyn Fn(ParsedQuery, &O) -> ParsedQuery + Send + Sync>;

/// A plugin assembled from closures.
///
/// ```
/// use querykit::plugins::{FnPlugin, PluginPipeline};
/// use querykit::{ParseOptions, QueryValue};
///
/// let mut pipeline = PluginPipeline::new();
/// pipeline
///     .register(FnPlugin::new("strip-hash").before_parse(|s, _| s.replace('#', "")))
///     .unwrap();
/// let query = pipeline.parse("a=1#", &ParseOptions::default()).unwrap();
/// assert_eq!(query["a"], QueryValue::from("1"));
/// ```
#[derive(Clone)]
pub struct FnPlugin {
    name: String,
    before_parse: Option<StringHook<ParseOptions>>,
    after_parse: Option<QueryHook<ParseOptions>>,
    before_stringify: Option<QueryHook<StringifyOptions>>,
    after_stringify: Option<StringHook<StringifyOptions>>,
}

impl FnPlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            before_parse: None,
            after_parse: None,
            before_stringify: None,
            after_stringify: None,
        }
    }

    pub fn before_parse<F>(mut self, hook: F) -> Self
    where
        F: Fn(String, &ParseOptions) -> String + Send + Sync + 'static,
    {
        self.before_parse = Some(Arc::new(hook));
        self
    }

    pub fn after_parse<F>(mut self, hook: F) -> Self
    where
        F: Fn(ParsedQuery, &ParseOptions) -> ParsedQuery + Send + Sync + 'static,
    {
        self.after_parse = Some(Arc::new(hook));
        self
    }

    pub fn before_stringify<F>(mut self, hook: F) -> Self
    where
        F: Fn(ParsedQuery, &StringifyOptions) -> ParsedQuery + Send + Sync + 'static,
    {
        self.before_stringify = Some(Arc::new(hook));
        self
    }

    pub fn after_stringify<F>(mut self, hook: F) -> Self
    where
        F: Fn(String, &StringifyOptions) -> String + Send + Sync + 'static,
    {
        self.after_stringify = Some(Arc::new(hook));
        self
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn before_parse(&self, input: String, options: &ParseOptions) -> String {
        match &self.before_parse {
            Some(hook) => hook(input, options),
            None => input,
        }
    }

    fn after_parse(&self, query: ParsedQuery, options: &ParseOptions) -> ParsedQuery {
        match &self.after_parse {
            Some(hook) => hook(query, options),
            None => query,
        }
    }

    fn before_stringify(&self, query: ParsedQuery, options: &StringifyOptions) -> ParsedQuery {
        match &self.before_stringify {
            Some(hook) => hook(query, options),
            None => query,
        }
    }

    fn after_stringify(&self, output: String, options: &StringifyOptions) -> String {
        match &self.after_stringify {
            Some(hook) => hook(output, options),
            None => output,
        }
    }
}

impl fmt::Debug for FnPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPlugin")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn names_must_be_unique_and_non_empty() {
        let mut pipeline = PluginPipeline::new();
        pipeline.register(SortKeysPlugin).unwrap();
        assert!(matches!(pipeline.register(SortKeysPlugin), Err(Error::Plugin(_))));
        assert!(matches!(pipeline.register(FnPlugin::new("")), Err(Error::Plugin(_))));
        assert_eq!(pipeline.names(), ["sortKeys"]);
        assert!(pipeline.unregister("sortKeys"));
        assert!(!pipeline.unregister("sortKeys"));
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut pipeline = PluginPipeline::new();
        pipeline
            .register(FnPlugin::new("a").after_stringify(|s, _| format!("{s}a")))
            .unwrap()
            .register(FnPlugin::new("b").after_stringify(|s, _| format!("{s}b")))
            .unwrap();
        assert_eq!(
            pipeline.apply_after_stringify("x".to_owned(), &StringifyOptions::default()),
            "xab"
        );
    }

    #[test]
    fn base64_accepts_plain_input() {
        let options = ParseOptions::default();
        assert_eq!(Base64Plugin.before_parse("a=1".to_owned(), &options), "a=1");
        assert_eq!(Base64Plugin.before_parse("YT0x".to_owned(), &options), "a=1");
    }

    #[test]
    fn compress_unescapes() {
        let out = CompressPlugin.after_stringify(
            "u=http%3A%2F%2Fx%20y".to_owned(),
            &StringifyOptions::default(),
        );
        assert_eq!(out, "u=http://x y");
    }

    #[test]
    fn normalize_types_leaves() {
        let normalized = NormalizePlugin::normalize(QueryValue::from(vec![" 42 ", "true", "1e3", "x "]));
        assert_eq!(
            normalized,
            QueryValue::Array(vec![
                QueryValue::from(42),
                QueryValue::Bool(true),
                QueryValue::from("1e3"),
                QueryValue::from("x"),
            ])
        );
    }
}
