//! Guards for untrusted query input: size and depth limits, reserved key
//! names, and markup scrubbing.
//!
//! None of this runs inside [`parse`](crate::parse); wrap the parser in a
//! [`SecureParser`] or call the helpers directly.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{ParseOptions, StringifyOptions};
use crate::de::key_path::RESERVED_KEYS;
use crate::error::{Error, Result};
use crate::utils;
use crate::value::{ParsedQuery, QueryValue, iso_string};

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("valid security pattern")
}

static XSS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<script[^>]*>.*?</script>",
        r"(?i)<iframe[^>]*>.*?</iframe>",
        r"(?i)javascript:",
        r"(?i)on\w+\s*=",
        r"(?i)<embed[^>]*>",
        r"(?i)<object[^>]*>",
        r"(?i)<link[^>]*>",
        r"(?i)<style[^>]*>.*?</style>",
        r"(?i)vbscript:",
        r"(?i)data:[^,]*,",
    ]
    .into_iter()
    .map(pattern)
    .collect()
});

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)<script[^>]*>(.*?)</script>"));

static REMOVED: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)<iframe[^>]*>.*?</iframe>",
        r"(?i)<embed[^>]*>",
        r"(?i)<object[^>]*>",
        r"(?i)<link[^>]*>",
        r"(?i)<style[^>]*>.*?</style>",
        r"(?i)javascript:",
        r"(?i)vbscript:",
        r"(?i)data:text/html",
        r"(?i)on\w+\s*=\s*[^>\s]*",
    ]
    .into_iter()
    .map(pattern)
    .collect()
});

static SQL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(union|select|insert|update|delete|drop|create|alter|exec|execute)\b",
        r"--|/\*|\*/",
        r"[';]",
    ]
    .into_iter()
    .map(pattern)
    .collect()
});

/// Scrub markup and script vectors from `input`, then HTML-escape what is
/// left.
///
/// Script tags keep their inner text; iframe, embed, object, link and
/// style tags are removed, as are `javascript:`, `vbscript:`,
/// `data:text/html` and inline event handlers. With `aggressive`, SQL
/// keywords, comment markers, quotes and semicolons are removed as well.
///
/// ```
/// use querykit::security::sanitize_input;
///
/// assert_eq!(
///     sanitize_input("<script>alert(1)</script>", false),
///     "alert(1)"
/// );
/// assert_eq!(sanitize_input("a<b", false), "a&lt;b");
/// ```
pub fn sanitize_input(input: &str, aggressive: bool) -> String {
    let mut sanitized = SCRIPT_TAG.replace_all(input, "$1").into_owned();
    for re in REMOVED.iter() {
        sanitized = re.replace_all(&sanitized, "").into_owned();
    }
    if aggressive {
        for re in SQL_PATTERNS.iter() {
            sanitized = re.replace_all(&sanitized, "").into_owned();
        }
    }

    let mut escaped = String::with_capacity(sanitized.len());
    for c in sanitized.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            '/' => escaped.push_str("&#x2F;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Number of object keys at every level. Array positions are not counted.
pub fn count_keys(query: &ParsedQuery) -> usize {
    query.values().map(|v| 1 + count_value_keys(v)).sum()
}

fn count_value_keys(value: &QueryValue) -> usize {
    match value {
        QueryValue::Object(map) => count_keys(map),
        QueryValue::Array(items) => items.iter().map(count_value_keys).sum(),
        _ => 0,
    }
}

/// Container nesting of the query; `{a: "1"}` has depth 1.
pub fn nesting_depth(query: &ParsedQuery) -> usize {
    query
        .values()
        .map(|v| utils::depth(v) + 1)
        .max()
        .unwrap_or(0)
}

/// True when any key at any level is `__proto__`, `constructor` or
/// `prototype`.
pub fn has_dangerous_keys(query: &ParsedQuery) -> bool {
    query
        .iter()
        .any(|(k, v)| RESERVED_KEYS.contains(&k.as_str()) || value_has_dangerous_keys(v))
}

fn value_has_dangerous_keys(value: &QueryValue) -> bool {
    match value {
        QueryValue::Object(map) => has_dangerous_keys(map),
        QueryValue::Array(items) => items.iter().any(value_has_dangerous_keys),
        _ => false,
    }
}

fn contains_xss(text: &str) -> bool {
    XSS_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Paths of string values (and keys, suffixed ` (key)`) that look like
/// script injection. Paths use dots between keys and `[i]` for indices.
pub fn detect_xss(query: &ParsedQuery) -> Vec<String> {
    let mut found = Vec::new();
    detect_in_object(query, "", &mut found);
    found
}

fn detect_in_object(map: &ParsedQuery, path: &str, found: &mut Vec<String>) {
    for (key, value) in map {
        let path = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}.{key}")
        };
        if contains_xss(key) {
            found.push(format!("{path} (key)"));
        }
        detect_in_value(value, &path, found);
    }
}

fn detect_in_value(value: &QueryValue, path: &str, found: &mut Vec<String>) {
    match value {
        QueryValue::String(s) if contains_xss(s) => found.push(path.to_owned()),
        QueryValue::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                detect_in_value(item, &format!("{path}[{i}]"), found);
            }
        }
        QueryValue::Object(map) => detect_in_object(map, path, found),
        _ => {}
    }
}

/// Limits and checks applied by [`validate_security`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecurityOptions {
    pub max_keys: usize,
    pub max_depth: usize,
    /// Skip the reserved key name check.
    pub allow_prototypes: bool,
    /// Scrub values before validating (where the caller supports it) and
    /// look for script injection.
    pub sanitize: bool,
}

impl Default for SecurityOptions {
    fn default() -> Self {
        Self {
            max_keys: 1000,
            max_depth: 10,
            allow_prototypes: false,
            sanitize: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl SecurityReport {
    pub fn into_result(self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(Error::Security(self.errors))
        }
    }
}

/// Run every check in `options` and report all failures together.
pub fn validate_security(query: &ParsedQuery, options: &SecurityOptions) -> SecurityReport {
    let mut errors = Vec::new();

    let keys = count_keys(query);
    if keys > options.max_keys {
        errors.push(format!("Too many keys: {keys} (max: {})", options.max_keys));
    }

    let depth = nesting_depth(query);
    if depth > options.max_depth {
        errors.push(format!(
            "Object too deep: {depth} levels (max: {})",
            options.max_depth
        ));
    }

    if !options.allow_prototypes && has_dangerous_keys(query) {
        errors.push("Prototype pollution detected".to_owned());
    }

    if options.sanitize {
        let paths = detect_xss(query);
        if !paths.is_empty() {
            errors.push(format!(
                "XSS vulnerabilities detected in keys: {}",
                paths.join(", ")
            ));
        }
    }

    if !errors.is_empty() {
        tracing::debug!(?errors, "security validation failed");
    }
    SecurityReport {
        valid: errors.is_empty(),
        errors,
    }
}

/// Sanitize every key and string leaf. Numbers, booleans and dates become
/// their text form; nullish values are kept.
pub fn sanitize_value(value: QueryValue) -> QueryValue {
    match value {
        QueryValue::String(s) => QueryValue::String(sanitize_input(&s, false)),
        QueryValue::Array(items) => QueryValue::Array(items.into_iter().map(sanitize_value).collect()),
        QueryValue::Object(map) => QueryValue::Object(sanitize_query(map)),
        QueryValue::Date(d) => QueryValue::String(iso_string(&d)),
        nullish @ (QueryValue::Null | QueryValue::Undefined) => nullish,
        scalar => QueryValue::String(scalar.to_string()),
    }
}

fn sanitize_query(query: ParsedQuery) -> ParsedQuery {
    query
        .into_iter()
        .map(|(k, v)| (sanitize_input(&k, false), sanitize_value(v)))
        .collect()
}

/// Optionally sanitize `query`, validate it and write it as a query string.
pub fn secure_stringify(
    query: ParsedQuery,
    security: &SecurityOptions,
    options: &StringifyOptions,
) -> Result<String> {
    let query = if security.sanitize {
        sanitize_query(query)
    } else {
        query
    };
    validate_security(&query, security).into_result()?;
    Ok(options.stringify(&QueryValue::Object(query)))
}

/// A parser that sanitizes (when enabled) and validates every result.
///
/// ```
/// use querykit::security::{SecureParser, SecurityOptions};
///
/// let parser = SecureParser::new(SecurityOptions { max_depth: 2, ..Default::default() });
/// assert!(parser.parse("a[b]=1").is_ok());
/// assert!(parser.parse("a[b][c]=1").is_err());
/// ```
#[derive(Clone, Debug, Default)]
pub struct SecureParser {
    security: SecurityOptions,
    options: ParseOptions,
}

impl SecureParser {
    pub fn new(security: SecurityOptions) -> Self {
        Self {
            security,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse(&self, input: &str) -> Result<ParsedQuery> {
        let mut query = self.options.parse(input)?;
        if self.security.sanitize {
            query = sanitize_query(query);
        }
        validate_security(&query, &self.security).into_result()?;
        Ok(query)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn query(value: serde_json::Value) -> ParsedQuery {
        match QueryValue::from(value) {
            QueryValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn scrubs_markup() {
        assert_eq!(
            sanitize_input("x<iframe src=a></iframe>y", false),
            "xy"
        );
        assert_eq!(sanitize_input("javascript:go()", false), "go()");
        assert_eq!(sanitize_input("<img onerror=x>", false), "&lt;img &gt;");
        assert_eq!(sanitize_input("1; DROP table--", true), "1  table");
    }

    #[test]
    fn counts_and_depth() {
        let q = query(json!({"a": {"b": "1", "c": ["x", {"d": "2"}]}, "e": "3"}));
        assert_eq!(count_keys(&q), 5);
        assert_eq!(nesting_depth(&q), 4);
        assert_eq!(nesting_depth(&ParsedQuery::new()), 0);
    }

    #[test]
    fn dangerous_keys_anywhere() {
        assert!(has_dangerous_keys(&query(json!({"a": [{"constructor": "x"}]}))));
        assert!(!has_dangerous_keys(&query(json!({"a": "constructor"}))));
    }

    #[test]
    fn xss_paths() {
        let q = query(json!({
            "a": ["ok", "<script>x</script>"],
            "b": {"onload=": "1"}
        }));
        assert_eq!(detect_xss(&q), ["a[1]", "b.onload= (key)"]);
    }

    #[test]
    fn report_collects_every_failure() {
        let q = query(json!({"__proto__": {"x": "javascript:1"}}));
        let options = SecurityOptions {
            max_keys: 1,
            ..Default::default()
        };
        let report = validate_security(&q, &options);
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            [
                "Too many keys: 2 (max: 1)",
                "Prototype pollution detected",
                "XSS vulnerabilities detected in keys: __proto__.x",
            ]
        );
    }
}
