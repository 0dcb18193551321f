//! Scalar helpers shared by the parser, the stringifier and the schema layer.
//!
//! Query strings produced by browsers and JavaScript services follow the
//! number and date text conventions of that platform, so the helpers here
//! reproduce them: `String(n)` for numbers, `Number(x)` for coercion and the
//! lenient `Date` constructor for date text.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::value::{ParsedQuery, QueryValue};

/// Largest integer an `f64` represents exactly (2^53 - 1).
pub const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("valid date prefix pattern"));

pub fn is_safe_integer(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
}

/// Shortest text for `n` that parses back to the same value.
///
/// Integers print without a fraction, magnitudes outside `[1e-6, 1e21)` switch
/// to exponent form with an explicit sign (`1e+21`, `1.5e-7`).
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned();
    }
    if n == 0.0 {
        // covers -0 as well
        return "0".to_owned();
    }
    if is_safe_integer(n) {
        let mut buffer = itoa::Buffer::new();
        return buffer.format(n as i64).to_owned();
    }
    let magnitude = n.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return n.to_string();
    }
    let text = format!("{n:e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    }
}

/// Numeric value of `text` when it reads back identically, e.g. `"42"`,
/// `"3.14"`, `"-5"`. Rejects `"42abc"`, `"007"`, `"1.50"` and `"NaN"`.
pub fn parse_canonical_number(text: &str) -> Option<f64> {
    let n = string_to_number(text);
    if n.is_nan() || number_to_string(n) != text {
        return None;
    }
    Some(n)
}

/// Numeric conversion of a string: surrounding whitespace is ignored, an
/// empty string is zero, `0x`/`0o`/`0b` prefixes are honoured and anything
/// else that is not a decimal literal is `NaN`.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let radix = match trimmed.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&trimmed[2..], radix)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    // `f64::from_str` also accepts "inf" and "nan" spellings, which are not
    // numeric literals here
    let is_decimal_literal = trimmed
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if !is_decimal_literal {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// `Number(value)` for any query value. Booleans are 0/1 here; callers that
/// must reject booleans check for them first.
pub fn to_number(value: &QueryValue) -> f64 {
    match value {
        QueryValue::Undefined => f64::NAN,
        QueryValue::Null => 0.0,
        QueryValue::Bool(b) => f64::from(u8::from(*b)),
        QueryValue::Number(n) => *n,
        QueryValue::String(s) => string_to_number(s),
        QueryValue::Date(d) => d.timestamp_millis() as f64,
        QueryValue::Array(items) => match items.as_slice() {
            [] => 0.0,
            [single] => match single {
                QueryValue::Array(_) | QueryValue::Object(_) => to_number(single),
                QueryValue::Null | QueryValue::Undefined => 0.0,
                other => string_to_number(&other.to_string()),
            },
            _ => f64::NAN,
        },
        QueryValue::Object(_) => f64::NAN,
    }
}

/// True when the text starts with a `YYYY-MM-DD` date.
pub fn has_date_prefix(text: &str) -> bool {
    LEADING_DATE.is_match(text)
}

/// Parse date text the way a lenient date constructor would.
///
/// Accepts RFC 3339 / ISO-8601 with an offset, RFC 2822, ISO date-times
/// without an offset (read as UTC) and plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(text) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(text) {
        return Some(d.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(d) = NaiveDateTime::parse_from_str(text, format) {
            return Some(d.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

/// Date from milliseconds since the Unix epoch.
pub fn date_from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

/// Deep merge `source` into `target`.
///
/// Objects merge key by key, arrays concatenate, and for any other pairing the
/// incoming value replaces the existing one.
pub fn merge(target: &mut ParsedQuery, source: ParsedQuery) {
    for (key, value) in source {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value),
            None => {
                target.insert(key, value);
            }
        }
    }
}

fn merge_value(existing: &mut QueryValue, incoming: QueryValue) {
    match (existing, incoming) {
        (QueryValue::Object(a), QueryValue::Object(b)) => merge(a, b),
        (QueryValue::Array(a), QueryValue::Array(b)) => a.extend(b),
        (slot, incoming) => *slot = incoming,
    }
}

/// Deepest container nesting below `value`; scalars are depth 0.
pub fn depth(value: &QueryValue) -> usize {
    match value {
        QueryValue::Array(items) => items.iter().map(|v| depth(v) + 1).max().unwrap_or(0),
        QueryValue::Object(map) => map.values().map(|v| depth(v) + 1).max().unwrap_or(0),
        _ => 0,
    }
}
