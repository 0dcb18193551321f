use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use super::{BaseInfo, SchemaKind, SchemaType};
use crate::error::ValidationError;
use crate::utils;
use crate::value::{QueryValue, iso_string};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.+").expect("valid url pattern"));
static UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid uuid pattern")
});

fn expected(what: &str, value: &QueryValue) -> ValidationError {
    ValidationError::new(format!("Expected {what}, got {}", value.type_name()))
}

#[derive(Clone, Debug)]
enum StringCheck {
    Min(usize),
    Max(usize),
    Length(usize),
    Pattern(Regex),
    StartsWith(String),
    EndsWith(String),
    Includes(String),
}

impl StringCheck {
    fn run(&self, s: &str) -> Result<(), ValidationError> {
        let len = s.chars().count();
        let failure = match self {
            StringCheck::Min(min) if len < *min => format!("String must be at least {min} characters"),
            StringCheck::Max(max) if len > *max => format!("String must be at most {max} characters"),
            StringCheck::Length(exact) if len != *exact => {
                format!("String must be exactly {exact} characters")
            }
            StringCheck::Pattern(re) if !re.is_match(s) => "String does not match pattern".to_owned(),
            StringCheck::StartsWith(p) if !s.starts_with(p.as_str()) => {
                format!("String must start with \"{p}\"")
            }
            StringCheck::EndsWith(p) if !s.ends_with(p.as_str()) => {
                format!("String must end with \"{p}\"")
            }
            StringCheck::Includes(p) if !s.contains(p.as_str()) => {
                format!("String must include \"{p}\"")
            }
            _ => return Ok(()),
        };
        Err(ValidationError::new(failure))
    }
}

/// Accepts strings only; normalisers run before any constraint.
#[derive(Clone, Debug)]
pub struct StringSchema {
    base: BaseInfo,
    checks: Vec<StringCheck>,
    trim: bool,
    lowercase: bool,
    uppercase: bool,
}

impl StringSchema {
    pub fn new() -> Self {
        Self {
            base: BaseInfo::default(),
            checks: Vec::new(),
            trim: false,
            lowercase: false,
            uppercase: false,
        }
    }

    fn with(mut self, check: StringCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// At least `length` characters. Lengths here count Unicode scalar
    /// values, so a character outside the BMP counts once.
    pub fn min(self, length: usize) -> Self {
        self.with(StringCheck::Min(length))
    }

    /// At most `length` characters, counted as in [`min`](Self::min).
    pub fn max(self, length: usize) -> Self {
        self.with(StringCheck::Max(length))
    }

    /// Exactly `length` characters, counted as in [`min`](Self::min).
    pub fn length(self, length: usize) -> Self {
        self.with(StringCheck::Length(length))
    }

    pub fn email(self) -> Self {
        self.with(StringCheck::Pattern(EMAIL.clone()))
    }

    /// `http://` or `https://` followed by anything.
    pub fn url(self) -> Self {
        self.with(StringCheck::Pattern(URL.clone()))
    }

    pub fn uuid(self) -> Self {
        self.with(StringCheck::Pattern(UUID.clone()))
    }

    pub fn regex(self, pattern: Regex) -> Self {
        self.with(StringCheck::Pattern(pattern))
    }

    pub fn starts_with(self, prefix: impl Into<String>) -> Self {
        self.with(StringCheck::StartsWith(prefix.into()))
    }

    pub fn ends_with(self, suffix: impl Into<String>) -> Self {
        self.with(StringCheck::EndsWith(suffix.into()))
    }

    pub fn includes(self, needle: impl Into<String>) -> Self {
        self.with(StringCheck::Includes(needle.into()))
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn to_lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn to_uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }
}

impl SchemaType for StringSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::String
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let QueryValue::String(mut s) = value else {
            return Err(expected("string", &value));
        };
        if self.trim {
            s = s.trim().to_owned();
        }
        if self.lowercase {
            s = s.to_lowercase();
        }
        if self.uppercase {
            s = s.to_uppercase();
        }
        for check in &self.checks {
            check.run(&s)?;
        }
        Ok(QueryValue::String(s))
    }
}

#[derive(Clone, Copy, Debug)]
enum NumberCheck {
    Min(f64),
    Max(f64),
    Int,
    Positive,
    Negative,
    NonPositive,
    NonNegative,
    MultipleOf(f64),
    Finite,
    Safe,
}

impl NumberCheck {
    fn run(self, n: f64) -> Result<(), ValidationError> {
        let text = utils::number_to_string;
        let failure = match self {
            NumberCheck::Min(min) if n < min => format!("Number must be at least {}", text(min)),
            NumberCheck::Max(max) if n > max => format!("Number must be at most {}", text(max)),
            NumberCheck::Int if !(n.is_finite() && n.fract() == 0.0) => "Expected integer".to_owned(),
            NumberCheck::Positive if n <= 0.0 => "Expected positive number".to_owned(),
            NumberCheck::Negative if n >= 0.0 => "Expected negative number".to_owned(),
            NumberCheck::NonPositive if n > 0.0 => "Expected non-positive number".to_owned(),
            NumberCheck::NonNegative if n < 0.0 => "Expected non-negative number".to_owned(),
            NumberCheck::MultipleOf(m) if n % m != 0.0 => {
                format!("Number must be a multiple of {}", text(m))
            }
            NumberCheck::Finite if !n.is_finite() => "Expected finite number".to_owned(),
            NumberCheck::Safe if !utils::is_safe_integer(n) => "Expected safe integer".to_owned(),
            _ => return Ok(()),
        };
        Err(ValidationError::new(failure))
    }
}

/// Coerces numeric text (and other number-like values) into a number.
/// Booleans are rejected.
#[derive(Clone, Debug)]
pub struct NumberSchema {
    base: BaseInfo,
    checks: Vec<NumberCheck>,
}

impl NumberSchema {
    pub fn new() -> Self {
        Self {
            base: BaseInfo::default(),
            checks: Vec::new(),
        }
    }

    fn with(mut self, check: NumberCheck) -> Self {
        self.checks.push(check);
        self
    }

    pub fn min(self, min: impl Into<f64>) -> Self {
        self.with(NumberCheck::Min(min.into()))
    }

    pub fn max(self, max: impl Into<f64>) -> Self {
        self.with(NumberCheck::Max(max.into()))
    }

    pub fn int(self) -> Self {
        self.with(NumberCheck::Int)
    }

    pub fn positive(self) -> Self {
        self.with(NumberCheck::Positive)
    }

    pub fn negative(self) -> Self {
        self.with(NumberCheck::Negative)
    }

    pub fn nonpositive(self) -> Self {
        self.with(NumberCheck::NonPositive)
    }

    pub fn nonnegative(self) -> Self {
        self.with(NumberCheck::NonNegative)
    }

    pub fn multiple_of(self, step: impl Into<f64>) -> Self {
        self.with(NumberCheck::MultipleOf(step.into()))
    }

    pub fn finite(self) -> Self {
        self.with(NumberCheck::Finite)
    }

    /// Integer within ±(2^53 - 1).
    pub fn safe(self) -> Self {
        self.with(NumberCheck::Safe)
    }
}

impl SchemaType for NumberSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Number
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        if matches!(value, QueryValue::Bool(_)) {
            return Err(expected("number", &value));
        }
        let n = utils::to_number(&value);
        if n.is_nan() {
            return Err(expected("number", &value));
        }
        for check in &self.checks {
            check.run(n)?;
        }
        Ok(QueryValue::Number(n))
    }
}

/// Accepts `true`/`false`, `1`/`0` and their text forms.
#[derive(Clone, Debug)]
pub struct BooleanSchema {
    base: BaseInfo,
}

impl BooleanSchema {
    pub fn new() -> Self {
        Self {
            base: BaseInfo::default(),
        }
    }
}

impl SchemaType for BooleanSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Boolean
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let b = match &value {
            QueryValue::Bool(b) => *b,
            QueryValue::Number(n) if *n == 1.0 => true,
            QueryValue::Number(n) if *n == 0.0 => false,
            QueryValue::String(s) if s == "true" || s == "1" => true,
            QueryValue::String(s) if s == "false" || s == "0" => false,
            _ => return Err(expected("boolean", &value)),
        };
        Ok(QueryValue::Bool(b))
    }
}

#[derive(Clone, Copy, Debug)]
enum DateCheck {
    Min(DateTime<Utc>),
    Max(DateTime<Utc>),
}

/// Accepts dates, date text and epoch milliseconds.
#[derive(Clone, Debug)]
pub struct DateSchema {
    base: BaseInfo,
    checks: Vec<DateCheck>,
}

impl DateSchema {
    pub fn new() -> Self {
        Self {
            base: BaseInfo::default(),
            checks: Vec::new(),
        }
    }

    pub fn min(mut self, earliest: DateTime<Utc>) -> Self {
        self.checks.push(DateCheck::Min(earliest));
        self
    }

    pub fn max(mut self, latest: DateTime<Utc>) -> Self {
        self.checks.push(DateCheck::Max(latest));
        self
    }
}

impl SchemaType for DateSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Date
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let date = match &value {
            QueryValue::Date(d) => Some(*d),
            QueryValue::String(s) => utils::parse_date(s),
            QueryValue::Number(n) => utils::date_from_millis(*n),
            _ => return Err(expected("date", &value)),
        };
        let date = date.ok_or_else(|| ValidationError::new("Invalid date"))?;
        for check in &self.checks {
            match check {
                DateCheck::Min(min) if date < *min => {
                    return Err(ValidationError::new(format!(
                        "Date must be after {}",
                        iso_string(min)
                    )));
                }
                DateCheck::Max(max) if date > *max => {
                    return Err(ValidationError::new(format!(
                        "Date must be before {}",
                        iso_string(max)
                    )));
                }
                _ => {}
            }
        }
        Ok(QueryValue::Date(date))
    }
}

/// One of a fixed set of strings.
#[derive(Clone, Debug)]
pub struct EnumSchema {
    base: BaseInfo,
    options: Vec<String>,
}

impl EnumSchema {
    pub fn new<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            base: BaseInfo::default(),
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl SchemaType for EnumSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Enum
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        match &value {
            QueryValue::String(s) if self.options.contains(s) => Ok(value),
            _ => Err(ValidationError::new(format!(
                "Expected one of {}, got {value}",
                self.options.join(", ")
            ))),
        }
    }
}

/// Exactly one value.
#[derive(Clone, Debug)]
pub struct LiteralSchema {
    base: BaseInfo,
    value: QueryValue,
}

impl LiteralSchema {
    pub fn new(value: impl Into<QueryValue>) -> Self {
        Self {
            base: BaseInfo::default(),
            value: value.into(),
        }
    }
}

impl SchemaType for LiteralSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        SchemaKind::Literal
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        if value == self.value {
            Ok(value)
        } else {
            Err(ValidationError::new(format!(
                "Expected {}, got {value}",
                self.value
            )))
        }
    }
}

/// The schemas without options: `any` and `unknown` accept everything,
/// `null` accepts only `Null`, `undefined` and `void` only `Undefined`.
#[derive(Clone, Debug)]
pub struct BasicSchema {
    base: BaseInfo,
    kind: SchemaKind,
}

impl BasicSchema {
    pub(crate) fn new(kind: SchemaKind) -> Self {
        Self {
            base: BaseInfo::default(),
            kind,
        }
    }
}

impl SchemaType for BasicSchema {
    fn base(&self) -> &BaseInfo {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseInfo {
        &mut self.base
    }

    fn kind(&self) -> SchemaKind {
        self.kind
    }

    fn check(&self, value: QueryValue) -> Result<QueryValue, ValidationError> {
        let accepted = match self.kind {
            SchemaKind::Null => value.is_null(),
            SchemaKind::Undefined | SchemaKind::Void => value.is_undefined(),
            _ => true,
        };
        if accepted {
            Ok(value)
        } else {
            Err(expected(&self.kind.to_string(), &value))
        }
    }
}
