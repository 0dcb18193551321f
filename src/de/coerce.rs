use crate::config::TypeCoercion;
use crate::utils;
use crate::value::QueryValue;

/// Applies the enabled scalar conversions to a decoded value.
///
/// Numbers win over booleans, and dates are only tried on what is still a
/// string afterwards. Values that don't convert cleanly stay strings.
pub fn coerce(value: QueryValue, coercion: &TypeCoercion) -> QueryValue {
    let QueryValue::String(text) = value else {
        return value;
    };
    if coercion.numbers {
        if let Some(n) = utils::parse_canonical_number(&text) {
            return QueryValue::Number(n);
        }
    }
    if coercion.booleans {
        match text.as_str() {
            "true" => return QueryValue::Bool(true),
            "false" => return QueryValue::Bool(false),
            _ => {}
        }
    }
    if coercion.dates && utils::has_date_prefix(&text) {
        if let Some(date) = utils::parse_date(&text) {
            return QueryValue::Date(date);
        }
    }
    QueryValue::String(text)
}
