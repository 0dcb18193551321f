use pretty_assertions::assert_eq;
use querykit::{ArrayFormat, ParseOptions, QueryValue, StringifyOptions};
use serde_json::json;

const FORMATS: [ArrayFormat; 7] = [
    ArrayFormat::Repeat,
    ArrayFormat::Brackets,
    ArrayFormat::Indices,
    ArrayFormat::Comma,
    ArrayFormat::Separator,
    ArrayFormat::Json,
    ArrayFormat::BracketSeparator,
];

/// Stringify then parse `$data` under every array format and check the
/// result matches `$expected`.
///
/// This is a macro so that a failure points at the calling test.
macro_rules! roundtrip_test {
    ($data:expr) => {
        roundtrip_test!($data, $data)
    };
    ($data:expr, $expected:expr) => {
        let data = QueryValue::from($data);
        let expected = QueryValue::from($expected);
        for format in FORMATS {
            let wire = StringifyOptions::new()
                .array_format(format)
                .stringify(&data);
            let parsed = ParseOptions::new()
                .array_format(format)
                .parse(&wire)
                .expect("parse");
            assert_eq!(QueryValue::from(parsed), expected, "{format:?}: {wire}");
        }
    };
}

#[test]
fn flat_strings() {
    roundtrip_test!(json!({"a": "1", "b": "two words", "c": "ü"}));
}

#[test]
fn items_array() {
    roundtrip_test!(json!({"items": ["a", "b", "c"]}));
}

#[test]
fn nested_object() {
    roundtrip_test!(json!({"user": {"name": "jo", "address": {"city": "x y"}}}));
}

#[test]
fn scalars_come_back_as_strings() {
    roundtrip_test!(
        json!({"n": 42, "f": 1.5, "t": true}),
        json!({"n": "42", "f": "1.5", "t": "true"})
    );
}

#[test]
fn coercion_restores_scalar_types() {
    let data = QueryValue::from(json!({"n": 42, "f": -1.5, "t": true, "s": "x"}));
    let wire = querykit::stringify(&data);
    let parsed = ParseOptions::new()
        .parse_numbers(true)
        .parse_booleans(true)
        .parse(&wire)
        .unwrap();
    assert_eq!(QueryValue::from(parsed), data);
}

#[test]
fn dot_notation() {
    let data = QueryValue::from(json!({"a": {"b": {"c": "d"}}}));
    let wire = StringifyOptions::new().allow_dots(true).stringify(&data);
    insta::assert_snapshot!(wire, @"a.b.c=d");
    let parsed = ParseOptions::new().allow_dots(true).parse(&wire).unwrap();
    assert_eq!(QueryValue::from(parsed), data);
}

#[test]
fn reserved_characters_survive() {
    roundtrip_test!(json!({"a&b": "c=d", "e": "f+g%h", "q": "?#/"}));
}
