use pretty_assertions::assert_eq;
use querykit::{ArrayFormat, Charset, Duplicates, Error, ParseOptions, ParsedQuery, QueryValue};
use serde_json::json;

fn parse(input: &str) -> serde_json::Value {
    parse_with(input, &ParseOptions::default())
}

fn parse_with(input: &str, options: &ParseOptions) -> serde_json::Value {
    QueryValue::from(options.parse(input).unwrap()).to_json()
}

#[test]
fn empty_and_degenerate_inputs() {
    assert_eq!(parse(""), json!({}));
    assert_eq!(parse("="), json!({"": ""}));
    assert_eq!(parse("=="), json!({"": "="}));
    assert_eq!(parse("&&"), json!({}));
    assert_eq!(parse("=&="), json!({"": ["", ""]}));
}

#[test]
fn plain_pairs() {
    assert_eq!(parse("a=b&c=d"), json!({"a": "b", "c": "d"}));
    assert_eq!(parse("a"), json!({"a": ""}));
    assert_eq!(parse("a=b=c"), json!({"a": "b=c"}));
    assert_eq!(parse("a+b=c+d&e=%20f"), json!({"a b": "c d", "e": " f"}));
}

#[test]
fn strict_null_handling() {
    let options = ParseOptions::new().strict_null_handling(true);
    assert_eq!(parse_with("a&b=", &options), json!({"a": null, "b": ""}));
}

#[test]
fn query_prefix() {
    assert_eq!(parse("?a=1"), json!({"?a": "1"}));
    let options = ParseOptions::new().ignore_query_prefix(true);
    assert_eq!(parse_with("?a=1", &options), json!({"a": "1"}));
}

#[test]
fn nested_brackets() {
    assert_eq!(
        parse("user[name]=jo&user[address][city]=x"),
        json!({"user": {"name": "jo", "address": {"city": "x"}}})
    );
}

#[test]
fn dot_notation() {
    let options = ParseOptions::new().allow_dots(true);
    assert_eq!(
        parse_with("a.b.c=d&a.e=f", &options),
        json!({"a": {"b": {"c": "d"}, "e": "f"}})
    );
    assert_eq!(parse("a.b=c"), json!({"a.b": "c"}));
    // dots replace brackets rather than adding to them
    assert_eq!(parse_with("a[b]=c", &options), json!({"a[b]": "c"}));
    assert_eq!(parse_with("a.b[c]=d", &options), json!({"a": {"b[c]": "d"}}));
}

#[test]
fn depth_truncates_silently() {
    let options = ParseOptions::new().depth(3);
    assert_eq!(
        parse_with("a[b][c][d][e][f][g]=h", &options),
        json!({"a": {"b": {"c": {}}}})
    );
    assert_eq!(
        parse("a[b][c][d][e][f][g]=h"),
        json!({"a": {"b": {"c": {"d": {"e": {}}}}}})
    );
}

#[test]
fn duplicate_policies() {
    let input = "foo=1&foo=2";
    assert_eq!(parse(input), json!({"foo": ["1", "2"]}));
    assert_eq!(
        parse_with(input, &ParseOptions::new().duplicates(Duplicates::First)),
        json!({"foo": "1"})
    );
    assert_eq!(
        parse_with(input, &ParseOptions::new().duplicates(Duplicates::Last)),
        json!({"foo": "2"})
    );
}

#[test]
fn combine_flattens_arrays() {
    let options = ParseOptions::new().array_format(ArrayFormat::Comma);
    assert_eq!(
        parse_with("a=1,2&a=3&a=4,5", &options),
        json!({"a": ["1", "2", "3", "4", "5"]})
    );
}

#[test]
fn parameter_limit() {
    let options = ParseOptions::new().parameter_limit(2);
    let err = options.parse("a=1&b=2&c=3").unwrap_err();
    assert!(matches!(err, Error::ParameterLimitExceeded { limit: 2 }));
    insta::assert_snapshot!(err, @"Parameter limit exceeded. Maximum allowed: 2");
    assert!(options.parse("a=1&b=2").is_ok());
}

#[test]
fn custom_delimiter() {
    let options = ParseOptions::new().delimiter(";");
    assert_eq!(parse_with("a=1;b=2", &options), json!({"a": "1", "b": "2"}));
}

#[test]
fn array_formats() {
    let cases = [
        (ArrayFormat::Repeat, "a=x&a=y"),
        (ArrayFormat::Brackets, "a[]=x&a[]=y"),
        (ArrayFormat::Indices, "a[0]=x&a[1]=y"),
        (ArrayFormat::Comma, "a=x,y"),
        (ArrayFormat::Json, "a=%5B%22x%22%2C%22y%22%5D"),
        (ArrayFormat::BracketSeparator, "a[]=x,y"),
    ];
    for (format, input) in cases {
        let options = ParseOptions::new().array_format(format);
        assert_eq!(parse_with(input, &options), json!({"a": ["x", "y"]}), "{format:?}");
    }

    let options = ParseOptions::new()
        .array_format(ArrayFormat::Separator)
        .array_format_separator("|");
    assert_eq!(parse_with("a=x|y", &options), json!({"a": ["x", "y"]}));
}

#[test]
fn single_values_stay_scalar_unless_marked() {
    let comma = ParseOptions::new().array_format(ArrayFormat::Comma);
    assert_eq!(parse_with("a=x", &comma), json!({"a": "x"}));

    let brackets = ParseOptions::new().array_format(ArrayFormat::Brackets);
    assert_eq!(parse_with("a[]=x", &brackets), json!({"a": ["x"]}));
}

#[test]
fn malformed_json_array_is_kept_raw() {
    let options = ParseOptions::new().array_format(ArrayFormat::Json);
    assert_eq!(parse_with("a=%5B1%2C", &options), json!({"a": "[1,"}));
    assert_eq!(parse_with("a=%7B%7D", &options), json!({"a": "{}"}));
}

#[test]
fn malformed_percent_encoding_is_kept_raw() {
    assert_eq!(parse("a=%E0%A4%A&b=%zz"), json!({"a": "%E0%A4%A", "b": "%zz"}));
}

#[test]
fn indices_become_sequences() {
    assert_eq!(parse("a[0]=b&a[1]=c"), json!({"a": ["b", "c"]}));
    assert_eq!(parse("a[5]=x"), json!({"a": ["x"]}));
    assert_eq!(parse("a[0][b]=c"), json!({"a": [{"b": "c"}]}));
}

#[test]
fn indices_out_of_order() {
    assert_eq!(parse("a[1]=x&a[0]=y"), json!({"a": ["y", "x"]}));
    assert_eq!(parse("a[2]=x&a[1]=y&a[0]=z"), json!({"a": ["z", "y", "x"]}));
    assert_eq!(parse("a[10]=x&a[3]=y"), json!({"a": ["y", "x"]}));
    assert_eq!(
        parse("a[1][b]=x&a[0][c]=y"),
        json!({"a": [{"c": "y"}, {"b": "x"}]})
    );
}

#[test]
fn interleaved_indices_keep_their_element() {
    assert_eq!(
        parse("a[0][name]=jo&a[1][name]=al&a[0][age]=3&a[1][age]=4"),
        json!({"a": [{"name": "jo", "age": "3"}, {"name": "al", "age": "4"}]})
    );
    assert_eq!(
        parse("a[1]=x&a[0]=y&a[1]=z"),
        json!({"a": ["y", ["x", "z"]]})
    );
}

#[test]
fn type_coercion() {
    let options = ParseOptions::new()
        .parse_numbers(true)
        .parse_booleans(true)
        .parse_dates(true);
    let query = options
        .parse("n=42&f=-3.5&x=42abc&t=true&T=True&d=2024-01-15&bad=2024-13-45")
        .unwrap();
    assert_eq!(query["n"], QueryValue::from(42));
    assert_eq!(query["f"], QueryValue::from(-3.5));
    assert_eq!(query["x"], QueryValue::from("42abc"));
    assert_eq!(query["t"], QueryValue::Bool(true));
    assert_eq!(query["T"], QueryValue::from("True"));
    assert!(query["d"].as_date().is_some());
    assert_eq!(query["bad"], QueryValue::from("2024-13-45"));
}

#[test]
fn coercion_runs_before_array_split() {
    let options = ParseOptions::new()
        .parse_numbers(true)
        .array_format(ArrayFormat::Comma);
    assert_eq!(parse_with("a=1,2", &options), json!({"a": ["1", "2"]}));
}

#[test]
fn reserved_keys_are_dropped() {
    assert_eq!(parse("__proto__[x]=1&a[constructor]=2&b=3"), json!({"b": "3"}));
    let options = ParseOptions::new().allow_prototypes(true);
    assert_eq!(parse_with("constructor=1", &options), json!({"constructor": "1"}));
}

#[test]
fn latin1_and_sentinel() {
    let latin1 = ParseOptions::new().charset(Charset::Iso88591);
    assert_eq!(parse_with("a=%E9", &latin1), json!({"a": "é"}));

    let sniffing = ParseOptions::new().charset_sentinel(true);
    assert_eq!(
        parse_with("utf8=%26%2310003%3B&a=%E9", &sniffing),
        json!({"a": "é"})
    );
    assert_eq!(
        parse_with("utf8=%E2%9C%93&a=%C3%A9", &latin1.clone().charset_sentinel(true)),
        json!({"a": "é"})
    );
}

#[test]
fn numeric_entities() {
    let options = ParseOptions::new()
        .charset(Charset::Iso88591)
        .interpret_numeric_entities(true);
    assert_eq!(parse_with("a=%26%239786%3B", &options), json!({"a": "☺"}));
}

#[test]
fn decode_off_keeps_text() {
    let options = ParseOptions::new().decode(false);
    assert_eq!(parse_with("a%20b=c+d", &options), json!({"a%20b": "c+d"}));
}

#[test]
fn parse_url_splits_on_first_question_mark() {
    let url = querykit::parse_url("https://x.dev/p?a=1&b=?").unwrap();
    assert_eq!(url.base_url, "https://x.dev/p");
    assert_eq!(QueryValue::from(url.query).to_json(), json!({"a": "1", "b": "?"}));

    let bare = querykit::parse_url("https://x.dev/p").unwrap();
    assert_eq!(bare.query, ParsedQuery::new());
}
