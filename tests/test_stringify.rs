use std::sync::Arc;

use pretty_assertions::assert_eq;
use querykit::{
    ArrayFormat, Charset, Filter, Format, QueryValue, Sort, StringifyOptions,
};
use serde_json::json;

fn stringify(value: serde_json::Value) -> String {
    stringify_with(value, &StringifyOptions::default())
}

fn stringify_with(value: serde_json::Value, options: &StringifyOptions) -> String {
    options.stringify(&QueryValue::from(value))
}

#[test]
fn non_containers_give_empty_output() {
    assert_eq!(querykit::stringify(&QueryValue::Null), "");
    assert_eq!(querykit::stringify(&QueryValue::from(5)), "");
    assert_eq!(stringify(json!({})), "");
}

#[test]
fn scalars() {
    insta::assert_snapshot!(
        stringify(json!({"a": "b c", "n": 1.5, "t": true, "u": "ü&="})),
        @"a=b%20c&n=1.5&t=true&u=%C3%BC%26%3D"
    );
}

#[test]
fn null_handling() {
    assert_eq!(stringify(json!({"a": null})), "a=");
    assert_eq!(
        stringify_with(json!({"a": null}), &StringifyOptions::new().strict_null_handling(true)),
        "a"
    );
    assert_eq!(
        stringify_with(json!({"a": null, "b": "v"}), &StringifyOptions::new().skip_nulls(true)),
        "b=v"
    );
    assert_eq!(
        stringify_with(
            json!({"a": null, "b": "v"}),
            &StringifyOptions::new().skip_nulls(true).strict_null_handling(true)
        ),
        "a&b=v"
    );
}

#[test]
fn undefined_behaves_like_null() {
    let value = QueryValue::from_iter([("a", QueryValue::Undefined), ("b", QueryValue::from("1"))]);
    assert_eq!(querykit::stringify(&value), "a=&b=1");
}

#[test]
fn array_format_table() {
    let data = json!({"a": ["x", "y"]});
    let table = [
        (ArrayFormat::Repeat, "a=x&a=y"),
        (ArrayFormat::Brackets, "a[]=x&a[]=y"),
        (ArrayFormat::Indices, "a[0]=x&a[1]=y"),
        (ArrayFormat::Comma, "a=x,y"),
        (ArrayFormat::Separator, "a=x|y"),
        (ArrayFormat::Json, "a=%5B%22x%22%2C%22y%22%5D"),
        (ArrayFormat::BracketSeparator, "a[]=x|y"),
    ];
    for (format, expected) in table {
        let options = StringifyOptions::new()
            .array_format(format)
            .array_format_separator("|");
        assert_eq!(stringify_with(data.clone(), &options), expected, "{format:?}");
    }
}

#[test]
fn empty_arrays_write_nothing() {
    assert_eq!(stringify(json!({"a": [], "b": "1"})), "b=1");
}

#[test]
fn nested_values() {
    insta::assert_snapshot!(
        stringify(json!({"user": {"name": "jo", "tags": ["a", "b"], "address": {"city": "x"}}})),
        @"user[name]=jo&user[tags]=a&user[tags]=b&user[address][city]=x"
    );
    insta::assert_snapshot!(
        stringify_with(
            json!({"user": {"name": "jo", "address": {"city": "x"}}}),
            &StringifyOptions::new().allow_dots(true)
        ),
        @"user.name=jo&user.address.city=x"
    );
}

#[test]
fn objects_inside_arrays_are_json() {
    insta::assert_snapshot!(
        stringify(json!({"a": [{"b": 1}]})),
        @"a=%7B%22b%22%3A1%7D"
    );
}

#[test]
fn dates_use_serialize_date() {
    let date = chrono::DateTime::from_timestamp_millis(0).unwrap();
    let value = QueryValue::from_iter([("d", date)]);
    assert_eq!(querykit::stringify(&value), "d=1970-01-01T00%3A00%3A00.000Z");

    let options = StringifyOptions::new().serialize_date(|d| d.timestamp().to_string());
    assert_eq!(options.stringify(&value), "d=0");
}

#[test]
fn rfc1738() {
    let options = StringifyOptions::new().format(Format::Rfc1738);
    assert_eq!(stringify_with(json!({"a": "b c(d)"}), &options), "a=b+c(d)");
}

#[test]
fn encode_flags() {
    let data = json!({"a": {"b c": "d e"}});
    assert_eq!(
        stringify_with(data.clone(), &StringifyOptions::new().encode(false)),
        "a[b c]=d e"
    );
    assert_eq!(
        stringify_with(data, &StringifyOptions::new().encode_values_only(true)),
        "a[b c]=d%20e"
    );
}

#[test]
fn custom_encoder() {
    let options = StringifyOptions::new().encoder(|text, default, _| default(&text.to_uppercase()));
    assert_eq!(stringify_with(json!({"a": "b c"}), &options), "A=B%20C");
}

#[test]
fn sort_is_independent_of_insertion_order() {
    let options = StringifyOptions::new().sort(Sort::Lexical);
    let forward = stringify_with(json!({"a": "1", "b": "2", "c": "3"}), &options);
    let backward = stringify_with(json!({"c": "3", "b": "2", "a": "1"}), &options);
    assert_eq!(forward, backward);
    assert_eq!(forward, "a=1&b=2&c=3");

    let reverse = StringifyOptions::new().sort(Sort::custom(|a, b| b.cmp(a)));
    assert_eq!(stringify_with(json!({"a": "1", "b": "2"}), &reverse), "b=2&a=1");
}

#[test]
fn key_filter() {
    let options = StringifyOptions::new().filter(Filter::keys(["b", "a"]));
    assert_eq!(stringify_with(json!({"a": "1", "b": "2", "c": "3"}), &options), "b=2&a=1");
}

#[test]
fn function_filter() {
    let options = StringifyOptions::new().filter(Filter::function(|key, value| {
        match (key, value) {
            ("secret", _) => None,
            (_, QueryValue::Number(n)) => Some(QueryValue::from(n * 10.0)),
            (_, other) => Some(other.clone()),
        }
    }));
    assert_eq!(
        stringify_with(json!({"a": 1, "secret": {"x": "y"}, "b": "z"}), &options),
        "a=10&b=z"
    );
}

#[test]
fn prefix_and_sentinel() {
    let options = StringifyOptions::new()
        .add_query_prefix(true)
        .charset_sentinel(true)
        .charset(Charset::Iso88591);
    assert_eq!(
        stringify_with(json!({"a": "é☺"}), &options),
        "?utf8=%26%2310003%3B&a=%E9%26%239786%3B"
    );
}

#[test]
fn custom_delimiter() {
    let options = StringifyOptions::new().delimiter(";");
    assert_eq!(stringify_with(json!({"a": "1", "b": "2"}), &options), "a=1;b=2");
}

#[test]
fn stringify_url() {
    let query = QueryValue::from(json!({"a": "1"}));
    let options = StringifyOptions::default();
    assert_eq!(querykit::stringify_url("/p", &query, &options), "/p?a=1");
    assert_eq!(querykit::stringify_url("/p?z=0", &query, &options), "/p?z=0&a=1");
    assert_eq!(querykit::stringify_url("", &query, &options), "");
    assert_eq!(
        querykit::stringify_url("/p", &QueryValue::from(json!({})), &options),
        "/p"
    );
}

#[test]
fn shared_options_across_threads() {
    let options = Arc::new(StringifyOptions::new().array_format(ArrayFormat::Brackets));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let options = Arc::clone(&options);
            std::thread::spawn(move || {
                options.stringify(&QueryValue::from(json!({"a": [i.to_string()]})))
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("a[]={i}"));
    }
}
