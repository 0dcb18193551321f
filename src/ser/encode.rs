use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::config::{Charset, Format};

/// RFC 3986 unreserved characters stay bare:
/// ASCII alphanumerics, U+002D (-), U+002E (.), U+005F (_) and U+007E (~).
const RFC3986_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Keys additionally keep their nesting brackets readable, e.g. `a[b]=1`.
const RFC3986_KEY_SET: &AsciiSet = &RFC3986_SET.remove(b'[').remove(b']');

/// What `encodeURIComponent` leaves alone: the RFC 3986 set plus
/// U+0021 (!), U+0027 ('), U+0028 ((), U+0029 ()) and U+002A (*).
///
/// NOTE: space is left out of the set here and rewritten to `+` afterwards.
const RFC1738_SET: &AsciiSet = &RFC3986_SET
    .remove(b'!')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b' ');

const RFC1738_KEY_SET: &AsciiSet = &RFC1738_SET.remove(b'[').remove(b']');

fn ascii_set(format: Format, is_key: bool) -> &'static AsciiSet {
    match (format, is_key) {
        (Format::Rfc3986, false) => RFC3986_SET,
        (Format::Rfc3986, true) => RFC3986_KEY_SET,
        (Format::Rfc1738, false) => RFC1738_SET,
        (Format::Rfc1738, true) => RFC1738_KEY_SET,
    }
}

/// Percent-encodes one key or value.
///
/// ## RFC 3986 (default)
/// Everything outside the unreserved set is escaped, spaces as `%20`.
///
/// ## RFC 1738
/// A few more punctuation characters stay bare and spaces become `+`.
///
/// Under ISO-8859-1, characters up to U+00FF are written as a single `%XX`
/// and anything above as a percent-encoded `&#N;` entity.
pub fn encode(input: &str, format: Format, charset: Charset, is_key: bool) -> Cow<'_, str> {
    let set = ascii_set(format, is_key);
    let encoded: Cow<'_, str> = match charset {
        Charset::Utf8 => utf8_percent_encode(input, set).into(),
        Charset::Iso88591 => Cow::Owned(encode_latin1(input, set)),
    };
    if format == Format::Rfc1738 && encoded.contains(' ') {
        Cow::Owned(encoded.replace(' ', "+"))
    } else {
        encoded
    }
}

fn encode_latin1(input: &str, set: &'static AsciiSet) -> String {
    let mut out = String::with_capacity(input.len());
    let mut buf = [0u8; 4];
    for c in input.chars() {
        let code = u32::from(c);
        if c.is_ascii() {
            out.extend(utf8_percent_encode(c.encode_utf8(&mut buf), set));
        } else if code <= 0xFF {
            out.push_str(&format!("%{code:02X}"));
        } else {
            out.push_str(&format!("%26%23{code}%3B"));
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rfc3986(s: &str) -> Cow<'_, str> {
        encode(s, Format::Rfc3986, Charset::Utf8, false)
    }

    #[test]
    fn unreserved_stays_borrowed() {
        assert!(matches!(rfc3986("a-b_c.d~e"), Cow::Borrowed(_)));
    }

    #[test]
    fn rfc3986_escapes() {
        assert_eq!(rfc3986("a b&c=d"), "a%20b%26c%3Dd");
        assert_eq!(rfc3986("café"), "caf%C3%A9");
        assert_eq!(rfc3986("a[b]"), "a%5Bb%5D");
        assert_eq!(encode("a[b]", Format::Rfc3986, Charset::Utf8, true), "a[b]");
        assert_eq!(rfc3986("(x)!"), "%28x%29%21");
    }

    #[test]
    fn rfc1738_spaces_as_plus() {
        let encoded = encode("a b+(c)!", Format::Rfc1738, Charset::Utf8, false);
        assert_eq!(encoded, "a+b%2B(c)!");
    }

    #[test]
    fn latin1() {
        let encoded = encode("é ☺", Format::Rfc3986, Charset::Iso88591, false);
        assert_eq!(encoded, "%E9%20%26%239786%3B");
    }
}
