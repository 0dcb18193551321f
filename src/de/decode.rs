use std::borrow::Cow;

use crate::config::Charset;

#[inline(always)]
fn char_to_digit(c: u8) -> Option<u8> {
    char::from(c).to_digit(16).map(|d| d as u8)
}

/// Decodes one key or value component:
/// - Replaces `+` with a space
/// - Decodes `%XX` sequences
///
/// Under UTF-8 a malformed escape or an invalid byte sequence makes the
/// whole component come back untouched. Under ISO-8859-1 each `%XX` is a
/// single code point and malformed escapes stay as written.
pub fn decode(input: &str, charset: Charset) -> Cow<'_, str> {
    if !input.bytes().any(|b| b == b'+' || b == b'%') {
        return Cow::Borrowed(input);
    }
    match charset {
        Charset::Utf8 => decode_utf8(input),
        Charset::Iso88591 => Cow::Owned(decode_latin1(input)),
    }
}

fn decode_utf8(input: &str) -> Cow<'_, str> {
    let bytes = input.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => {
                decoded.push(b' ');
                idx += 1;
            }
            b'%' => {
                let escaped = bytes
                    .get(idx + 1)
                    .and_then(|h| char_to_digit(*h))
                    .zip(bytes.get(idx + 2).and_then(|l| char_to_digit(*l)));
                let Some((h, l)) = escaped else {
                    tracing::trace!(input, "malformed percent escape, keeping raw text");
                    return Cow::Borrowed(input);
                };
                decoded.push(h * 0x10 + l);
                idx += 3;
            }
            b => {
                decoded.push(b);
                idx += 1;
            }
        }
    }
    match String::from_utf8(decoded) {
        Ok(text) => Cow::Owned(text),
        Err(_) => {
            tracing::trace!(input, "percent escapes are not valid utf-8, keeping raw text");
            Cow::Borrowed(input)
        }
    }
}

fn decode_latin1(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut decoded = String::with_capacity(bytes.len());
    let mut last_segment = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => {
                decoded.push_str(&input[last_segment..idx]);
                decoded.push(' ');
                idx += 1;
                last_segment = idx;
            }
            b'%' => {
                let escaped = bytes
                    .get(idx + 1)
                    .and_then(|h| char_to_digit(*h))
                    .zip(bytes.get(idx + 2).and_then(|l| char_to_digit(*l)));
                if let Some((h, l)) = escaped {
                    decoded.push_str(&input[last_segment..idx]);
                    decoded.push(char::from(h * 0x10 + l));
                    idx += 3;
                    last_segment = idx;
                } else {
                    idx += 1;
                }
            }
            _ => idx += 1,
        }
    }
    decoded.push_str(&input[last_segment..]);
    decoded
}

/// Replaces `&#N;` with the character `N`. Entities at or above U+FFFF, and
/// those naming no valid character, are removed.
pub fn interpret_numeric_entities(input: &str) -> Cow<'_, str> {
    if !input.contains("&#") {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("&#") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 && after.as_bytes().get(digits) == Some(&b';') {
            let code = after[..digits].parse::<u32>().ok();
            if let Some(c) = code.filter(|c| *c < 0xFFFF).and_then(char::from_u32) {
                out.push(c);
            }
            rest = &after[digits + 1..];
        } else {
            out.push_str("&#");
            rest = after;
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}
