//! Escape decoding applied to every extracted text field.
//!
//! Order is fixed: `\uXXXX` escapes first, then backslash escapes (backslash
//! itself last), then HTML entities, then trimming. Decoding entities before
//! the unicode pass would leave `&#39;` as `&#39;`.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[allow(clippy::expect_used)]
static SURROGATE_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\\u(d[89ab][0-9a-f]{2})\\u(d[c-f][0-9a-f]{2})").expect("surrogate regex")
});

#[allow(clippy::expect_used)]
static UNICODE_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\u([0-9a-fA-F]{4})").expect("unicode escape regex"));

#[allow(clippy::expect_used)]
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<.*?>").expect("tag regex"));

/// Backslash escapes for body text, in application order.
const CONTENT_ESCAPES: [(&str, &str); 6] = [
    ("\\n", "\n"),
    ("\\r", ""),
    ("\\t", " "),
    ("\\\"", "\""),
    ("\\'", "'"),
    ("\\\\", "\\"),
];

/// Author names are single-line: newlines and tabs become spaces.
const AUTHOR_ESCAPES: [(&str, &str); 6] = [
    ("\\n", " "),
    ("\\r", ""),
    ("\\t", " "),
    ("\\\"", "\""),
    ("\\'", "'"),
    ("\\\\", "\\"),
];

fn hex_value(caps: &Captures<'_>, group: usize) -> Option<u32> {
    caps.get(group)
        .and_then(|m| u32::from_str_radix(m.as_str(), 16).ok())
}

/// Decodes `\uXXXX` escapes, joining UTF-16 surrogate pairs. A lone
/// surrogate cannot be represented and is left in its escaped form.
pub fn decode_unicode_escapes(input: &str) -> Cow<'_, str> {
    if !input.contains("\\u") {
        return Cow::Borrowed(input);
    }

    let paired = SURROGATE_PAIR_RE.replace_all(input, |caps: &Captures<'_>| {
        match (hex_value(caps, 1), hex_value(caps, 2)) {
            (Some(high), Some(low)) => {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                char::from_u32(code).map_or_else(|| caps[0].to_string(), String::from)
            }
            _ => caps[0].to_string(),
        }
    });

    let decoded = UNICODE_ESCAPE_RE
        .replace_all(&paired, |caps: &Captures<'_>| {
            hex_value(caps, 1)
                .and_then(char::from_u32)
                .map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned();
    Cow::Owned(decoded)
}

fn apply_escapes(input: &str, table: &[(&str, &str)]) -> String {
    table
        .iter()
        .fold(input.to_string(), |acc, (from, to)| acc.replace(from, to))
}

/// Full pipeline for review bodies: newlines are preserved.
pub fn normalize_content(raw: &str) -> String {
    let unicode = decode_unicode_escapes(raw);
    let unescaped = apply_escapes(&unicode, &CONTENT_ESCAPES);
    html_escape::decode_html_entities(&unescaped).trim().to_string()
}

/// Full pipeline for author names: whitespace escapes collapse to spaces.
pub fn normalize_author(raw: &str) -> String {
    let unicode = decode_unicode_escapes(raw);
    let unescaped = apply_escapes(&unicode, &AUTHOR_ESCAPES);
    html_escape::decode_html_entities(&unescaped).trim().to_string()
}

/// Single non-nested pass removing anything that looks like a tag.
pub fn strip_tags(html: &str) -> Cow<'_, str> {
    TAG_RE.replace_all(html, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unicode_and_entity_spellings_converge() {
        let escaped = normalize_content(r"It\u0026#39;s great");
        let entity = normalize_content("It&#39;s great");
        assert_eq!(escaped, "It's great");
        assert_eq!(escaped, entity);
    }

    #[test]
    fn decodes_surrogate_pairs() {
        assert_eq!(decode_unicode_escapes(r"hi \ud83c\udfac"), "hi \u{1F3AC}");
    }

    #[test]
    fn lone_surrogate_is_left_escaped() {
        assert_eq!(decode_unicode_escapes(r"a\ud83cb"), r"a\ud83cb");
    }

    #[test]
    fn content_keeps_newlines_and_unescapes_quotes() {
        let raw = r#"Line one.\nLine \"two\"\r\tend \\ done"#;
        assert_eq!(normalize_content(raw), "Line one.\nLine \"two\" end \\ done");
    }

    #[test]
    fn author_collapses_whitespace_escapes() {
        assert_eq!(normalize_author(r"  Jane\nDoe\t "), "Jane Doe");
    }

    #[test]
    fn backslash_is_decoded_after_other_escapes() {
        // `\\n` is an escaped backslash followed by `n`; the newline pass sees
        // the trailing `\n` first, which is the accepted ordering.
        assert_eq!(normalize_content(r"a\\nb"), "a\\\nb");
    }

    #[test]
    fn named_and_numeric_entities_decode() {
        assert_eq!(
            normalize_content(" Tom &amp; Jerry &#8212; &quot;classic&quot; "),
            "Tom & Jerry \u{2014} \"classic\""
        );
    }

    #[test]
    fn strip_tags_is_single_pass() {
        assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("a <<b>> c"), "a > c");
    }
}
