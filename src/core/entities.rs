/// Character-entity decoding and final whitespace cleanup.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// Any run of whitespace other than a newline, Unicode spaces included.
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());

/// Decode numeric (`&#124;`, `&#x7C;`) and named HTML5 (`&lt;`, `&eacute;`)
/// entities. Unknown or invalid entities are left as written.
pub fn decode(input: &str) -> String {
    ENTITY
        .replace_all(input, |caps: &Captures<'_>| {
            let whole = &caps[0];
            match caps[1].strip_prefix('#') {
                Some(num) => {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse::<u32>().ok(),
                    };
                    match code.and_then(char::from_u32) {
                        Some(c) => c.to_string(),
                        None => whole.to_string(),
                    }
                }
                None => html_escape::decode_html_entities(whole).into_owned(),
            }
        })
        .into_owned()
}

/// Final cleanup of a resolved string: decode entities, then fold every run
/// of non-newline whitespace into a single space. Newlines survive.
pub fn resolve_entities(input: &str) -> String {
    let decoded = decode(input);
    INLINE_SPACE.replace_all(&decoded, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_entities() {
        assert_eq!(decode("hello &#124; name"), "hello | name");
        assert_eq!(decode("&#x7C;"), "|");
        assert_eq!(decode("I don&#96;t"), "I don`t");
        assert_eq!(decode("&#39;I really don&#39;t&#39;"), "'I really don't'");
    }

    #[test]
    fn named_entities() {
        assert_eq!(decode("&lt;start&gt;"), "<start>");
        assert_eq!(decode("&quot;hi&quot;"), "\"hi\"");
        assert_eq!(decode("&#8220;hello!&#8221;"), "\u{201c}hello!\u{201d}");
        assert_eq!(decode("caf&eacute; &rarr; &euro;5"), "caf\u{e9} \u{2192} \u{20ac}5");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(decode("&bogus; & more"), "&bogus; & more");
        assert_eq!(decode("&#1114112;"), "&#1114112;");
    }

    #[test]
    fn whitespace_is_normalized() {
        assert_eq!(resolve_entities("a   b\tc\u{3000}d"), "a b c d");
        assert_eq!(resolve_entities("line\nnext"), "line\nnext");
        assert_eq!(resolve_entities("a&nbsp;b"), "a b");
    }

    #[test]
    fn mixed_space_runs_collapse() {
        assert_eq!(resolve_entities("a \t b"), "a b");
        assert_eq!(resolve_entities("a &nbsp; \u{2003}b"), "a b");
        assert_eq!(resolve_entities("a \n b"), "a \n b");
    }

    #[test]
    fn resolving_is_idempotent() {
        let once = resolve_entities("x &amp;  y");
        assert_eq!(resolve_entities(&once), once);
    }
}
