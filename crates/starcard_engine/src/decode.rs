use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: &'static str,
    /// Malformed sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

/// Decode raw page bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng fallback.
///
/// Never fails; only a meta tag is read from the result, so a few replaced
/// bytes elsewhere in the page are harmless.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> DecodedHtml {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(enc) = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
    {
        return decode_with(bytes, enc);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> DecodedHtml {
    // `decode` sniffs a BOM itself and may switch encodings.
    let (text, used, had_errors) = enc.decode(bytes);
    DecodedHtml {
        html: text.into_owned(),
        encoding_label: used.name(),
        had_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::{charset_param, decode_html};

    #[test]
    fn respects_charset_header() {
        let decoded = decode_html(b"caf\xe9", Some("text/html; charset=ISO-8859-1"));
        assert_eq!(decoded.html, "caf\u{e9}");
        assert_eq!(decoded.encoding_label, "windows-1252");
        assert!(!decoded.had_errors);
    }

    #[test]
    fn bom_wins_over_header() {
        let decoded = decode_html(b"\xEF\xBB\xBFhello", Some("text/html; charset=ISO-8859-1"));
        assert_eq!(decoded.html, "hello");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let decoded = decode_html(b"ok \xff ok", Some("text/html; charset=utf-8"));
        assert!(decoded.had_errors);
        assert!(decoded.html.starts_with("ok "));
    }

    #[test]
    fn charset_param_is_case_insensitive_and_unquoted() {
        assert_eq!(charset_param("text/html; Charset=\"UTF-8\""), Some("UTF-8"));
        assert_eq!(charset_param("text/html"), None);
    }
}
