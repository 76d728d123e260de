use scraper::{Html, Selector};
use url::Url;

use crate::{FailureKind, FetchError};

/// Metadata property naming a page's preview image.
pub const OG_IMAGE_PROPERTY: &str = "og:image";

const OG_IMAGE_MARKER: &str = "\"og:image\"";

pub trait PreviewExtractor: Send + Sync {
    /// Locate the preview image URL declared by `html`.
    ///
    /// Relative values are resolved against `base` when it is given.
    fn extract(&self, html: &str, base: Option<&Url>) -> Result<Url, FetchError>;
}

/// Reads `<meta property="og:image" content="...">` through a real HTML parser.
///
/// Attribute order, quoting style and entity escaping do not matter. Falls
/// back to `name="og:image"`, which some sites use instead of `property`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaTagExtractor;

impl PreviewExtractor for MetaTagExtractor {
    fn extract(&self, html: &str, base: Option<&Url>) -> Result<Url, FetchError> {
        let doc = Html::parse_document(html);
        let raw = [
            format!("meta[property=\"{OG_IMAGE_PROPERTY}\"]"),
            format!("meta[name=\"{OG_IMAGE_PROPERTY}\"]"),
        ]
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .find_map(|meta| meta.value().attr("content"))
                .map(str::to_owned)
        })
        .ok_or_else(|| not_found("no og:image meta tag"))?;

        resolve(&raw, base)
    }
}

/// Plain text scan: first `"og:image"` marker, then the next quoted value.
///
/// Cheaper than a parse and independent of markup validity, but expects the
/// content attribute to follow the property attribute.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerScanExtractor;

impl PreviewExtractor for MarkerScanExtractor {
    fn extract(&self, html: &str, base: Option<&Url>) -> Result<Url, FetchError> {
        resolve(scan_quoted_value(html)?, base)
    }
}

fn scan_quoted_value(html: &str) -> Result<&str, FetchError> {
    let marker_end = html
        .find(OG_IMAGE_MARKER)
        .map(|idx| idx + OG_IMAGE_MARKER.len())
        .ok_or_else(|| not_found("og:image marker not found"))?;
    let after_marker = &html[marker_end..];
    let open = after_marker
        .find('"')
        .ok_or_else(|| not_found("no opening quote after og:image marker"))?;
    let value_and_tail = &after_marker[open + 1..];
    let close = value_and_tail
        .find('"')
        .ok_or_else(|| not_found("unterminated og:image value"))?;
    Ok(&value_and_tail[..close])
}

fn resolve(raw: &str, base: Option<&Url>) -> Result<Url, FetchError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(not_found("og:image value is empty"));
    }
    match (Url::parse(raw), base) {
        (Ok(url), _) => Ok(url),
        (Err(url::ParseError::RelativeUrlWithoutBase), Some(base)) => {
            base.join(raw).map_err(|err| url_parse(raw, err))
        }
        (Err(err), _) => Err(url_parse(raw, err)),
    }
}

fn not_found(message: &str) -> FetchError {
    FetchError::new(FailureKind::Extraction, message)
}

fn url_parse(raw: &str, err: url::ParseError) -> FetchError {
    FetchError::new(FailureKind::UrlParse, format!("{raw:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GITHUB_HEAD: &str = r#"<html><head>
        <meta property="og:title" content="owner/repo">
        <meta property="og:image" content="https://opengraph.githubassets.com/abc/owner/repo">
        </head><body></body></html>"#;

    fn both() -> [Box<dyn PreviewExtractor>; 2] {
        [Box::new(MetaTagExtractor), Box::new(MarkerScanExtractor)]
    }

    #[test]
    fn extracts_exact_url() {
        for extractor in both() {
            let url = extractor.extract(GITHUB_HEAD, None).unwrap();
            assert_eq!(
                url.as_str(),
                "https://opengraph.githubassets.com/abc/owner/repo"
            );
        }
    }

    #[test]
    fn missing_property_is_extraction_error() {
        let html = "<html><head><title>x</title></head></html>";
        for extractor in both() {
            let err = extractor.extract(html, None).unwrap_err();
            assert_eq!(err.kind, FailureKind::Extraction);
        }
    }

    #[test]
    fn marker_without_following_value_is_checked() {
        for html in [r#"<meta property="og:image">"#, r#"<meta property="og:image"/></head>"#] {
            let err = MarkerScanExtractor.extract(html, None).unwrap_err();
            assert_eq!(err.kind, FailureKind::Extraction, "input {html:?}");
            assert_eq!(err.message, "no opening quote after og:image marker");
        }
    }

    #[test]
    fn truncated_document_is_checked() {
        // Input ends inside the marker or inside the quoted value.
        for html in [
            r#"<meta property="og:image"#,
            r#"<meta property="og:image""#,
            r#"<meta property="og:image" content="https://x.example/im"#,
        ] {
            let err = MarkerScanExtractor.extract(html, None).unwrap_err();
            assert_eq!(err.kind, FailureKind::Extraction, "input {html:?}");
        }
    }

    #[test]
    fn meta_tag_extractor_ignores_attribute_order() {
        let html = r#"<meta content="https://img.example/a.png" property="og:image">"#;
        let url = MetaTagExtractor.extract(html, None).unwrap();
        assert_eq!(url.as_str(), "https://img.example/a.png");
    }

    #[test]
    fn meta_tag_extractor_falls_back_to_name_attribute() {
        let html = r#"<meta name="og:image" content="https://img.example/b.png">"#;
        let url = MetaTagExtractor.extract(html, None).unwrap();
        assert_eq!(url.host_str(), Some("img.example"));
    }

    #[test]
    fn relative_value_resolves_against_page() {
        let html = r#"<meta property="og:image" content="/social.png">"#;
        let base = Url::parse("https://github.com/owner/repo").unwrap();
        for extractor in both() {
            let url = extractor.extract(html, Some(&base)).unwrap();
            assert_eq!(url.as_str(), "https://github.com/social.png");
        }
    }

    #[test]
    fn relative_value_without_base_is_url_parse_error() {
        let html = r#"<meta property="og:image" content="/social.png">"#;
        let err = MetaTagExtractor.extract(html, None).unwrap_err();
        assert_eq!(err.kind, FailureKind::UrlParse);
    }

    #[test]
    fn malformed_url_is_url_parse_error() {
        let html = r#"<meta property="og:image" content="http://[::1">"#;
        for extractor in both() {
            let err = extractor.extract(html, None).unwrap_err();
            assert_eq!(err.kind, FailureKind::UrlParse);
        }
    }

    #[test]
    fn empty_value_is_extraction_error() {
        let html = r#"<meta property="og:image" content="  ">"#;
        for extractor in both() {
            let err = extractor.extract(html, None).unwrap_err();
            assert_eq!(err.kind, FailureKind::Extraction);
        }
    }
}
