//! First pipeline stage: turns raw submitted text into a canonical manifest URL.
//!
//! Nothing here touches the network. The canonical form is the dedup key used
//! by the store, so two spellings of the same URL (`HTTPS://Example.org:443/...`
//! and `https://example.org/...`) end up on the same record.

use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AcceptError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("URI doesn't end in {0}")]
    InvalidPath(String),
}

/// A validated, normalized manifest URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Validates `raw` and returns its canonical form.
///
/// The `url` parser already lowercases scheme and host and drops a default
/// port; the fragment is removed here. The query string is kept since some
/// hosts serve raw files behind one.
pub fn accept(
    raw: &str,
    max_len: usize,
    required_suffix: &str,
) -> Result<CanonicalUrl, AcceptError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AcceptError::InvalidUrl("URL is empty".to_string()));
    }
    if raw.len() > max_len {
        return Err(AcceptError::InvalidUrl(format!(
            "URL is longer than {} characters",
            max_len
        )));
    }

    let mut url = Url::parse(raw).map_err(|e| AcceptError::InvalidUrl(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AcceptError::InvalidUrl(format!(
            "scheme '{}' is not allowed",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(AcceptError::InvalidUrl("URL has no host".to_string()));
    }

    url.set_fragment(None);

    if !url.path().ends_with(required_suffix) {
        return Err(AcceptError::InvalidPath(required_suffix.to_string()));
    }

    Ok(CanonicalUrl(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: &str = "/funding.json";

    #[test]
    fn accepts_manifest_url() {
        let url = accept("https://example.org/funding.json", 1024, SUFFIX).unwrap();
        assert_eq!(url.as_str(), "https://example.org/funding.json");
    }

    #[test]
    fn canonicalizes_case_port_and_fragment() {
        let url = accept("  HTTPS://Example.ORG:443/funding.json#top ", 1024, SUFFIX).unwrap();
        assert_eq!(url.as_str(), "https://example.org/funding.json");

        let url = accept("http://example.org:8080/a/funding.json?raw=1", 1024, SUFFIX).unwrap();
        assert_eq!(url.as_str(), "http://example.org:8080/a/funding.json?raw=1");
    }

    #[test]
    fn wrong_suffix_is_invalid_path() {
        assert_eq!(
            accept("https://example.org/notes.txt", 1024, SUFFIX),
            Err(AcceptError::InvalidPath(SUFFIX.to_string()))
        );
        // The suffix is matched against the path only, not the query.
        assert!(matches!(
            accept("https://example.org/x?f=/funding.json", 1024, SUFFIX),
            Err(AcceptError::InvalidPath(_))
        ));
    }

    #[test]
    fn rejects_bad_input() {
        for raw in [
            "",
            "   ",
            "not a url",
            "/funding.json",
            "ftp://example.org/funding.json",
            "file:///etc/funding.json",
            "mailto:someone@example.org",
        ] {
            assert!(
                matches!(accept(raw, 1024, SUFFIX), Err(AcceptError::InvalidUrl(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn enforces_length_bound() {
        let long = format!("https://example.org/{}/funding.json", "a".repeat(64));
        assert!(matches!(accept(&long, 32, SUFFIX), Err(AcceptError::InvalidUrl(_))));
        assert!(accept(&long, long.len(), SUFFIX).is_ok());
    }
}
