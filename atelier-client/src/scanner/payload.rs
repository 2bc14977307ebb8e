//! Recognizes the payload formats the approval flow accepts.

use atelier_model::{ScanResult, ScanToken};
use serde_json::Value;
use url::Url;

use super::errors::ScannerError;

const TOKEN_KEYS: [&str; 2] = ["qrToken", "token"];
const URL_TOKEN_SEGMENT: &str = "v";

/// Parse decoded QR text.
///
/// Accepted forms:
/// - a JSON object with a string `qrToken` (or `token`) and an optional
///   string `redirect`;
/// - an http(s) URL whose path is exactly `/v/<token>`.
pub fn parse_scan_payload(raw: &str) -> Result<ScanResult, ScannerError> {
    let text = raw.trim();
    let parsed = if text.starts_with('{') {
        parse_json(text)
    } else {
        parse_url(text)
    };

    parsed.ok_or_else(|| ScannerError::Unrecognized {
        raw: raw.to_string(),
    })
}

fn parse_json(text: &str) -> Option<ScanResult> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    let token = TOKEN_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .and_then(|token| ScanToken::new(token).ok())?;
    let redirect = object
        .get("redirect")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|redirect| !redirect.is_empty())
        .map(str::to_string);

    Some(ScanResult {
        raw: text.to_string(),
        token,
        redirect,
    })
}

fn parse_url(text: &str) -> Option<ScanResult> {
    let url = Url::parse(text).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let mut segments = url.path_segments()?;
    if segments.next()? != URL_TOKEN_SEGMENT {
        return None;
    }
    let token = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    Some(ScanResult {
        raw: text.to_string(),
        token: ScanToken::new(token).ok()?,
        redirect: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_payload_with_qr_token() {
        let scan = parse_scan_payload(r#"{"qrToken":"abc123"}"#).unwrap();
        assert_eq!(scan.token.as_str(), "abc123");
        assert_eq!(scan.redirect, None);
    }

    #[test]
    fn json_payload_accepts_token_alias_and_redirect() {
        let scan =
            parse_scan_payload(r#"{"token":"t-1","redirect":"/studio"}"#).unwrap();
        assert_eq!(scan.token.as_str(), "t-1");
        assert_eq!(scan.redirect.as_deref(), Some("/studio"));
    }

    #[test]
    fn url_payload_with_exact_path() {
        let scan = parse_scan_payload("https://host/v/xyz789").unwrap();
        assert_eq!(scan.token.as_str(), "xyz789");
        assert!(parse_scan_payload("http://host/v/xyz789").is_ok());
    }

    #[test]
    fn url_payload_rejects_other_shapes() {
        for text in [
            "https://host/v/",
            "https://host/v/a/b",
            "https://host/x/abc",
            "https://host/v",
            "ftp://host/v/abc",
        ] {
            assert!(parse_scan_payload(text).is_err(), "{text} should be rejected");
        }
    }

    #[test]
    fn garbage_is_unrecognized_with_raw_text() {
        assert_eq!(
            parse_scan_payload("not-json-or-url"),
            Err(ScannerError::Unrecognized {
                raw: "not-json-or-url".to_string()
            })
        );
        assert!(parse_scan_payload(r#"{"qrToken":42}"#).is_err());
        assert!(parse_scan_payload(r#"{"qrToken":"  "}"#).is_err());
        assert!(parse_scan_payload("[1,2]").is_err());
    }
}
