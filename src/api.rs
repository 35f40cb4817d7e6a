//! Wire types shared by the server handlers and the client flow.

use serde::{Deserialize, Serialize};

/// Format used when the client leaves the selector unset.
pub const DEFAULT_FORMAT: &str = "mp4";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format: String,
}

/// Response body of `POST /api/download`. Error responses from any endpoint
/// use the same shape with `ok: false` and `error` set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResponse {
    pub fn success(token: String) -> Self {
        Self {
            ok: true,
            token: Some(token),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            token: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_format_defaults_to_empty_when_absent() {
        let request: DownloadRequest = serde_json::from_str(r#"{"url":"https://x.test/v"}"#)
            .expect("body without format must parse");
        assert_eq!(request.url, "https://x.test/v");
        assert!(request.format.is_empty());
    }

    #[test]
    fn request_url_defaults_to_empty_when_absent() {
        let request: DownloadRequest = serde_json::from_str(r#"{"format":"mp4"}"#)
            .expect("body without url must parse");
        assert!(request.url.is_empty());
        assert_eq!(request.format, "mp4");
    }

    #[test]
    fn success_body_omits_the_error_field() {
        let body = serde_json::to_string(&DownloadResponse::success("abc 123".to_string()))
            .expect("serialize");
        assert_eq!(body, r#"{"ok":true,"token":"abc 123"}"#);
    }

    #[test]
    fn failure_body_omits_the_token_field() {
        let body =
            serde_json::to_string(&DownloadResponse::failure("Invalid URL")).expect("serialize");
        assert_eq!(body, r#"{"ok":false,"error":"Invalid URL"}"#);
    }
}
