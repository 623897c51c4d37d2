use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {code}: {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("timed out waiting for {0}")]
    OperationTimeout(String),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,

    #[error("long-running operation failed with status {status}: {code}: {message}")]
    OperationFailed {
        status: String,
        code: String,
        message: String,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::NotFound(_) => true,
            ApiError::ApiError { status, .. } => *status == 404,
            _ => false,
        }
    }
}

/// ARM error envelope: `{"error":{"code":"...","message":"..."}}`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: ErrorDetail,
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl ErrorEnvelope {
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_for_both_variants() {
        assert!(ApiError::NotFound("/x".into()).is_not_found());
        assert!(ApiError::ApiError {
            status: 404,
            code: "ResourceNotFound".into(),
            message: "gone".into(),
        }
        .is_not_found());
        assert!(!ApiError::RateLimited.is_not_found());
    }

    #[test]
    fn envelope_parses_arm_errors() {
        let envelope = ErrorEnvelope::parse(
            r#"{"error":{"code":"InvalidResourceReference","message":"bad ref"}}"#,
        );
        assert_eq!(envelope.error.code, "InvalidResourceReference");
        assert_eq!(envelope.error.message, "bad ref");

        let envelope = ErrorEnvelope::parse("<html>oops</html>");
        assert!(envelope.error.code.is_empty());
    }

    #[test]
    fn api_error_display_includes_status_and_code() {
        let error = ApiError::ApiError {
            status: 400,
            code: "BadRequest".into(),
            message: "frontend port in use".into(),
        };
        let text = error.to_string();
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("BadRequest"));
    }
}
