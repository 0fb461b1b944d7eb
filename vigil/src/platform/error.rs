//! Platform API failure classification.

use thiserror::Error;

/// Classified failures from the broadcast-visibility API.
///
/// None of these are allowed to crash the controller; callers translate
/// them into alerts and degraded-mode decisions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The refresh token has expired or been revoked; useless until an
    /// operator regenerates it.
    #[error("refresh token expired: {0}")]
    CredentialExpired(String),

    /// Client id/secret (or the token itself) were rejected outright.
    #[error("credentials rejected: {0}")]
    CredentialInvalid(String),

    /// The token is valid but lacks the broadcast-management scope.
    #[error("insufficient token scope: {0}")]
    InsufficientScope(String),

    /// Anything else: transport failures, rate limits, server errors. May
    /// clear on its own by the next reconciliation.
    #[error("platform API error: {0}")]
    Api(String),
}

impl PlatformError {
    /// Terminal failures stay broken until an operator fixes configuration;
    /// retrying them silently only burns quota.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Api(_))
    }

    /// Classify a non-success HTTP response.
    pub fn classify(status: u16, body: &str) -> Self {
        let detail = error_detail(body);
        match status {
            400 if body.contains("invalid_grant") || body.contains("Token has been expired") => {
                Self::CredentialExpired(detail)
            }
            400 if body.contains("invalid_client") => Self::CredentialInvalid(detail),
            401 => Self::CredentialInvalid(detail),
            403 if body.contains("insufficientPermissions")
                || body.contains("ACCESS_TOKEN_SCOPE_INSUFFICIENT") =>
            {
                Self::InsufficientScope(detail)
            }
            _ => Self::Api(format!("HTTP {status}: {detail}")),
        }
    }

    /// Wrap a transport-level failure.
    pub fn transport(e: reqwest::Error) -> Self {
        Self::Api(e.to_string())
    }
}

/// Pull the most specific human-readable message out of an error body.
///
/// The token endpoint uses `error_description`/`error`; the data API nests
/// `error.message`. Unparseable bodies are passed through truncated.
fn error_detail(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(description) = parsed["error_description"].as_str() {
            return description.to_string();
        }
        if let Some(message) = parsed["error"]["message"].as_str() {
            return message.to_string();
        }
        if let Some(code) = parsed["error"].as_str() {
            return code.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.chars().count() > 200 {
        let clipped: String = trimmed.chars().take(200).collect();
        format!("{clipped}…")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_with_invalid_grant_is_expired() {
        let err = PlatformError::classify(
            400,
            r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
        );
        assert_eq!(
            err,
            PlatformError::CredentialExpired("Token has been expired or revoked.".into())
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn bad_request_with_invalid_client_is_invalid_credentials() {
        let err = PlatformError::classify(400, r#"{"error":"invalid_client"}"#);
        assert!(matches!(err, PlatformError::CredentialInvalid(_)));
    }

    #[test]
    fn unauthorized_is_invalid_credentials() {
        let err = PlatformError::classify(401, "");
        assert!(matches!(err, PlatformError::CredentialInvalid(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn forbidden_with_scope_marker_is_insufficient_scope() {
        let body = r#"{"error":{"message":"Request had insufficient authentication scopes.","status":"ACCESS_TOKEN_SCOPE_INSUFFICIENT"}}"#;
        let err = PlatformError::classify(403, body);
        assert_eq!(
            err,
            PlatformError::InsufficientScope(
                "Request had insufficient authentication scopes.".into()
            )
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn other_failures_are_generic_and_retryable() {
        for status in [400u16, 403, 429, 500, 503] {
            let err = PlatformError::classify(status, "backend unavailable");
            if status == 400 || status == 403 {
                // Without the marker strings these fall through to generic.
                assert!(matches!(err, PlatformError::Api(_)), "status {status}");
            }
            if matches!(err, PlatformError::Api(_)) {
                assert!(!err.is_terminal());
            }
        }
    }

    #[test]
    fn detail_prefers_error_description() {
        let err = PlatformError::classify(
            500,
            r#"{"error_description":"boom","error":{"message":"nested"}}"#,
        );
        assert_eq!(err, PlatformError::Api("HTTP 500: boom".into()));
    }

    #[test]
    fn detail_falls_back_to_nested_message() {
        let err = PlatformError::classify(500, r#"{"error":{"message":"nested"}}"#);
        assert_eq!(err, PlatformError::Api("HTTP 500: nested".into()));
    }
}
