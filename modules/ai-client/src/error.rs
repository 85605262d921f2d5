use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No function call in response (expected `{0}`)")]
    MissingToolCall(String),
}

impl AiError {
    /// Rate limits, timeouts and dropped connections clear up on their own;
    /// everything else is a problem with the request or the response.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited { .. } | AiError::Timeout(_) | AiError::Connection(_)
        )
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::TOO_MANY_REQUESTS => AiError::RateLimited {
                status: status.as_u16(),
                message,
            },
            StatusCode::REQUEST_TIMEOUT => AiError::Timeout(message),
            _ => AiError::Api {
                status: status.as_u16(),
                message,
            },
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AiError::Timeout(e.to_string())
        } else if e.is_connect() {
            AiError::Connection(e.to_string())
        } else if e.is_decode() {
            AiError::Parse(e.to_string())
        } else if let Some(status) = e.status() {
            AiError::from_status(status, e.to_string())
        } else {
            // Body/request errors mid-flight surface as connection failures.
            AiError::Connection(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AiError {
    fn from(e: serde_json::Error) -> Self {
        AiError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_transient_rate_limit() {
        let err = AiError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, AiError::RateLimited { status: 429, .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn status_408_is_transient_timeout() {
        let err = AiError::from_status(StatusCode::REQUEST_TIMEOUT, "late");
        assert!(matches!(err, AiError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn other_statuses_are_not_transient() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            let err = AiError::from_status(status, "nope");
            assert!(matches!(err, AiError::Api { .. }), "{status}");
            assert!(!err.is_transient(), "{status}");
        }
    }

    #[test]
    fn structural_errors_are_not_transient() {
        assert!(!AiError::Parse("bad json".into()).is_transient());
        assert!(!AiError::MissingToolCall("set_labels".into()).is_transient());
        assert!(!AiError::Config("no key".into()).is_transient());
    }

    #[test]
    fn display_includes_status() {
        let err = AiError::from_status(StatusCode::BAD_GATEWAY, "upstream");
        assert_eq!(err.to_string(), "API error (502): upstream");
    }
}
