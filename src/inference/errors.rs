//! Gateway error types.

use thiserror::Error;

/// Errors from the model gateway.
///
/// `is_transient` decides which of these the retry loop is allowed to
/// swallow; everything else surfaces immediately.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// TCP/TLS connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The endpoint did not answer within the per-attempt timeout.
    #[error("request timed out after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body did not match the completion shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The first choice carried neither answer text nor a tool call.
    #[error("model returned an empty turn")]
    EmptyTurn,

    /// Transient failures persisted through every allowed attempt.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Gateway configuration problem (missing API key, bad endpoint).
    #[error("gateway config error: {reason}")]
    ConfigError { reason: String },
}

impl GatewayError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Connection failures, timeouts, rate limiting (429) and server-side
    /// errors (5xx) are transient. Other HTTP statuses, malformed bodies,
    /// and config problems fail the call immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::ConnectionFailed { .. }
                | GatewayError::Timeout { .. }
                | GatewayError::HttpError { status: 429, .. }
                | GatewayError::HttpError {
                    status: 500..=599,
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_are_transient() {
        let connect = GatewayError::ConnectionFailed {
            endpoint: "https://api.openai.com/v1".into(),
            reason: "connection refused".into(),
        };
        let timeout = GatewayError::Timeout { duration_secs: 90 };
        assert!(connect.is_transient());
        assert!(timeout.is_transient());
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        let rate_limited = GatewayError::HttpError {
            status: 429,
            body: "slow down".into(),
        };
        let unavailable = GatewayError::HttpError {
            status: 503,
            body: "overloaded".into(),
        };
        assert!(rate_limited.is_transient());
        assert!(unavailable.is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let unauthorized = GatewayError::HttpError {
            status: 401,
            body: "bad key".into(),
        };
        let not_found = GatewayError::HttpError {
            status: 404,
            body: "no such model".into(),
        };
        assert!(!unauthorized.is_transient());
        assert!(!not_found.is_transient());
    }

    #[test]
    fn test_malformed_and_empty_are_not_transient() {
        let malformed = GatewayError::MalformedResponse {
            reason: "no choices".into(),
        };
        assert!(!malformed.is_transient());
        assert!(!GatewayError::EmptyTurn.is_transient());
    }

    #[test]
    fn test_error_messages_are_lowercase_and_specific() {
        let err = GatewayError::HttpError {
            status: 500,
            body: "internal".into(),
        };
        assert_eq!(err.to_string(), "HTTP 500: internal");
        let err = GatewayError::Timeout { duration_secs: 90 };
        assert!(err.to_string().contains("90s"));
    }
}
