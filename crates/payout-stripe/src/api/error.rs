//! Stripe API error types
//!
//! See <https://docs.stripe.com/api/errors> for the complete error reference.
//!
//! # Error Handling
//!
//! The Stripe API uses standard HTTP response codes:
//! - 2xx: Success
//! - 4xx: Client errors (invalid parameters, missing resources, card declines, etc.)
//! - 5xx: Server errors
//!
//! Error responses follow this JSON structure:
//!
//! ```json
//! {
//!   "error": {
//!     "type": "invalid_request_error",
//!     "code": "resource_missing",
//!     "message": "No such account: 'acct_123'",
//!     "param": "account"
//!   }
//! }
//! ```
//!
//! Use [`Error::is_retryable()`] to check if a failure is transient. Account
//! creation is never retried inside this crate, the hint is for callers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stripe API error
#[derive(Debug, Error)]
pub enum Error {
    /// Resource not found (404 or `resource_missing`)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The call did not complete within the per-call deadline
    #[error("Gateway call timed out after {0} ms")]
    Timeout(u64),

    /// Stripe API returned an error response
    #[error("Stripe API error ({status}): {error}")]
    Api {
        /// HTTP status of the response
        status: u16,
        /// Decoded error body
        error: StripeApiError,
    },
}

impl Error {
    /// Check if this error means the requested object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Api { status, error } => *status == 404 || error.is_resource_missing(),
            _ => false,
        }
    }

    /// Check if this error is transient and the call may succeed on retry
    ///
    /// Returns `true` for:
    /// - Timeouts and connection failures
    /// - Rate limiting (429) and lock timeouts
    /// - Server errors (5xx)
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) => true,
            Error::Reqwest(e) => e.is_timeout() || e.is_connect(),
            Error::Api { status, error } => {
                *status == 429 || *status >= 500 || error.is_retryable()
            }
            _ => false,
        }
    }
}

/// Envelope around a Stripe error response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StripeErrorResponse {
    /// Error details
    pub error: StripeApiError,
}

/// Detailed Stripe API error
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Error)]
#[error("{}", self.message.as_deref().unwrap_or("unknown error"))]
pub struct StripeApiError {
    /// Error category
    #[serde(rename = "type")]
    pub error_type: StripeErrorType,
    /// Short machine-readable code (e.g. `resource_missing`)
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// The parameter the error relates to
    #[serde(default)]
    pub param: Option<String>,
    /// Decline code for card errors
    #[serde(default)]
    pub decline_code: Option<String>,
}

impl StripeApiError {
    /// Check if the error code reports a missing object
    pub fn is_resource_missing(&self) -> bool {
        matches!(
            self.code.as_deref(),
            Some("resource_missing") | Some("account_invalid")
        )
    }

    /// Check if the error code reports a transient condition
    pub fn is_retryable(&self) -> bool {
        matches!(self.error_type, StripeErrorType::ApiError)
            || matches!(
                self.code.as_deref(),
                Some("lock_timeout") | Some("rate_limit")
            )
    }
}

/// Stripe error categories
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StripeErrorType {
    /// Problems with Stripe's servers
    ApiError,
    /// Card could not be charged
    CardError,
    /// Idempotency key reused with different parameters
    IdempotencyError,
    /// Invalid parameters
    InvalidRequestError,
    /// Unknown error category
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_body() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such account: 'acct_1'","param":"account"}}"#;
        let decoded: StripeErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.error.error_type, StripeErrorType::InvalidRequestError);
        assert!(decoded.error.is_resource_missing());
        assert_eq!(decoded.error.to_string(), "No such account: 'acct_1'");
    }

    #[test]
    fn test_retryable_classification() {
        let api_error = StripeApiError {
            error_type: StripeErrorType::ApiError,
            code: None,
            message: None,
            param: None,
            decline_code: None,
        };
        assert!(Error::Api {
            status: 500,
            error: api_error.clone()
        }
        .is_retryable());

        let invalid = StripeApiError {
            error_type: StripeErrorType::InvalidRequestError,
            code: Some("parameter_invalid_integer".to_string()),
            ..api_error
        };
        assert!(!Error::Api {
            status: 400,
            error: invalid.clone()
        }
        .is_retryable());
        assert!(Error::Api {
            status: 429,
            error: invalid
        }
        .is_retryable());
        assert!(Error::Timeout(100).is_retryable());
        assert!(!Error::NotFound("acct_1".to_string()).is_retryable());
    }

    #[test]
    fn test_unknown_error_type() {
        let body = r#"{"type":"something_new","message":"x"}"#;
        let decoded: StripeApiError = serde_json::from_str(body).unwrap();
        assert_eq!(decoded.error_type, StripeErrorType::Unknown);
    }
}
