//! Error for the payout backend

use crate::api::error::Error as StripeApiError;
use thiserror::Error;

/// Payout Error
#[derive(Debug, Error)]
pub enum Error {
    /// Amount outside the transferable range
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount {
        /// Requested amount in minor units
        amount: i64,
        /// Which bound was violated
        reason: String,
    },
    /// IBAN failed the format or checksum test
    #[error("Invalid IBAN")]
    InvalidIban,
    /// Currency differs from the configured one
    #[error("Unsupported currency {requested}, expected {expected}")]
    UnsupportedCurrency {
        /// Currency in the request
        requested: String,
        /// Configured currency
        expected: String,
    },
    /// Connected account lacks a capability needed for the transfer
    #[error("Account {account_id} not ready (charges_enabled: {charges_enabled}, payouts_enabled: {payouts_enabled})")]
    AccountNotReady {
        /// Connected account
        account_id: String,
        /// Charges capability state
        charges_enabled: bool,
        /// Payouts capability state
        payouts_enabled: bool,
    },
    /// Connected account unknown to the processor
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    /// Transfer succeeded but the payout failed; funds sit in the connected account
    #[error("Transfer {transfer_id} of {amount} to {account_id} succeeded but payout failed: {source}")]
    PartialTransfer {
        /// Completed transfer
        transfer_id: String,
        /// Destination account
        account_id: String,
        /// Transferred amount in minor units
        amount: i64,
        /// Payout failure
        #[source]
        source: Box<Error>,
    },
    /// Webhook signature does not match the payload
    #[error("Webhook signature mismatch: {0}")]
    SignatureMismatch(String),
    /// Webhook timestamp outside the tolerance window
    #[error("Webhook timestamp {timestamp} outside tolerance of {tolerance_secs}s")]
    Stale {
        /// Timestamp from the signature header
        timestamp: i64,
        /// Allowed skew
        tolerance_secs: u64,
    },
    /// Webhook payload is not a valid event
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
    /// Operation only permitted against the processor's test mode
    #[error("Operation only available in sandbox mode")]
    SandboxOnly,
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Stripe API error
    #[error(transparent)]
    Gateway(#[from] StripeApiError),
    /// Anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Whether repeating the same call may succeed
    ///
    /// A [`Error::PartialTransfer`] is never retryable as a whole, only the
    /// payout step may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Gateway(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Id of a transfer that already moved funds, if any
    pub fn transfer_id(&self) -> Option<&str> {
        match self {
            Error::PartialTransfer { transfer_id, .. } => Some(transfer_id),
            _ => None,
        }
    }

    /// Whether this error rejects an inbound webhook
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(
            self,
            Error::SignatureMismatch(_) | Error::Stale { .. } | Error::MalformedPayload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_transfer_surface() {
        let err = Error::PartialTransfer {
            transfer_id: "tr_1".to_string(),
            account_id: "acct_1".to_string(),
            amount: 150,
            source: Box::new(Error::Gateway(StripeApiError::Timeout(10))),
        };

        assert_eq!(err.transfer_id(), Some("tr_1"));
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("tr_1"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_retryable_gateway() {
        assert!(Error::Gateway(StripeApiError::Timeout(10)).is_retryable());
        assert!(!Error::InvalidIban.is_retryable());
        assert!(Error::MalformedPayload("x".to_string()).is_webhook_rejection());
        assert!(!Error::SandboxOnly.is_webhook_rejection());
    }
}
