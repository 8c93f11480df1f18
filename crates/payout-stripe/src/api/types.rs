//! Stripe API type definitions
//!
//! Response objects for the subset of the Stripe v1 API used for Connect
//! payouts. See <https://docs.stripe.com/api> for the complete reference.
//!
//! ## Amount Handling
//!
//! Stripe reports every amount as an integer in the currency's smallest unit
//! (cents for EUR). Conversion to major units only happens at the reporting
//! edge, see [`to_major_units`].
//!
//! ## Payout States
//!
//! [`PayoutStatus`]: `pending`, `in_transit`, `paid`, `failed`, `canceled`

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Convert an amount in minor units (cents) to major units
pub fn to_major_units(amount_minor_units: i64) -> f64 {
    amount_minor_units as f64 / 100.0
}

/// A connected account
///
/// See <https://docs.stripe.com/api/accounts/object>
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Account {
    /// Account identifier (`acct_...`)
    pub id: String,
    /// Whether the account can create live charges
    #[serde(default)]
    pub charges_enabled: bool,
    /// Whether Stripe can send payouts to this account
    #[serde(default)]
    pub payouts_enabled: bool,
    /// Whether the account holder has submitted onboarding details
    #[serde(default)]
    pub details_submitted: bool,
    /// Two-letter country code
    #[serde(default)]
    pub country: Option<String>,
    /// Three-letter currency code, lowercase
    #[serde(default)]
    pub default_currency: Option<String>,
    /// Account holder email
    #[serde(default)]
    pub email: Option<String>,
    /// Business type (`individual`, `company`, ...)
    #[serde(default)]
    pub business_type: Option<String>,
    /// Outstanding verification requirements
    #[serde(default)]
    pub requirements: Option<Requirements>,
}

/// Outstanding verification items of a connected account
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Requirements {
    /// Fields that must be collected now to keep the account enabled
    #[serde(default)]
    pub currently_due: Vec<String>,
    /// Fields that will be required eventually
    #[serde(default)]
    pub eventually_due: Vec<String>,
    /// Fields whose deadline has passed
    #[serde(default)]
    pub past_due: Vec<String>,
    /// Fields being verified by Stripe
    #[serde(default)]
    pub pending_verification: Vec<String>,
    /// Why the account is disabled, e.g. `requirements.past_due` or `rejected.fraud`
    #[serde(default)]
    pub disabled_reason: Option<String>,
}

impl Requirements {
    /// Whether Stripe rejected the account outright
    pub fn is_rejected(&self) -> bool {
        self.disabled_reason
            .as_deref()
            .is_some_and(|reason| reason.starts_with("rejected."))
    }
}

/// A transfer from the platform balance to a connected account
///
/// See <https://docs.stripe.com/api/transfers/object>
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Transfer {
    /// Transfer identifier (`tr_...`)
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code, lowercase
    pub currency: String,
    /// Destination connected account
    #[serde(default)]
    pub destination: Option<String>,
    /// Arbitrary description
    #[serde(default)]
    pub description: Option<String>,
    /// Key/value metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Unix creation time
    #[serde(default)]
    pub created: i64,
}

/// Payout state
///
/// **Payout states:**
/// - `pending` - Submitted, not yet sent to the bank
/// - `in_transit` - Sent to the bank
/// - `paid` - Arrived in the bank account
/// - `failed` - Bank rejected the payout
/// - `canceled` - Payout was canceled
///
/// See <https://docs.stripe.com/api/payouts/object#payout_object-status>
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    /// Submitted, not yet sent to the bank
    Pending,
    /// Sent to the bank
    InTransit,
    /// Arrived in the bank account
    Paid,
    /// Bank rejected the payout
    Failed,
    /// Payout was canceled
    Canceled,
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "pending"),
            PayoutStatus::InTransit => write!(f, "in_transit"),
            PayoutStatus::Paid => write!(f, "paid"),
            PayoutStatus::Failed => write!(f, "failed"),
            PayoutStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Payout timing
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutMethod {
    /// Regular bank transfer timing
    #[default]
    Standard,
    /// Instant payout to a debit card or eligible bank account
    Instant,
}

impl fmt::Display for PayoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayoutMethod::Standard => write!(f, "standard"),
            PayoutMethod::Instant => write!(f, "instant"),
        }
    }
}

/// A payout from a connected account balance to its bank account
///
/// See <https://docs.stripe.com/api/payouts/object>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Payout {
    /// Payout identifier (`po_...`)
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code, lowercase
    pub currency: String,
    /// Current payout state
    pub status: PayoutStatus,
    /// Expected arrival (unix time)
    #[serde(default)]
    pub arrival_date: Option<i64>,
    /// Arbitrary description
    #[serde(default)]
    pub description: Option<String>,
    /// Failure code when `status` is `failed`
    #[serde(default)]
    pub failure_code: Option<String>,
    /// Failure message when `status` is `failed`
    #[serde(default)]
    pub failure_message: Option<String>,
    /// Payout timing
    #[serde(default)]
    pub method: Option<PayoutMethod>,
    /// Text on the payee's bank statement
    #[serde(default)]
    pub statement_descriptor: Option<String>,
    /// Key/value metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Unix creation time
    #[serde(default)]
    pub created: i64,
}

/// Account balance
///
/// See <https://docs.stripe.com/api/balance/balance_object>
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Balance {
    /// Funds available for transfers or payouts
    #[serde(default)]
    pub available: Vec<BalanceAmount>,
    /// Funds not yet available
    #[serde(default)]
    pub pending: Vec<BalanceAmount>,
    /// Whether this is a live-mode balance
    #[serde(default)]
    pub livemode: bool,
}

/// One currency bucket of a [`Balance`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BalanceAmount {
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code, lowercase
    pub currency: String,
    /// Breakdown by source type (`card`, `bank_account`, ...)
    #[serde(default)]
    pub source_types: Option<HashMap<String, i64>>,
}

/// Hosted onboarding link
///
/// See <https://docs.stripe.com/api/account_links/object>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountLink {
    /// URL the payee visits
    pub url: String,
    /// Unix time the link expires
    #[serde(default)]
    pub expires_at: i64,
    /// Unix creation time
    #[serde(default)]
    pub created: i64,
}

/// A charge against a payment source
///
/// See <https://docs.stripe.com/api/charges/object>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Charge {
    /// Charge identifier (`ch_...`)
    pub id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code, lowercase
    pub currency: String,
    /// `succeeded`, `pending` or `failed`
    pub status: String,
    /// Whether the charge succeeded
    #[serde(default)]
    pub paid: bool,
}

/// Paginated list wrapper
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct List<T> {
    /// Page items
    pub data: Vec<T>,
    /// Whether more items exist beyond this page
    #[serde(default)]
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_major_units() {
        assert_eq!(to_major_units(150), 1.5);
        assert_eq!(to_major_units(100_000_000), 1_000_000.0);
        assert_eq!(to_major_units(0), 0.0);
    }

    #[test]
    fn test_payout_status_wire_names() {
        let status: PayoutStatus = serde_json::from_str("\"in_transit\"").unwrap();
        assert_eq!(status, PayoutStatus::InTransit);
        assert_eq!(status.to_string(), "in_transit");
        assert!(serde_json::from_str::<PayoutStatus>("\"exploded\"").is_err());
    }

    #[test]
    fn test_account_defaults() {
        let account: Account = serde_json::from_str(r#"{"id":"acct_1"}"#).unwrap();
        assert!(!account.charges_enabled);
        assert!(!account.payouts_enabled);
        assert!(account.requirements.is_none());
    }

    #[test]
    fn test_rejected_requirements() {
        let requirements = Requirements {
            disabled_reason: Some("rejected.fraud".to_string()),
            ..Default::default()
        };
        assert!(requirements.is_rejected());

        let requirements = Requirements {
            disabled_reason: Some("requirements.past_due".to_string()),
            ..Default::default()
        };
        assert!(!requirements.is_rejected());
    }
}
