//! Processor gateway abstraction
//!
//! This module defines the trait the payment processor must implement so the
//! onboarding tracker and the payout orchestrator can drive it. [`StripeApi`]
//! is the production implementation; tests substitute an in-memory one.
//!
//! [`StripeApi`]: crate::api::StripeApi

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::error::Error;
#[cfg(feature = "sandbox")]
use crate::api::types::Charge;
use crate::api::types::{Account, AccountLink, Balance, List, Payout, PayoutMethod, Transfer};

/// Shared handle to a gateway
pub type DynProcessorGateway = Arc<dyn ProcessorGateway>;

/// Payee date of birth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOfBirth {
    /// Day of month, 1-31
    pub day: u8,
    /// Month, 1-12
    pub month: u8,
    /// Four-digit year
    pub year: u16,
}

/// Payee postal address; the country comes from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street and number
    pub line1: String,
    /// Apartment, suite, etc.
    #[serde(default)]
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// Postal code
    pub postal_code: String,
    /// State or region
    #[serde(default)]
    pub state: Option<String>,
}

/// Payee bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    /// IBAN, whitespace allowed
    pub iban: String,
    /// BIC, optional for German accounts
    #[serde(default)]
    pub bic: Option<String>,
    /// Name of the account holder
    pub account_holder_name: String,
}

/// Identity and banking details of a payee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayeeProfile {
    /// Given name
    pub first_name: String,
    /// Family name
    pub last_name: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    #[serde(default)]
    pub phone: Option<String>,
    /// Date of birth
    pub date_of_birth: DateOfBirth,
    /// Postal address
    pub address: Address,
    /// Payout destination
    pub bank_account: BankAccount,
    /// Business type, `individual` when absent
    #[serde(default)]
    pub business_type: Option<String>,
}

/// Parameters for creating a connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountRequest {
    /// Two-letter country code
    pub country: String,
    /// Three-letter currency code of the external account
    pub currency: String,
    /// Payee details
    pub profile: PayeeProfile,
}

/// Parameters for moving funds from the platform to a connected account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransferRequest {
    /// Connected account receiving the funds
    pub destination: String,
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code
    pub currency: String,
    /// Description shown in the dashboard
    pub description: String,
    /// Key/value metadata
    pub metadata: HashMap<String, String>,
    /// Key guarding against duplicate creation on network retries
    pub idempotency_key: Option<String>,
}

/// Parameters for paying out a connected account balance to its bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePayoutRequest {
    /// Connected account whose balance is paid out
    pub account_id: String,
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code
    pub currency: String,
    /// Payout timing
    pub method: PayoutMethod,
    /// Text on the payee's bank statement
    pub statement_descriptor: String,
    /// Key/value metadata
    pub metadata: HashMap<String, String>,
    /// Key guarding against duplicate creation on network retries
    pub idempotency_key: Option<String>,
}

/// Parameters for an onboarding link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLinkRequest {
    /// Account to onboard
    pub account_id: String,
    /// Where the payee lands after finishing
    pub return_url: String,
    /// Where the payee lands when the link expired
    pub refresh_url: String,
}

/// Parameters for a test-mode charge
#[cfg(feature = "sandbox")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestChargeRequest {
    /// Amount in minor units
    pub amount: i64,
    /// Three-letter currency code
    pub currency: String,
    /// Test payment source token
    pub source: String,
    /// Description shown in the dashboard
    pub description: String,
    /// Key/value metadata
    pub metadata: HashMap<String, String>,
}

/// Payment processor capability set
///
/// Every remote call the crate makes goes through this trait. Implementations
/// must map "object does not exist" to an error for which
/// [`Error::is_not_found`] holds.
#[async_trait]
pub trait ProcessorGateway: Send + Sync {
    /// Create a connected account
    async fn create_account(&self, request: &CreateAccountRequest) -> Result<Account, Error>;

    /// Retrieve a connected account
    async fn retrieve_account(&self, account_id: &str) -> Result<Account, Error>;

    /// Move funds from the platform balance to a connected account
    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, Error>;

    /// Pay out a connected account balance to its bank account
    async fn create_payout(&self, request: &CreatePayoutRequest) -> Result<Payout, Error>;

    /// Retrieve a payout of a connected account
    async fn retrieve_payout(&self, payout_id: &str, account_id: &str) -> Result<Payout, Error>;

    /// List the most recent payouts of a connected account
    async fn list_payouts(&self, account_id: &str, limit: u32) -> Result<List<Payout>, Error>;

    /// Retrieve the platform balance
    async fn retrieve_balance(&self) -> Result<Balance, Error>;

    /// Issue a hosted onboarding link
    async fn create_account_link(&self, request: &AccountLinkRequest)
        -> Result<AccountLink, Error>;

    /// Charge a payment source on the platform account
    #[cfg(feature = "sandbox")]
    async fn create_charge(&self, request: &TestChargeRequest) -> Result<Charge, Error>;
}
