//! Payout orchestration
//!
//! Moves money from the platform to a payee's bank in two phases:
//!
//! 1. a transfer from the platform balance to the connected account
//! 2. a payout from the connected account balance to its bank account
//!
//! The transfer is the authoritative record that funds left the platform. If
//! the payout fails afterwards the transfer id is surfaced in
//! [`Error::PartialTransfer`] and only the payout may be retried, see
//! [`PayoutOrchestrator::retry_payout`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::types::{
    to_major_units, Account, BalanceAmount, Payout, PayoutMethod, PayoutStatus,
};
use crate::api::is_live_key;
use crate::config::{Environment, PayoutConfig};
use crate::error::Error;
use crate::gateway::{CreatePayoutRequest, CreateTransferRequest, DynProcessorGateway};
use crate::validate::validate_amount;
use crate::with_timeout;

/// Number of payouts returned by [`PayoutOrchestrator::list_payouts`] by default
pub const DEFAULT_PAYOUT_LIST_LIMIT: u32 = 10;

const DEFAULT_TRANSFER_DESCRIPTION: &str = "Payout transfer";

/// Request to move funds to a payee's bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Connected account receiving the funds
    pub destination_account_id: String,
    /// Amount in minor units
    pub amount_minor_units: i64,
    /// Three-letter currency code; must match the configured currency
    pub currency: String,
    /// Transfer description, `Payout transfer` when absent
    #[serde(default)]
    pub description: Option<String>,
    /// Text on the payee's bank statement, configured default when absent
    #[serde(default)]
    pub statement_descriptor: Option<String>,
    /// Key/value metadata attached to both transfer and payout
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Caller key for duplicate protection on network retries
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl TransferRequest {
    /// Request with no description, descriptor, metadata or idempotency key
    pub fn new(
        destination_account_id: impl Into<String>,
        amount_minor_units: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            destination_account_id: destination_account_id.into(),
            amount_minor_units,
            currency: currency.into(),
            description: None,
            statement_descriptor: None,
            metadata: HashMap::new(),
            idempotency_key: None,
        }
    }
}

/// Outcome of a completed transfer and payout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Transfer id (`tr_...`)
    pub transfer_id: String,
    /// Payout id (`po_...`)
    pub payout_id: String,
    /// Destination account
    pub account_id: String,
    /// Amount in minor units
    pub amount_minor_units: i64,
    /// Three-letter currency code
    pub currency: String,
    /// Payout status at creation
    pub status: PayoutStatus,
    /// Expected arrival at the bank (unix time)
    pub arrival_date: Option<i64>,
}

impl TransferResult {
    /// Amount in major units
    pub fn amount(&self) -> f64 {
        to_major_units(self.amount_minor_units)
    }
}

/// Payout projection for humans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutStatusReport {
    /// Payout id
    pub payout_id: String,
    /// Current status
    pub status: PayoutStatus,
    /// Amount in major units
    pub amount: f64,
    /// Three-letter currency code
    pub currency: String,
    /// Expected arrival at the bank (unix time)
    pub arrival_date: Option<i64>,
    /// Payout method
    pub method: Option<PayoutMethod>,
    /// Payout description
    pub description: Option<String>,
    /// Failure code when the payout failed
    pub failure_code: Option<String>,
    /// Failure message when the payout failed
    pub failure_message: Option<String>,
    /// Unix creation time
    pub created: i64,
}

impl From<Payout> for PayoutStatusReport {
    fn from(payout: Payout) -> Self {
        Self {
            amount: to_major_units(payout.amount),
            payout_id: payout.id,
            status: payout.status,
            currency: payout.currency,
            arrival_date: payout.arrival_date,
            method: payout.method,
            description: payout.description,
            failure_code: payout.failure_code,
            failure_message: payout.failure_message,
            created: payout.created,
        }
    }
}

/// One currency bucket of a [`BalanceReport`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceEntry {
    /// Amount in major units
    pub amount: f64,
    /// Three-letter currency code
    pub currency: String,
    /// Breakdown by source type in major units, when the processor reports one
    pub source_types: Option<HashMap<String, f64>>,
}

impl From<BalanceAmount> for BalanceEntry {
    fn from(amount: BalanceAmount) -> Self {
        Self {
            amount: to_major_units(amount.amount),
            currency: amount.currency,
            source_types: amount.source_types.map(|types| {
                types
                    .into_iter()
                    .map(|(source, amount)| (source, to_major_units(amount)))
                    .collect()
            }),
        }
    }
}

/// Platform balance in major units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Funds available for transfers
    pub available: Vec<BalanceEntry>,
    /// Funds not yet available
    pub pending: Vec<BalanceEntry>,
    /// Whether this is a live-mode balance
    pub livemode: bool,
}

/// Payout orchestrator
///
/// Holds only read-only configuration; concurrent calls share nothing
/// mutable. Two concurrent [`send_money`](Self::send_money) calls for the same
/// destination are not deduplicated here, pass an idempotency key.
#[derive(Clone)]
pub struct PayoutOrchestrator {
    gateway: DynProcessorGateway,
    currency: String,
    default_statement_descriptor: String,
    environment: Environment,
    live_key: bool,
    call_timeout: Duration,
}

impl std::fmt::Debug for PayoutOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayoutOrchestrator")
            .field("currency", &self.currency)
            .field(
                "default_statement_descriptor",
                &self.default_statement_descriptor,
            )
            .field("environment", &self.environment)
            .field("live_key", &self.live_key)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl PayoutOrchestrator {
    /// Create an orchestrator from validated configuration
    pub fn new(gateway: DynProcessorGateway, config: &PayoutConfig) -> Result<Self, Error> {
        Ok(Self {
            gateway,
            currency: config.currency.to_lowercase(),
            default_statement_descriptor: config.default_statement_descriptor.clone(),
            environment: config.environment()?,
            live_key: is_live_key(&config.secret_key),
            call_timeout: config.call_timeout(),
        })
    }

    /// Transfer funds to a connected account and pay them out to its bank
    pub async fn send_money(&self, request: &TransferRequest) -> Result<TransferResult, Error> {
        self.check_request(request)?;
        let account_id = request.destination_account_id.as_str();
        self.ready_account(account_id).await?;

        let transfer = CreateTransferRequest {
            destination: account_id.to_string(),
            amount: request.amount_minor_units,
            currency: self.currency.clone(),
            description: request
                .description
                .clone()
                .unwrap_or_else(|| DEFAULT_TRANSFER_DESCRIPTION.to_string()),
            metadata: request.metadata.clone(),
            idempotency_key: request.idempotency_key.clone(),
        };

        let transfer =
            with_timeout(self.call_timeout, self.gateway.create_transfer(&transfer)).await?;
        info!(
            "Transfer {} of {} {} to {}",
            transfer.id, transfer.amount, transfer.currency, account_id
        );

        self.payout(request, transfer.id).await
    }

    /// Pay out funds an earlier transfer already moved to the connected account
    ///
    /// Use after [`Error::PartialTransfer`]. Amount and account readiness are
    /// checked again; no second transfer is issued. Stripe replays the stored
    /// response for a reused idempotency key, so give the request a fresh key
    /// if the failed attempt carried one.
    pub async fn retry_payout(
        &self,
        request: &TransferRequest,
        transfer_id: &str,
    ) -> Result<TransferResult, Error> {
        self.check_request(request)?;
        self.ready_account(&request.destination_account_id).await?;

        debug!(
            "Retrying payout for transfer {} to {}",
            transfer_id, request.destination_account_id
        );

        self.payout(request, transfer_id.to_string()).await
    }

    /// Current state of a payout
    pub async fn check_payout_status(
        &self,
        payout_id: &str,
        account_id: &str,
    ) -> Result<PayoutStatusReport, Error> {
        let payout = with_timeout(
            self.call_timeout,
            self.gateway.retrieve_payout(payout_id, account_id),
        )
        .await?;

        Ok(payout.into())
    }

    /// Most recent payouts of a connected account
    ///
    /// `limit` defaults to [`DEFAULT_PAYOUT_LIST_LIMIT`].
    pub async fn list_payouts(
        &self,
        account_id: &str,
        limit: Option<u32>,
    ) -> Result<Vec<PayoutStatusReport>, Error> {
        let limit = limit.unwrap_or(DEFAULT_PAYOUT_LIST_LIMIT);
        let list = with_timeout(
            self.call_timeout,
            self.gateway.list_payouts(account_id, limit),
        )
        .await?;

        Ok(list.data.into_iter().map(Into::into).collect())
    }

    /// Platform balance in major units
    pub async fn check_available_balance(&self) -> Result<BalanceReport, Error> {
        let balance = with_timeout(self.call_timeout, self.gateway.retrieve_balance()).await?;

        Ok(BalanceReport {
            available: balance.available.into_iter().map(Into::into).collect(),
            pending: balance.pending.into_iter().map(Into::into).collect(),
            livemode: balance.livemode,
        })
    }

    /// Credit the platform balance with a test charge that is available immediately
    #[cfg(feature = "sandbox")]
    pub async fn add_test_funds(
        &self,
        amount_minor_units: i64,
    ) -> Result<crate::api::types::Charge, Error> {
        use crate::gateway::TestChargeRequest;

        if !self.environment.is_sandbox() || self.live_key {
            warn!("Refusing test funding outside the sandbox");
            return Err(Error::SandboxOnly);
        }

        validate_amount(amount_minor_units)?;

        let request = TestChargeRequest {
            amount: amount_minor_units,
            currency: self.currency.clone(),
            source: "tok_bypassPending".to_string(),
            description: "Test funds for payout".to_string(),
            metadata: HashMap::from([("purpose".to_string(), "test_funding".to_string())]),
        };

        let charge = with_timeout(self.call_timeout, self.gateway.create_charge(&request)).await?;
        info!("Added test funds with charge {}", charge.id);

        Ok(charge)
    }

    /// Local checks that need no gateway call
    fn check_request(&self, request: &TransferRequest) -> Result<(), Error> {
        validate_amount(request.amount_minor_units)?;

        if !request.currency.eq_ignore_ascii_case(&self.currency) {
            return Err(Error::UnsupportedCurrency {
                requested: request.currency.clone(),
                expected: self.currency.clone(),
            });
        }

        Ok(())
    }

    /// Retrieve the destination and require both capabilities
    async fn ready_account(&self, account_id: &str) -> Result<Account, Error> {
        if account_id.trim().is_empty() {
            return Err(Error::AccountNotFound(account_id.to_string()));
        }

        let account = match with_timeout(
            self.call_timeout,
            self.gateway.retrieve_account(account_id),
        )
        .await
        {
            Ok(account) => account,
            Err(Error::Gateway(e)) if e.is_not_found() => {
                return Err(Error::AccountNotFound(account_id.to_string()))
            }
            Err(e) => return Err(e),
        };

        if !account.charges_enabled || !account.payouts_enabled {
            return Err(Error::AccountNotReady {
                account_id: account_id.to_string(),
                charges_enabled: account.charges_enabled,
                payouts_enabled: account.payouts_enabled,
            });
        }

        Ok(account)
    }

    async fn payout(
        &self,
        request: &TransferRequest,
        transfer_id: String,
    ) -> Result<TransferResult, Error> {
        let account_id = request.destination_account_id.as_str();

        let payout = CreatePayoutRequest {
            account_id: account_id.to_string(),
            amount: request.amount_minor_units,
            currency: self.currency.clone(),
            method: PayoutMethod::Standard,
            statement_descriptor: request
                .statement_descriptor
                .clone()
                .unwrap_or_else(|| self.default_statement_descriptor.clone()),
            metadata: request.metadata.clone(),
            idempotency_key: request.idempotency_key.clone(),
        };

        let payout = match with_timeout(self.call_timeout, self.gateway.create_payout(&payout)).await
        {
            Ok(payout) => payout,
            Err(err) => {
                warn!(
                    "Payout after transfer {} to {} failed: {}",
                    transfer_id, account_id, err
                );
                return Err(Error::PartialTransfer {
                    transfer_id,
                    account_id: account_id.to_string(),
                    amount: request.amount_minor_units,
                    source: Box::new(err),
                });
            }
        };

        info!(
            "Payout {} of {} {} from {} is {}",
            payout.id, payout.amount, payout.currency, account_id, payout.status
        );

        Ok(TransferResult {
            transfer_id,
            payout_id: payout.id,
            account_id: account_id.to_string(),
            amount_minor_units: payout.amount,
            currency: payout.currency,
            status: payout.status,
            arrival_date: payout.arrival_date,
        })
    }
}
