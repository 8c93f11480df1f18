//! Connected account onboarding
//!
//! Makes sure a payee has a connected account and reports whether it can
//! receive payouts. The tracker holds no state between calls: the caller
//! persists the returned account id against the payee and hands it back on
//! the next call.
//!
//! # Flow
//!
//! 1. Retrieve the cached account id, if any. A stale id (unknown to the
//!    processor) falls through to creation instead of failing the call.
//! 2. Otherwise create an express account from the payee profile. Terms of
//!    service are never accepted on the payee's behalf.
//! 3. If `details_submitted` or `payouts_enabled` is still false, issue a
//!    hosted onboarding link and report [`OnboardingState::OnboardingPending`].
//!    If the link cannot be issued the status still carries the account id,
//!    with no URL; fetch one later with [`AccountOnboarding::onboarding_link`].
//! 4. Otherwise report [`OnboardingState::PayoutsEnabled`].
//!
//! Account creation is never retried here, a blind retry could create a
//! second account for the same payee.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::types::{Account, Requirements};
use crate::error::Error;
use crate::gateway::{
    AccountLinkRequest, CreateAccountRequest, DynProcessorGateway, PayeeProfile,
};
use crate::validate::validate_german_iban;
use crate::with_timeout;

/// Onboarding state of a connected account
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingState {
    /// No account exists for the payee
    NotCreated,
    /// Account exists, payee has not started onboarding
    Created,
    /// Payee was sent an onboarding link and has not finished
    OnboardingPending,
    /// Details submitted, payouts not yet enabled
    DetailsSubmitted,
    /// Account can receive transfers and payouts
    PayoutsEnabled,
    /// Processor rejected the account
    Rejected,
}

impl OnboardingState {
    /// Derive the state from the processor's account flags
    pub fn from_account(account: &Account) -> Self {
        let rejected = account
            .requirements
            .as_ref()
            .is_some_and(Requirements::is_rejected);

        if rejected {
            OnboardingState::Rejected
        } else if account.details_submitted && account.payouts_enabled {
            OnboardingState::PayoutsEnabled
        } else if account.details_submitted {
            OnboardingState::DetailsSubmitted
        } else {
            OnboardingState::Created
        }
    }
}

/// Result of an onboarding check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Connected account id; persist it against the payee
    pub account_id: String,
    /// Derived onboarding state
    pub state: OnboardingState,
    /// Hosted onboarding link when the payee still has to act
    pub onboarding_url: Option<String>,
    /// Whether the account was created by this call
    pub created: bool,
    /// Charges capability
    pub charges_enabled: bool,
    /// Payouts capability
    pub payouts_enabled: bool,
    /// Details submitted by the payee
    pub details_submitted: bool,
    /// Outstanding verification items
    pub requirements: Requirements,
}

impl AccountStatus {
    fn from_account(account: Account, created: bool) -> Self {
        Self {
            state: OnboardingState::from_account(&account),
            account_id: account.id,
            onboarding_url: None,
            created,
            charges_enabled: account.charges_enabled,
            payouts_enabled: account.payouts_enabled,
            details_submitted: account.details_submitted,
            requirements: account.requirements.unwrap_or_default(),
        }
    }

    /// Whether transfers to this account may proceed
    pub fn is_payout_ready(&self) -> bool {
        self.state == OnboardingState::PayoutsEnabled
    }
}

/// Account onboarding tracker
#[derive(Clone)]
pub struct AccountOnboarding {
    gateway: DynProcessorGateway,
    country: String,
    currency: String,
    return_url: String,
    refresh_url: String,
    call_timeout: Duration,
}

impl std::fmt::Debug for AccountOnboarding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountOnboarding")
            .field("country", &self.country)
            .field("currency", &self.currency)
            .field("return_url", &self.return_url)
            .field("refresh_url", &self.refresh_url)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl AccountOnboarding {
    /// Create a new onboarding tracker
    pub fn new(
        gateway: DynProcessorGateway,
        country: impl Into<String>,
        currency: impl Into<String>,
        return_url: impl Into<String>,
        refresh_url: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            country: country.into(),
            currency: currency.into(),
            return_url: return_url.into(),
            refresh_url: refresh_url.into(),
            call_timeout,
        }
    }

    /// Ensure the payee has a connected account and report its readiness
    pub async fn ensure_account(
        &self,
        profile: &PayeeProfile,
        existing_account_id: Option<&str>,
    ) -> Result<AccountStatus, Error> {
        let mut created = false;

        let existing = match existing_account_id {
            Some(account_id) => self.find_account(account_id).await?,
            None => None,
        };

        let account = match existing {
            Some(account) => account,
            None => {
                created = true;
                self.create_account(profile).await?
            }
        };

        let mut status = AccountStatus::from_account(account, created);

        if status.state == OnboardingState::Rejected {
            warn!("Connected account {} was rejected", status.account_id);
            return Ok(status);
        }

        if !status.details_submitted || !status.payouts_enabled {
            status.state = OnboardingState::OnboardingPending;

            // The account exists now; a failed link must not hide its id
            match self.onboarding_link(&status.account_id).await {
                Ok(url) => status.onboarding_url = Some(url),
                Err(e) => warn!(
                    "Onboarding link for account {} failed: {}",
                    status.account_id, e
                ),
            }
        }

        debug!(
            "Account {} onboarding state: {:?}",
            status.account_id, status.state
        );

        Ok(status)
    }

    /// Read-only status of an existing account
    pub async fn check_status(&self, account_id: &str) -> Result<AccountStatus, Error> {
        match self.find_account(account_id).await? {
            Some(account) => Ok(AccountStatus::from_account(account, false)),
            None => Err(Error::AccountNotFound(account_id.to_string())),
        }
    }

    /// Issue a fresh hosted onboarding link
    pub async fn onboarding_link(&self, account_id: &str) -> Result<String, Error> {
        if account_id.trim().is_empty() {
            return Err(Error::AccountNotFound(account_id.to_string()));
        }

        let request = AccountLinkRequest {
            account_id: account_id.to_string(),
            return_url: self.return_url.clone(),
            refresh_url: self.refresh_url.clone(),
        };

        let link = with_timeout(
            self.call_timeout,
            self.gateway.create_account_link(&request),
        )
        .await?;

        Ok(link.url)
    }

    /// Retrieve an account, mapping "not found" to `None`
    ///
    /// A blank id is never sent: `GET /v1/accounts/` returns the platform account.
    async fn find_account(&self, account_id: &str) -> Result<Option<Account>, Error> {
        if account_id.trim().is_empty() {
            return Ok(None);
        }

        match with_timeout(self.call_timeout, self.gateway.retrieve_account(account_id)).await {
            Ok(account) => Ok(Some(account)),
            Err(Error::Gateway(e)) if e.is_not_found() => {
                warn!("Connected account {} unknown to processor", account_id);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn create_account(&self, profile: &PayeeProfile) -> Result<Account, Error> {
        if !validate_german_iban(&profile.bank_account.iban) {
            return Err(Error::InvalidIban);
        }

        let request = CreateAccountRequest {
            country: self.country.clone(),
            currency: self.currency.clone(),
            profile: profile.clone(),
        };

        let account = with_timeout(self.call_timeout, self.gateway.create_account(&request)).await?;
        info!("Created connected account {}", account.id);

        Ok(account)
    }
}
