//! Stripe API client
//!
//! This module implements the subset of the Stripe v1 API needed for Connect
//! payouts. See <https://docs.stripe.com/api> for the complete API reference.
//!
//! # Endpoints
//!
//! ## Connected Accounts
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/v1/accounts` | Create an express account |
//! | GET | `/v1/accounts/{id}` | Retrieve an account |
//! | POST | `/v1/account_links` | Create a hosted onboarding link |
//!
//! ## Money Movement
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/v1/transfers` | Platform balance → connected account |
//! | POST | `/v1/payouts` | Connected account → bank (`Stripe-Account` header) |
//! | GET | `/v1/payouts/{id}` | Retrieve a payout (`Stripe-Account` header) |
//! | GET | `/v1/payouts` | List payouts (`Stripe-Account` header) |
//! | GET | `/v1/balance` | Platform balance |
//! | POST | `/v1/charges` | Charge a source (`sandbox` feature only) |
//!
//! # Authentication
//!
//! All requests use Bearer authentication with the secret key. Request bodies
//! are form-encoded with bracketed keys for nested objects
//! (`individual[address][city]=Berlin`).

pub mod error;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use error::{Error, StripeErrorResponse};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};
use types::*;
use url::Url;
use uuid::Uuid;

use crate::gateway::{
    AccountLinkRequest, CreateAccountRequest, CreatePayoutRequest, CreateTransferRequest,
    ProcessorGateway,
};
#[cfg(feature = "sandbox")]
use crate::gateway::TestChargeRequest;

/// Default Stripe API host
pub const STRIPE_API_URL: &str = "https://api.stripe.com";
/// API version pinned for every request
pub const STRIPE_API_VERSION: &str = "2023-10-16";

const DEFAULT_BUSINESS_TYPE: &str = "individual";

/// Form-encoded request body with bracketed nested keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FormParams(Vec<(String, String)>);

impl FormParams {
    fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, key: impl Into<String>, value: impl ToString) -> &mut Self {
        self.0.push((key.into(), value.to_string()));
        self
    }

    fn push_opt(&mut self, key: impl Into<String>, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.push(key, value);
        }
        self
    }

    fn push_metadata(&mut self, metadata: &HashMap<String, String>) -> &mut Self {
        let mut keys: Vec<&String> = metadata.keys().collect();
        keys.sort();
        for key in keys {
            self.push(format!("metadata[{}]", key), &metadata[key]);
        }
        self
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Stripe API client
#[derive(Clone)]
pub struct StripeApi {
    secret_key: String,
    base_url: Url,
    client: Client,
    timeout_ms: u64,
}

impl std::fmt::Debug for StripeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeApi")
            .field("base_url", &self.base_url.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

impl StripeApi {
    /// Create a new Stripe API client
    pub fn new(secret_key: &str, api_url: Option<&str>, timeout_ms: u64) -> anyhow::Result<Self> {
        let base_url = api_url.unwrap_or(STRIPE_API_URL);
        let base_url = Url::parse(base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;

        Ok(Self {
            secret_key: secret_key.to_string(),
            base_url,
            client,
            timeout_ms,
        })
    }

    /// Whether the configured key is a live-mode key
    pub fn is_live_key(&self) -> bool {
        is_live_key(&self.secret_key)
    }

    fn authorize(&self, builder: RequestBuilder, connected_account: Option<&str>) -> RequestBuilder {
        let builder = builder
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION)
            .header("Accept", "application/json");

        match connected_account {
            Some(account_id) => builder.header("Stripe-Account", account_id),
            None => builder,
        }
    }

    /// Make a GET request
    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
        connected_account: Option<&str>,
    ) -> Result<serde_json::Value, Error> {
        let url = self.base_url.join(path)?;
        debug!("GET {}", url);

        let request = self.authorize(self.client.get(url), connected_account).query(query);
        self.send(request).await
    }

    /// Make a form-encoded POST request
    async fn post(
        &self,
        path: &str,
        params: &FormParams,
        connected_account: Option<&str>,
        idempotency_key: Option<&str>,
    ) -> Result<serde_json::Value, Error> {
        let url = self.base_url.join(path)?;
        debug!("POST {}", url);

        let mut request = self
            .authorize(self.client.post(url), connected_account)
            .form(&params.0);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<serde_json::Value, Error> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(self.timeout_ms)
            } else {
                Error::Reqwest(e)
            }
        })?;

        self.handle_response(response).await
    }

    /// Handle API response
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<serde_json::Value, Error> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            let json: serde_json::Value = serde_json::from_str(&text)?;
            return Ok(json);
        }

        warn!("Stripe API error: {} - {}", status, text);
        match serde_json::from_str::<StripeErrorResponse>(&text) {
            Ok(body) => Err(Error::Api {
                status: status.as_u16(),
                error: body.error,
            }),
            Err(_) if status == reqwest::StatusCode::NOT_FOUND => Err(Error::NotFound(text)),
            Err(e) => Err(Error::Json(e)),
        }
    }

    // ==================== Request Bodies ====================

    pub(crate) fn account_params(request: &CreateAccountRequest) -> FormParams {
        let profile = &request.profile;
        let mut params = FormParams::new();

        params
            .push("type", "express")
            .push("country", &request.country)
            .push("email", &profile.email)
            .push("capabilities[transfers][requested]", "true")
            .push(
                "business_type",
                profile
                    .business_type
                    .as_deref()
                    .unwrap_or(DEFAULT_BUSINESS_TYPE),
            )
            .push("individual[first_name]", &profile.first_name)
            .push("individual[last_name]", &profile.last_name)
            .push("individual[email]", &profile.email)
            .push_opt("individual[phone]", profile.phone.as_deref())
            .push("individual[dob][day]", profile.date_of_birth.day)
            .push("individual[dob][month]", profile.date_of_birth.month)
            .push("individual[dob][year]", profile.date_of_birth.year)
            .push("individual[address][line1]", &profile.address.line1)
            .push_opt("individual[address][line2]", profile.address.line2.as_deref())
            .push("individual[address][city]", &profile.address.city)
            .push("individual[address][postal_code]", &profile.address.postal_code)
            .push_opt("individual[address][state]", profile.address.state.as_deref())
            .push("individual[address][country]", &request.country)
            .push("external_account[object]", "bank_account")
            .push("external_account[country]", &request.country)
            .push("external_account[currency]", &request.currency)
            .push(
                "external_account[account_number]",
                compact_iban(&profile.bank_account.iban),
            )
            .push_opt(
                "external_account[routing_number]",
                profile.bank_account.bic.as_deref(),
            )
            .push(
                "external_account[account_holder_name]",
                &profile.bank_account.account_holder_name,
            )
            .push("settings[payouts][schedule][interval]", "manual");

        params
    }

    pub(crate) fn transfer_params(request: &CreateTransferRequest) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("amount", request.amount)
            .push("currency", &request.currency)
            .push("destination", &request.destination)
            .push("description", &request.description)
            .push_metadata(&request.metadata);
        params
    }

    pub(crate) fn payout_params(request: &CreatePayoutRequest) -> FormParams {
        let mut params = FormParams::new();
        params
            .push("amount", request.amount)
            .push("currency", &request.currency)
            .push("method", request.method)
            .push("statement_descriptor", &request.statement_descriptor)
            .push_metadata(&request.metadata);
        params
    }
}

/// Whether a secret or restricted key belongs to live mode
pub fn is_live_key(key: &str) -> bool {
    key.starts_with("sk_live_") || key.starts_with("rk_live_")
}

fn compact_iban(iban: &str) -> String {
    iban.split_whitespace().collect::<String>().to_uppercase()
}

fn idempotency_key(key: Option<&str>, suffix: &str) -> String {
    match key {
        Some(key) => format!("{}-{}", key, suffix),
        None => Uuid::new_v4().to_string(),
    }
}

#[async_trait]
impl ProcessorGateway for StripeApi {
    async fn create_account(&self, request: &CreateAccountRequest) -> Result<Account, Error> {
        let params = Self::account_params(request);
        let json = self.post("/v1/accounts", &params, None, None).await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn retrieve_account(&self, account_id: &str) -> Result<Account, Error> {
        let json = self
            .get(&format!("/v1/accounts/{}", account_id), &[], None)
            .await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn create_transfer(&self, request: &CreateTransferRequest) -> Result<Transfer, Error> {
        let params = Self::transfer_params(request);
        let key = idempotency_key(request.idempotency_key.as_deref(), "transfer");
        let json = self
            .post("/v1/transfers", &params, None, Some(&key))
            .await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn create_payout(&self, request: &CreatePayoutRequest) -> Result<Payout, Error> {
        let params = Self::payout_params(request);
        let key = idempotency_key(request.idempotency_key.as_deref(), "payout");
        let json = self
            .post(
                "/v1/payouts",
                &params,
                Some(&request.account_id),
                Some(&key),
            )
            .await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn retrieve_payout(&self, payout_id: &str, account_id: &str) -> Result<Payout, Error> {
        let json = self
            .get(&format!("/v1/payouts/{}", payout_id), &[], Some(account_id))
            .await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn list_payouts(&self, account_id: &str, limit: u32) -> Result<List<Payout>, Error> {
        let json = self
            .get(
                "/v1/payouts",
                &[("limit", limit.clamp(1, 100).to_string())],
                Some(account_id),
            )
            .await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn retrieve_balance(&self) -> Result<Balance, Error> {
        let json = self.get("/v1/balance", &[], None).await?;
        Ok(serde_json::from_value(json)?)
    }

    async fn create_account_link(
        &self,
        request: &AccountLinkRequest,
    ) -> Result<AccountLink, Error> {
        let mut params = FormParams::new();
        params
            .push("account", &request.account_id)
            .push("refresh_url", &request.refresh_url)
            .push("return_url", &request.return_url)
            .push("type", "account_onboarding");

        let json = self.post("/v1/account_links", &params, None, None).await?;
        Ok(serde_json::from_value(json)?)
    }

    #[cfg(feature = "sandbox")]
    async fn create_charge(&self, request: &TestChargeRequest) -> Result<Charge, Error> {
        let mut params = FormParams::new();
        params
            .push("amount", request.amount)
            .push("currency", &request.currency)
            .push("source", &request.source)
            .push("description", &request.description)
            .push_metadata(&request.metadata);

        let json = self.post("/v1/charges", &params, None, None).await?;
        Ok(serde_json::from_value(json)?)
    }
}
