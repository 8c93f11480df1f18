//! Stripe Connect payouts
//!
//! Onboards payees as connected accounts, moves funds to their bank accounts
//! in two phases (transfer, then payout) and verifies inbound webhooks.
//!
//! [`StripePayouts`] wires everything from a [`PayoutConfig`]. The pieces can
//! also be used on their own with any [`ProcessorGateway`].

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;
use tracing::info;

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod onboarding;
pub mod payout;
pub mod validate;
pub mod webhook;

pub use api::StripeApi;
pub use config::{Environment, PayoutConfig};
pub use error::Error;
pub use gateway::{DynProcessorGateway, PayeeProfile, ProcessorGateway};
pub use onboarding::{AccountOnboarding, AccountStatus, OnboardingState};
pub use payout::{PayoutOrchestrator, TransferRequest, TransferResult};
pub use validate::{validate_amount, validate_german_iban};
pub use webhook::{create_webhook_router, EventKind, WebhookEvent, WebhookVerifier};

const WEBHOOK_CHANNEL_SIZE: usize = 1000;

/// Run a gateway call under a deadline, mapping expiry to a retryable gateway error
pub(crate) async fn with_timeout<T, F>(deadline: Duration, call: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, api::error::Error>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Gateway(api::error::Error::Timeout(
            deadline.as_millis() as u64,
        ))),
    }
}

/// Stripe payout backend
#[derive(Debug, Clone)]
pub struct StripePayouts {
    config: PayoutConfig,
    onboarding: AccountOnboarding,
    orchestrator: PayoutOrchestrator,
    webhook_verifier: Option<WebhookVerifier>,
}

impl StripePayouts {
    /// Create the backend against the Stripe REST API
    pub fn from_config(config: PayoutConfig) -> Result<Self, Error> {
        config.validate()?;

        let stripe_api = StripeApi::new(
            &config.secret_key,
            config.api_url.as_deref(),
            config.timeout_ms,
        )?;

        Self::with_gateway(config, Arc::new(stripe_api))
    }

    /// Create the backend over any gateway implementation
    pub fn with_gateway(config: PayoutConfig, gateway: DynProcessorGateway) -> Result<Self, Error> {
        config.validate()?;
        let environment = config.environment()?;

        let onboarding = AccountOnboarding::new(
            gateway.clone(),
            config.country.clone(),
            config.currency.to_lowercase(),
            config.return_url.clone(),
            config.refresh_url.clone(),
            config.call_timeout(),
        );
        let orchestrator = PayoutOrchestrator::new(gateway, &config)?;

        let webhook_verifier = if config.webhook_secret.is_empty() {
            None
        } else {
            Some(WebhookVerifier::new(
                &config.webhook_secret,
                config.webhook_tolerance(),
            ))
        };

        info!(
            "Stripe payouts configured for {} ({} {})",
            environment, config.country, config.currency
        );

        Ok(Self {
            config,
            onboarding,
            orchestrator,
            webhook_verifier,
        })
    }

    /// Configuration the backend was built from
    pub fn config(&self) -> &PayoutConfig {
        &self.config
    }

    /// Account onboarding tracker
    pub fn onboarding(&self) -> &AccountOnboarding {
        &self.onboarding
    }

    /// Payout orchestrator
    pub fn orchestrator(&self) -> &PayoutOrchestrator {
        &self.orchestrator
    }

    /// Webhook verifier, `None` when no webhook secret is configured
    pub fn webhook_verifier(&self) -> Option<&WebhookVerifier> {
        self.webhook_verifier.as_ref()
    }

    /// Create the webhook router and the receiving end of its event channel
    pub fn create_webhook_router(
        &self,
        webhook_endpoint: &str,
    ) -> Result<(Router, mpsc::Receiver<WebhookEvent>), Error> {
        let verifier = self
            .webhook_verifier
            .clone()
            .ok_or_else(|| Error::Config("webhook_secret is not configured".to_string()))?;

        let (sender, receiver) = mpsc::channel(WEBHOOK_CHANNEL_SIZE);
        let router = create_webhook_router(webhook_endpoint, verifier, sender);

        Ok((router, receiver))
    }
}
