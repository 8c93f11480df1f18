//! Configuration types for the Stripe payout backend

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::is_live_key;
use crate::error::Error;

/// Stripe secret key
pub const ENV_SECRET_KEY: &str = "PAYOUT_STRIPE_SECRET_KEY";
/// Webhook endpoint signing secret
pub const ENV_WEBHOOK_SECRET: &str = "PAYOUT_STRIPE_WEBHOOK_SECRET";
/// API host override
pub const ENV_API_URL: &str = "PAYOUT_STRIPE_API_URL";
/// SANDBOX or PRODUCTION
pub const ENV_ENVIRONMENT: &str = "PAYOUT_STRIPE_ENVIRONMENT";
/// Country of connected accounts
pub const ENV_COUNTRY: &str = "PAYOUT_STRIPE_COUNTRY";
/// Transfer and payout currency
pub const ENV_CURRENCY: &str = "PAYOUT_STRIPE_CURRENCY";
/// Default statement descriptor
pub const ENV_STATEMENT_DESCRIPTOR: &str = "PAYOUT_STRIPE_STATEMENT_DESCRIPTOR";
/// Onboarding return URL
pub const ENV_RETURN_URL: &str = "PAYOUT_STRIPE_RETURN_URL";
/// Onboarding refresh URL
pub const ENV_REFRESH_URL: &str = "PAYOUT_STRIPE_REFRESH_URL";
/// Per-call timeout in milliseconds
pub const ENV_TIMEOUT_MS: &str = "PAYOUT_STRIPE_TIMEOUT_MS";
/// Webhook timestamp tolerance in seconds
pub const ENV_WEBHOOK_TOLERANCE_SECS: &str = "PAYOUT_STRIPE_WEBHOOK_TOLERANCE_SECS";

/// Processor environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Test mode, synthetic funding allowed
    #[default]
    Sandbox,
    /// Live mode
    Production,
}

impl Environment {
    /// Whether this is the processor's test mode
    pub fn is_sandbox(&self) -> bool {
        matches!(self, Environment::Sandbox)
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PRODUCTION" | "LIVE" => Ok(Environment::Production),
            "SANDBOX" | "TEST" => Ok(Environment::Sandbox),
            other => Err(Error::Config(format!("Unknown environment: {}", other))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Sandbox => write!(f, "SANDBOX"),
            Environment::Production => write!(f, "PRODUCTION"),
        }
    }
}

/// Stripe payout configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutConfig {
    /// Stripe secret key (`sk_test_...` / `sk_live_...`)
    pub secret_key: String,
    /// Webhook endpoint signing secret (`whsec_...`)
    #[serde(default)]
    pub webhook_secret: String,
    /// API host override, mainly for tests
    #[serde(default)]
    pub api_url: Option<String>,
    /// Processor environment (SANDBOX or PRODUCTION)
    /// Default is SANDBOX
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Country of connected accounts
    #[serde(default = "default_country")]
    pub country: String,
    /// Currency of transfers and payouts
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Statement descriptor when a request carries none
    #[serde(default = "default_statement_descriptor")]
    pub default_statement_descriptor: String,
    /// Where payees land after finishing onboarding
    pub return_url: String,
    /// Where payees land when an onboarding link expired
    pub refresh_url: String,
    /// Per-call deadline for processor requests in milliseconds
    /// Default is 30000
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Accepted webhook timestamp skew in seconds
    /// Default is 300 seconds (5 minutes)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,
}

impl fmt::Debug for PayoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayoutConfig")
            .field("secret_key", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("api_url", &self.api_url)
            .field("environment", &self.environment)
            .field("country", &self.country)
            .field("currency", &self.currency)
            .field(
                "default_statement_descriptor",
                &self.default_statement_descriptor,
            )
            .field("return_url", &self.return_url)
            .field("refresh_url", &self.refresh_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}

fn default_environment() -> String {
    Environment::Sandbox.to_string()
}

fn default_country() -> String {
    "DE".to_string()
}

fn default_currency() -> String {
    "eur".to_string()
}

fn default_statement_descriptor() -> String {
    "Payout".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_webhook_tolerance_secs() -> u64 {
    300 // 5 minutes in seconds
}

impl PayoutConfig {
    /// Create a config with defaults for everything but keys and onboarding URLs
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        return_url: impl Into<String>,
        refresh_url: impl Into<String>,
    ) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_url: None,
            environment: default_environment(),
            country: default_country(),
            currency: default_currency(),
            default_statement_descriptor: default_statement_descriptor(),
            return_url: return_url.into(),
            refresh_url: refresh_url.into(),
            timeout_ms: default_timeout_ms(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    /// Override fields from `PAYOUT_STRIPE_*` environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(secret_key) = env::var(ENV_SECRET_KEY) {
            self.secret_key = secret_key;
        }

        if let Ok(webhook_secret) = env::var(ENV_WEBHOOK_SECRET) {
            self.webhook_secret = webhook_secret;
        }

        if let Ok(api_url) = env::var(ENV_API_URL) {
            self.api_url = Some(api_url);
        }

        if let Ok(environment) = env::var(ENV_ENVIRONMENT) {
            self.environment = environment;
        }

        if let Ok(country) = env::var(ENV_COUNTRY) {
            self.country = country;
        }

        if let Ok(currency) = env::var(ENV_CURRENCY) {
            self.currency = currency;
        }

        if let Ok(descriptor) = env::var(ENV_STATEMENT_DESCRIPTOR) {
            self.default_statement_descriptor = descriptor;
        }

        if let Ok(return_url) = env::var(ENV_RETURN_URL) {
            self.return_url = return_url;
        }

        if let Ok(refresh_url) = env::var(ENV_REFRESH_URL) {
            self.refresh_url = refresh_url;
        }

        if let Ok(timeout_str) = env::var(ENV_TIMEOUT_MS) {
            if let Ok(timeout_ms) = timeout_str.parse() {
                self.timeout_ms = timeout_ms;
            }
        }

        if let Ok(tolerance_str) = env::var(ENV_WEBHOOK_TOLERANCE_SECS) {
            if let Ok(tolerance) = tolerance_str.parse() {
                self.webhook_tolerance_secs = tolerance;
            }
        }

        self
    }

    /// Parsed processor environment
    pub fn environment(&self) -> Result<Environment, Error> {
        self.environment.parse()
    }

    /// Per-call deadline
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Webhook timestamp tolerance
    pub fn webhook_tolerance(&self) -> Duration {
        Duration::from_secs(self.webhook_tolerance_secs)
    }

    /// Check the configuration before any client is built
    pub fn validate(&self) -> Result<(), Error> {
        if self.secret_key.is_empty() {
            return Err(Error::Config("secret_key is empty".to_string()));
        }

        if self.environment()?.is_sandbox() && is_live_key(&self.secret_key) {
            return Err(Error::Config(
                "live secret key configured for the sandbox environment".to_string(),
            ));
        }

        if self.country.len() != 2 {
            return Err(Error::Config(format!("Invalid country: {}", self.country)));
        }

        if self.currency.len() != 3 {
            return Err(Error::Config(format!("Invalid currency: {}", self.currency)));
        }

        if self.timeout_ms == 0 {
            return Err(Error::Config("timeout_ms must be positive".to_string()));
        }

        for (name, value) in [
            ("return_url", &self.return_url),
            ("refresh_url", &self.refresh_url),
        ] {
            Url::parse(value).map_err(|e| Error::Config(format!("Invalid {}: {}", name, e)))?;
        }

        if let Some(api_url) = &self.api_url {
            Url::parse(api_url).map_err(|e| Error::Config(format!("Invalid api_url: {}", e)))?;
        }

        Ok(())
    }
}
