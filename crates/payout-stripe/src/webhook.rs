//! Stripe webhook verification
//!
//! Stripe signs every event it delivers. See
//! <https://docs.stripe.com/webhooks#verify-events> for the scheme.
//!
//! # Signature Verification
//!
//! 1. Read the `Stripe-Signature` header, `t=<unix>,v1=<hex>[,v1=<hex>...]`
//! 2. Compute HMAC-SHA256 over `"{t}.{raw body}"` with the endpoint secret
//! 3. Compare against every `v1` entry in constant time
//! 4. Reject timestamps further than the tolerance from now (replay)
//! 5. Only then parse the body as an event
//!
//! Verification runs over the exact bytes received. Never re-serialize the
//! body before verifying it.
//!
//! # Webhook Payload
//!
//! ```json
//! {
//!   "id": "evt_1",
//!   "object": "event",
//!   "type": "payout.paid",
//!   "created": 1700000000,
//!   "livemode": false,
//!   "data": { "object": { "id": "po_1", "object": "payout" } }
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use ring::hmac;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::Error;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

const SIGNATURE_SCHEME: &str = "v1";

/// Event types this crate recognises
///
/// Anything else is [`EventKind::Unknown`], which is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `payout.created`
    PayoutCreated,
    /// `payout.updated`
    PayoutUpdated,
    /// `payout.paid`
    PayoutPaid,
    /// `payout.failed`
    PayoutFailed,
    /// `payout.canceled`
    PayoutCanceled,
    /// `transfer.created`
    TransferCreated,
    /// `transfer.reversed`
    TransferReversed,
    /// `account.updated`
    AccountUpdated,
    /// `checkout.session.completed`
    CheckoutSessionCompleted,
    /// Any other type
    Unknown(String),
}

impl From<&str> for EventKind {
    fn from(event_type: &str) -> Self {
        match event_type {
            "payout.created" => EventKind::PayoutCreated,
            "payout.updated" => EventKind::PayoutUpdated,
            "payout.paid" => EventKind::PayoutPaid,
            "payout.failed" => EventKind::PayoutFailed,
            "payout.canceled" => EventKind::PayoutCanceled,
            "transfer.created" => EventKind::TransferCreated,
            "transfer.reversed" => EventKind::TransferReversed,
            "account.updated" => EventKind::AccountUpdated,
            "checkout.session.completed" => EventKind::CheckoutSessionCompleted,
            other => EventKind::Unknown(other.to_string()),
        }
    }
}

/// Event object wrapper
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EventData {
    /// The object the event is about (payout, transfer, account, ...)
    pub object: serde_json::Value,
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebhookEvent {
    /// Event id (`evt_...`)
    pub id: String,
    /// Event type, e.g. `payout.paid`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Unix creation time
    #[serde(default)]
    pub created: i64,
    /// Whether the event came from live mode
    #[serde(default)]
    pub livemode: bool,
    /// API version used to render `data`
    #[serde(default)]
    pub api_version: Option<String>,
    /// Event payload
    pub data: EventData,
    /// Exact bytes that were verified
    #[serde(skip)]
    pub raw_payload: Vec<u8>,
    /// `Stripe-Signature` header the payload was verified against
    #[serde(skip)]
    pub signature_header: String,
}

impl WebhookEvent {
    /// Typed event kind
    pub fn kind(&self) -> EventKind {
        EventKind::from(self.event_type.as_str())
    }

    /// Id of the object the event is about
    pub fn object_id(&self) -> Option<&str> {
        self.data.object.get("id").and_then(|id| id.as_str())
    }
}

/// Webhook signature verifier
///
/// Stateless apart from the read-only secret; share it freely across tasks.
#[derive(Clone)]
pub struct WebhookVerifier {
    key: hmac::Key,
    tolerance: Duration,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// Create a verifier for an endpoint signing secret (`whsec_...`)
    pub fn new(secret: &str, tolerance: Duration) -> Self {
        Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes()),
            tolerance,
        }
    }

    /// Verify a delivery against the current time
    pub fn verify(&self, payload: &[u8], signature_header: &str) -> Result<WebhookEvent, Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();

        self.verify_at(payload, signature_header, now)
    }

    /// Verify a delivery against `now` (unix seconds)
    pub fn verify_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<WebhookEvent, Error> {
        let (timestamp, signatures) = parse_signature_header(signature_header)?;

        let mut signed = format!("{}.", timestamp).into_bytes();
        signed.extend_from_slice(payload);

        let matched = signatures
            .iter()
            .any(|signature| hmac::verify(&self.key, &signed, signature).is_ok());
        if !matched {
            return Err(Error::SignatureMismatch(
                "no signature matches the payload".to_string(),
            ));
        }

        if now.abs_diff(timestamp) > self.tolerance.as_secs() {
            return Err(Error::Stale {
                timestamp,
                tolerance_secs: self.tolerance.as_secs(),
            });
        }

        let mut event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| Error::MalformedPayload(e.to_string()))?;
        event.raw_payload = payload.to_vec();
        event.signature_header = signature_header.to_string();

        if let EventKind::Unknown(event_type) = event.kind() {
            debug!("Accepting event {} of unhandled type {}", event.id, event_type);
        }

        Ok(event)
    }
}

/// Split the header into its timestamp and decoded `v1` signatures
fn parse_signature_header(header: &str) -> Result<(i64, Vec<Vec<u8>>), Error> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for item in header.split(',') {
        let Some((key, value)) = item.trim().split_once('=') else {
            continue;
        };

        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    Error::SignatureMismatch(format!("invalid timestamp: {}", value))
                })?);
            }
            SIGNATURE_SCHEME => {
                // Undecodable entries cannot match; skip them like unknown schemes
                if let Ok(signature) = hex::decode(value) {
                    signatures.push(signature);
                }
            }
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| Error::SignatureMismatch("missing timestamp".to_string()))?;

    if signatures.is_empty() {
        return Err(Error::SignatureMismatch(format!(
            "no {} signature in header",
            SIGNATURE_SCHEME
        )));
    }

    Ok((timestamp, signatures))
}

/// Build a `Stripe-Signature` header value for a payload
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());

    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(payload);
    let tag = hmac::sign(&key, &signed);

    format!("t={},{}={}", timestamp, SIGNATURE_SCHEME, hex::encode(tag.as_ref()))
}

/// State for the webhook handler
#[derive(Clone)]
struct WebhookState {
    verifier: Arc<WebhookVerifier>,
    sender: mpsc::Sender<WebhookEvent>,
}

async fn handle_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let Some(signature) = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        warn!("Missing {} header", SIGNATURE_HEADER);
        return StatusCode::BAD_REQUEST;
    };

    let event = match state.verifier.verify(&body, signature) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected webhook: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!("Received webhook: {} - {}", event.event_type, event.id);

    if let Err(e) = state.sender.send(event).await {
        warn!("Failed to send webhook event to channel: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    StatusCode::OK
}

/// Create an Axum router for Stripe webhooks
///
/// The router handles POST requests to `endpoint`, answers 400 to anything
/// that fails verification so Stripe retries the delivery, and forwards
/// verified events to `sender`.
pub fn create_webhook_router(
    endpoint: &str,
    verifier: WebhookVerifier,
    sender: mpsc::Sender<WebhookEvent>,
) -> Router {
    let state = WebhookState {
        verifier: Arc::new(verifier),
        sender,
    };

    Router::new()
        .route(endpoint, post(handle_webhook))
        .with_state(state)
}
