//! REST client tests against a mock Stripe API

use std::collections::HashMap;

use payout_stripe::api::types::{PayoutMethod, PayoutStatus};
use payout_stripe::gateway::{AccountLinkRequest, CreatePayoutRequest, CreateTransferRequest};
use payout_stripe::{ProcessorGateway, StripeApi};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> StripeApi {
    StripeApi::new("sk_test_123", Some(&server.uri()), 5_000).unwrap()
}

fn payout_json(id: &str, amount: i64) -> serde_json::Value {
    json!({
        "id": id,
        "object": "payout",
        "amount": amount,
        "currency": "eur",
        "status": "pending",
        "arrival_date": 1700086400,
        "description": null,
        "failure_code": null,
        "failure_message": null,
        "method": "standard",
        "statement_descriptor": "Payout",
        "metadata": {},
        "created": 1700000000
    })
}

/// What is tested: unknown account ids surface as "not found"
#[tokio::test]
async fn test_retrieve_missing_account() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/accounts/acct_gone"))
        .and(header("Authorization", "Bearer sk_test_123"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "resource_missing",
                "message": "No such account: 'acct_gone'",
                "param": "account"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .retrieve_account("acct_gone")
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("No such account"));
}

/// What is tested: account flags and requirements decode
#[tokio::test]
async fn test_retrieve_account() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/accounts/acct_1"))
        .and(header_exists("Stripe-Version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct_1",
            "object": "account",
            "charges_enabled": true,
            "payouts_enabled": false,
            "details_submitted": true,
            "country": "DE",
            "default_currency": "eur",
            "requirements": {
                "currently_due": ["external_account"],
                "eventually_due": [],
                "past_due": [],
                "pending_verification": ["individual.verification.document"],
                "disabled_reason": "requirements.pending_verification"
            }
        })))
        .mount(&server)
        .await;

    let account = client(&server).retrieve_account("acct_1").await.unwrap();

    assert!(account.charges_enabled);
    assert!(!account.payouts_enabled);
    let requirements = account.requirements.unwrap();
    assert_eq!(requirements.currently_due, vec!["external_account"]);
    assert!(!requirements.is_rejected());
}

/// What is tested: transfers are form-encoded and carry an idempotency key
#[tokio::test]
async fn test_create_transfer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .and(header("Idempotency-Key", "run-7-transfer"))
        .and(body_string_contains("amount=150"))
        .and(body_string_contains("destination=acct_1"))
        .and(body_string_contains("metadata%5Bperiod%5D=2025-07"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "tr_1",
            "object": "transfer",
            "amount": 150,
            "currency": "eur",
            "destination": "acct_1",
            "description": "Payout transfer",
            "metadata": {"period": "2025-07"},
            "created": 1700000000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateTransferRequest {
        destination: "acct_1".to_string(),
        amount: 150,
        currency: "eur".to_string(),
        description: "Payout transfer".to_string(),
        metadata: HashMap::from([("period".to_string(), "2025-07".to_string())]),
        idempotency_key: Some("run-7".to_string()),
    };

    let transfer = client(&server).create_transfer(&request).await.unwrap();

    assert_eq!(transfer.id, "tr_1");
    assert_eq!(transfer.destination.as_deref(), Some("acct_1"));
}

/// What is tested: payouts are created on behalf of the connected account
#[tokio::test]
async fn test_create_payout_on_connected_account() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/payouts"))
        .and(header("Stripe-Account", "acct_1"))
        .and(header_exists("Idempotency-Key"))
        .and(body_string_contains("method=standard"))
        .and(body_string_contains("statement_descriptor=Payout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payout_json("po_1", 150)))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreatePayoutRequest {
        account_id: "acct_1".to_string(),
        amount: 150,
        currency: "eur".to_string(),
        method: PayoutMethod::Standard,
        statement_descriptor: "Payout".to_string(),
        metadata: HashMap::new(),
        idempotency_key: None,
    };

    let payout = client(&server).create_payout(&request).await.unwrap();

    assert_eq!(payout.id, "po_1");
    assert_eq!(payout.status, PayoutStatus::Pending);
    assert_eq!(payout.method, Some(PayoutMethod::Standard));
}

/// What is tested: payout listing passes the limit and account header
#[tokio::test]
async fn test_list_payouts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/payouts"))
        .and(query_param("limit", "10"))
        .and(header("Stripe-Account", "acct_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [payout_json("po_2", 500), payout_json("po_1", 150)],
            "has_more": true,
            "url": "/v1/payouts"
        })))
        .mount(&server)
        .await;

    let list = client(&server).list_payouts("acct_1", 10).await.unwrap();

    assert_eq!(list.data.len(), 2);
    assert!(list.has_more);
    assert_eq!(list.data[0].amount, 500);
}

/// What is tested: the page size sent to Stripe stays within 1..=100
#[tokio::test]
async fn test_list_payouts_limit_is_clamped() {
    let server = MockServer::start().await;

    for (requested, sent) in [(0, "1"), (500, "100")] {
        Mock::given(method("GET"))
            .and(path("/v1/payouts"))
            .and(query_param("limit", sent))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "data": [],
                "has_more": false
            })))
            .expect(1)
            .mount(&server)
            .await;

        let list = client(&server)
            .list_payouts("acct_1", requested)
            .await
            .unwrap();
        assert!(list.data.is_empty());
    }
}

/// What is tested: balance buckets decode with source type breakdown
#[tokio::test]
async fn test_retrieve_balance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/balance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "balance",
            "available": [{"amount": 10050, "currency": "eur", "source_types": {"card": 10050}}],
            "pending": [{"amount": 0, "currency": "eur"}],
            "livemode": false
        })))
        .mount(&server)
        .await;

    let balance = client(&server).retrieve_balance().await.unwrap();

    assert_eq!(balance.available[0].amount, 10_050);
    assert_eq!(
        balance.available[0].source_types.as_ref().unwrap()["card"],
        10_050
    );
    assert!(balance.pending[0].source_types.is_none());
    assert!(!balance.livemode);
}

/// What is tested: onboarding links request the account_onboarding flow
#[tokio::test]
async fn test_create_account_link() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/account_links"))
        .and(body_string_contains("type=account_onboarding"))
        .and(body_string_contains("account=acct_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "account_link",
            "url": "https://connect.stripe.com/setup/e/acct_1/abc",
            "created": 1700000000,
            "expires_at": 1700000300
        })))
        .mount(&server)
        .await;

    let link = client(&server)
        .create_account_link(&AccountLinkRequest {
            account_id: "acct_1".to_string(),
            return_url: "https://example.com/return".to_string(),
            refresh_url: "https://example.com/refresh".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(link.url, "https://connect.stripe.com/setup/e/acct_1/abc");
    assert_eq!(link.expires_at, 1_700_000_300);
}

/// What is tested: rate limiting is reported as retryable
#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/balance"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "rate_limit",
                "message": "Too many requests"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server).retrieve_balance().await.unwrap_err();

    assert!(err.is_retryable());
    assert!(!err.is_not_found());
}
