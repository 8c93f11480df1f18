//! End-to-end payout flow against a mock Stripe API

use payout_stripe::gateway::{Address, BankAccount, DateOfBirth};
use payout_stripe::{
    Error, OnboardingState, PayeeProfile, PayoutConfig, StripePayouts, TransferRequest,
};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payouts(server: &MockServer) -> StripePayouts {
    let mut config = PayoutConfig::new(
        "sk_test_123",
        "whsec_abc",
        "https://example.com/return",
        "https://example.com/refresh",
    );
    config.api_url = Some(server.uri());
    config.timeout_ms = 5_000;

    StripePayouts::from_config(config).unwrap()
}

async fn mount_account(server: &MockServer, id: &str, payouts_enabled: bool) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/accounts/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": id,
            "object": "account",
            "charges_enabled": true,
            "payouts_enabled": payouts_enabled,
            "details_submitted": true
        })))
        .mount(server)
        .await;
}

async fn mount_transfer(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "tr_1",
            "object": "transfer",
            "amount": 150,
            "currency": "eur",
            "destination": "acct_1"
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// What is tested: 1.50 EUR reaches a ready account as transfer plus payout
#[tokio::test]
async fn test_send_money() {
    let server = MockServer::start().await;
    mount_account(&server, "acct_1", true).await;
    mount_transfer(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/payouts"))
        .and(header("Stripe-Account", "acct_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "po_1",
            "object": "payout",
            "amount": 150,
            "currency": "eur",
            "status": "pending",
            "arrival_date": 1700086400,
            "method": "standard"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = payouts(&server)
        .orchestrator()
        .send_money(&TransferRequest::new("acct_1", 150, "eur"))
        .await
        .unwrap();

    assert_eq!(result.transfer_id, "tr_1");
    assert_eq!(result.payout_id, "po_1");
    assert_eq!(result.amount(), 1.50);
    assert_eq!(result.arrival_date, Some(1_700_086_400));
}

/// What is tested: a failed payout reports the transfer that already happened
#[tokio::test]
async fn test_partial_transfer() {
    let server = MockServer::start().await;
    mount_account(&server, "acct_1", true).await;
    mount_transfer(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/payouts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "type": "invalid_request_error",
                "code": "balance_insufficient",
                "message": "You have insufficient funds in your Stripe account."
            }
        })))
        .mount(&server)
        .await;

    let err = payouts(&server)
        .orchestrator()
        .send_money(&TransferRequest::new("acct_1", 150, "eur"))
        .await
        .unwrap_err();

    match &err {
        Error::PartialTransfer {
            transfer_id,
            account_id,
            amount,
            ..
        } => {
            assert_eq!(transfer_id, "tr_1");
            assert_eq!(account_id, "acct_1");
            assert_eq!(*amount, 150);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("insufficient funds"));
}

/// What is tested: an account without payouts never sees a transfer
#[tokio::test]
async fn test_account_not_ready() {
    let server = MockServer::start().await;
    mount_account(&server, "acct_2", false).await;

    Mock::given(method("POST"))
        .and(path("/v1/transfers"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = payouts(&server)
        .orchestrator()
        .send_money(&TransferRequest::new("acct_2", 150, "eur"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AccountNotReady { .. }));
}

/// What is tested: a half-onboarded account gets a fresh onboarding link
#[tokio::test]
async fn test_onboarding_pending() {
    let server = MockServer::start().await;
    mount_account(&server, "acct_2", false).await;

    Mock::given(method("POST"))
        .and(path("/v1/account_links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://connect.stripe.com/setup/e/acct_2/xyz",
            "created": 1700000000,
            "expires_at": 1700000300
        })))
        .expect(1)
        .mount(&server)
        .await;

    let payouts = payouts(&server);
    let status = payouts.onboarding().check_status("acct_2").await.unwrap();
    assert_eq!(status.state, OnboardingState::DetailsSubmitted);

    let url = payouts.onboarding().onboarding_link("acct_2").await.unwrap();
    assert_eq!(url, "https://connect.stripe.com/setup/e/acct_2/xyz");
}

fn profile() -> PayeeProfile {
    PayeeProfile {
        first_name: "Erika".to_string(),
        last_name: "Mustermann".to_string(),
        email: "erika@example.com".to_string(),
        phone: None,
        date_of_birth: DateOfBirth {
            day: 12,
            month: 8,
            year: 1964,
        },
        address: Address {
            line1: "Heidestrasse 17".to_string(),
            line2: None,
            city: "Koeln".to_string(),
            postal_code: "51147".to_string(),
            state: None,
        },
        bank_account: BankAccount {
            iban: "DE89370400440532013000".to_string(),
            bic: None,
            account_holder_name: "Erika Mustermann".to_string(),
        },
        business_type: None,
    }
}

/// What is tested: a failing onboarding link still hands back the new account id,
/// so the next call reuses the account instead of creating another
#[tokio::test]
async fn test_link_failure_does_not_lose_created_account() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "acct_new",
            "object": "account",
            "charges_enabled": false,
            "payouts_enabled": false,
            "details_submitted": false
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_account(&server, "acct_new", false).await;

    Mock::given(method("POST"))
        .and(path("/v1/account_links"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"type": "api_error", "message": "boom"}
        })))
        .mount(&server)
        .await;

    let payouts = payouts(&server);

    let status = payouts
        .onboarding()
        .ensure_account(&profile(), None)
        .await
        .unwrap();
    assert_eq!(status.account_id, "acct_new");
    assert!(status.created);
    assert_eq!(status.state, OnboardingState::OnboardingPending);
    assert!(status.onboarding_url.is_none());

    let again = payouts
        .onboarding()
        .ensure_account(&profile(), Some(&status.account_id))
        .await
        .unwrap();
    assert_eq!(again.account_id, "acct_new");
    assert!(!again.created);
}
