use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use onlystars_core::{
    types::{
        AccessReason, CheckResponse, GateErrorBody, GateErrorCode, GateResponse, NonceResponse,
        ProofFailure,
    },
    GateMode, PostId,
};
use onlystars_gate::GateSettings;
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::common::{relaxed_settings, sign_challenge, spawn_test_gate, TestGate};

mod common;

const CREATOR: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

async fn request_nonce(gate: &TestGate, body: Value) -> NonceResponse {
    let resp = gate
        .client
        .post(format!("{}/gate/nonce", gate.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

async fn submit(gate: &TestGate, body: Value) -> GateResponse {
    let resp = gate
        .client
        .post(format!("{}/gate", gate.base_url))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

async fn signed_post_proof(gate: &TestGate, signer: &PrivateKeySigner, post_id: u64) -> Value {
    let account = signer.address();
    let nonce = request_nonce(
        gate,
        json!({ "account": account, "mode": "post", "postId": post_id.to_string() }),
    )
    .await;
    assert!(nonce.scoped);

    let post = PostId::from(post_id);
    let (message, signature) =
        sign_challenge(signer, GateMode::Post, &nonce.nonce, Some(&post), None);
    json!({
        "mode": "post",
        "account": account,
        "postId": post_id,
        "nonce": nonce.nonce,
        "signature": signature,
        "message": message,
    })
}

#[tokio::test]
async fn post_proof_is_allowed_when_ledger_grants_access() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    gate.ledger.set_post_access(true);
    let signer = PrivateKeySigner::random();

    let body = signed_post_proof(&gate, &signer, 42).await;
    let resp = submit(&gate, body).await;

    assert!(resp.ok);
    assert!(resp.allowed);
    assert_eq!(resp.reason, AccessReason::PostAccess);
    assert!(resp.auth.signature);
    assert_eq!(resp.auth.signature_reason, None);
    assert_eq!(gate.ledger.calls(), 1);

    gate.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn subscription_proof_is_denied_without_subscription() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    let signer = PrivateKeySigner::random();
    let account = signer.address();
    let creator = CREATOR.parse().unwrap();

    let nonce = request_nonce(
        &gate,
        json!({ "account": account, "mode": "sub", "creatorAddress": CREATOR }),
    )
    .await;
    let (message, signature) = sign_challenge(
        &signer,
        GateMode::Subscription,
        &nonce.nonce,
        None,
        Some(creator),
    );
    let resp = submit(
        &gate,
        json!({
            "mode": "subscription",
            "account": account,
            "creatorAddress": CREATOR,
            "nonce": nonce.nonce,
            "signature": signature,
            "message": message,
        }),
    )
    .await;

    assert!(!resp.allowed);
    assert_eq!(resp.reason, AccessReason::NoSubscription);
    assert!(resp.auth.signature);
}

#[tokio::test]
async fn tampered_signature_still_reports_ledger_decision() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    gate.ledger.set_post_access(true);
    let signer = PrivateKeySigner::random();

    let mut body = signed_post_proof(&gate, &signer, 7).await;
    let other = PrivateKeySigner::random();
    let (_, foreign) = sign_challenge(
        &other,
        GateMode::Post,
        body["nonce"].as_str().unwrap(),
        Some(&PostId::from(7)),
        None,
    );
    body["signature"] = json!(foreign);

    let resp = submit(&gate, body).await;
    assert!(resp.allowed);
    assert_eq!(resp.reason, AccessReason::PostAccess);
    assert!(!resp.auth.signature);
    assert_eq!(resp.auth.signature_reason, Some(ProofFailure::BadSignature));
}

#[tokio::test]
async fn replayed_nonce_is_bad_nonce() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    let signer = PrivateKeySigner::random();

    let body = signed_post_proof(&gate, &signer, 9).await;
    let first = submit(&gate, body.clone()).await;
    assert!(first.auth.signature);

    let replay = submit(&gate, body).await;
    assert!(!replay.auth.signature);
    assert_eq!(replay.auth.signature_reason, Some(ProofFailure::BadNonce));
}

#[tokio::test]
async fn nonce_scoped_to_another_post_is_rejected() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    let signer = PrivateKeySigner::random();

    let mut body = signed_post_proof(&gate, &signer, 1).await;
    let (message, signature) = sign_challenge(
        &signer,
        GateMode::Post,
        body["nonce"].as_str().unwrap(),
        Some(&PostId::from(2)),
        None,
    );
    body["postId"] = json!("2");
    body["signature"] = json!(signature);
    body["message"] = json!(message);

    let resp = submit(&gate, body).await;
    assert_eq!(resp.auth.signature_reason, Some(ProofFailure::ScopeMismatch));
}

#[tokio::test]
async fn missing_signature_is_reported_and_ledger_still_read() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    gate.ledger.set_subscribed(true);
    let account = PrivateKeySigner::random().address();

    let resp = submit(
        &gate,
        json!({ "mode": "subscription", "account": account, "creatorAddress": CREATOR, "signature": "" }),
    )
    .await;

    assert!(resp.allowed);
    assert_eq!(resp.reason, AccessReason::SubscriptionActive);
    assert_eq!(resp.auth.signature_reason, Some(ProofFailure::MissingSig));
    assert_eq!(gate.ledger.calls(), 1);
}

#[tokio::test]
async fn malformed_input_is_bad_request() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    let account = PrivateKeySigner::random().address();

    let cases = [
        json!({ "mode": "post", "account": "0xnope", "postId": "1" }),
        json!({ "mode": "post", "account": account, "postId": "-1" }),
        json!({ "mode": "post", "account": account }),
        json!({ "mode": "subscription", "account": account }),
        json!({ "mode": "everything", "account": account }),
    ];
    for body in cases {
        let resp = gate
            .client
            .post(format!("{}/gate", gate.base_url))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let err: GateErrorBody = resp.json().await.unwrap();
        assert!(!err.ok);
        assert_eq!(err.code, GateErrorCode::BadRequest);
    }

    let resp = gate
        .client
        .post(format!("{}/gate/nonce", gate.base_url))
        .json(&json!({ "account": account, "postId": "3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(gate.ledger.calls(), 0);
}

#[tokio::test]
async fn cheap_check_answers_only_what_was_asked() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    gate.ledger.set_subscribed(true);
    let account = PrivateKeySigner::random().address();

    let resp: CheckResponse = gate
        .client
        .get(format!("{}/gate", gate.base_url))
        .query(&[("account", account.to_string()), ("creatorAddress", CREATOR.to_string())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp.sub_active, Some(true));
    assert_eq!(resp.has_access, None);

    let raw: Value = gate
        .client
        .get(format!("{}/gate", gate.base_url))
        .query(&[("account", account.to_string()), ("postId", "12".to_string())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(raw["subActive"], Value::Null);
    assert_eq!(raw["hasAccess"], json!(false));
    assert_eq!(gate.ledger.calls(), 2);
}

async fn get_nonce(
    gate: &TestGate,
    account: Address,
    forwarded_for: Option<&str>,
) -> reqwest::Response {
    let mut request = gate
        .client
        .get(format!("{}/gate/nonce", gate.base_url))
        .query(&[("account", account.to_string())]);
    if let Some(ip) = forwarded_for {
        request = request.header("x-forwarded-for", ip);
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn nonce_requests_are_rate_limited_per_ip_and_account() {
    let gate = spawn_test_gate(GateSettings::default()).await;
    let account = PrivateKeySigner::random().address();

    let mut statuses = Vec::new();
    for _ in 0..5 {
        let resp = get_nonce(&gate, account, None).await;
        let status = resp.status();
        if status == StatusCode::OK {
            let body: NonceResponse = resp.json().await.unwrap();
            assert!(!body.scoped);
            assert_eq!(body.expires_in_seconds, 600);
        } else {
            let err: GateErrorBody = resp.json().await.unwrap();
            assert_eq!(err.code, GateErrorCode::RateLimited);
            assert_eq!(err.error, "Slow down");
        }
        statuses.push(status);
    }
    assert_eq!(
        statuses,
        [
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );

    // a forged proxy header does not open a new window
    let spoofed = get_nonce(&gate, account, Some("198.51.100.2")).await;
    assert_eq!(spoofed.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_account = PrivateKeySigner::random().address();
    let other = get_nonce(&gate, other_account, None).await;
    assert_eq!(other.status(), StatusCode::OK);
}

#[tokio::test]
async fn trusted_proxy_headers_key_the_limit_by_forwarded_ip() {
    let gate = spawn_test_gate(GateSettings {
        trust_proxy_headers: true,
        ..GateSettings::default()
    })
    .await;
    let account = PrivateKeySigner::random().address();

    let first = get_nonce(&gate, account, Some("203.0.113.7")).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = get_nonce(&gate, account, Some("203.0.113.7")).await;
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_ip = get_nonce(&gate, account, Some("198.51.100.2")).await;
    assert_eq!(other_ip.status(), StatusCode::OK);
}

#[tokio::test]
async fn ledger_failure_denies_and_cheap_check_is_unavailable() {
    let gate = spawn_test_gate(relaxed_settings()).await;
    gate.ledger.set_failing(true);
    let signer = PrivateKeySigner::random();

    let body = signed_post_proof(&gate, &signer, 3).await;
    let resp = submit(&gate, body).await;
    assert!(!resp.allowed);
    assert_eq!(resp.reason, AccessReason::LedgerUnavailable);
    assert!(resp.auth.signature);

    let check = gate
        .client
        .get(format!("{}/gate", gate.base_url))
        .query(&[("account", signer.address().to_string()), ("postId", "3".to_string())])
        .send()
        .await
        .unwrap();
    assert_eq!(check.status(), StatusCode::SERVICE_UNAVAILABLE);
    let err: GateErrorBody = check.json().await.unwrap();
    assert_eq!(err.code, GateErrorCode::LedgerUnavailable);
}

#[tokio::test]
async fn openapi_and_unknown_routes() {
    let gate = spawn_test_gate(relaxed_settings()).await;

    let doc: Value = gate
        .client
        .get(format!("{}/openapi.json", gate.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/gate"]["post"].is_object());
    assert!(doc["paths"]["/gate/nonce"]["get"].is_object());

    let missing = gate
        .client
        .get(format!("{}/nope", gate.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
