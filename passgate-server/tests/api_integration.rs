//! API integration tests for passgate-server.
//!
//! Drives the registration and authentication endpoints end to end with a
//! software authenticator, using the default (in-memory, localhost) setup.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use passgate_core::encoding::b64url_decode;
use passgate_core::testing::{AssertionOptions, RegistrationOptions, SoftAuthenticator, TestKey};
use passgate_core::{AuthenticatorFlags, Challenge, ExpectedFactor};
use serde_json::{json, Value};
use tower::ServiceExt;
use passgate_server::create_router;

const ORIGIN: &str = "http://localhost:3001";

fn create_test_app() -> Router {
    create_router().expect("default settings are valid")
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Rebuild a challenge from the base64url value in the options
fn challenge_from(options: &Value) -> Challenge {
    let value = b64url_decode(options["challenge"].as_str().unwrap()).unwrap();
    Challenge {
        value,
        issued_at: Utc::now(),
        expires_at: Utc::now(),
        user_id: None,
        factor: ExpectedFactor::Either,
    }
}

/// Register a fresh credential and return the user handle
async fn register(app: &Router, authenticator: &SoftAuthenticator) -> String {
    let (status, start) = send(
        app,
        "POST",
        "/webauthn/register/start",
        Some(json!({ "user_name": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{start}");

    let challenge = challenge_from(&start["public_key"]);
    let response = authenticator.register(&challenge, &RegistrationOptions::packed_self(ORIGIN));
    let (status, summary) = send(
        app,
        "POST",
        "/webauthn/register/finish",
        Some(json!({ "response": response })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["user_id"], start["user_id"]);

    start["user_id"].as_str().unwrap().to_string()
}

async fn authenticate(
    app: &Router,
    authenticator: &SoftAuthenticator,
    user_id: &str,
    options: AssertionOptions,
) -> (StatusCode, Value) {
    let (status, start) = send(
        app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": user_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{start}");

    let challenge = challenge_from(&start["public_key"]);
    let response = authenticator.assert(&challenge, &options);
    send(
        app,
        "POST",
        "/webauthn/authenticate/finish",
        Some(json!({ "response": response })),
    )
    .await
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();
    let (status, body) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "passgate-server");
    assert_eq!(body["storage"], "memory");
    assert_eq!(body["persistent"], false);
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = create_test_app();
    let (status, body) = send(&app, "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

// ============================================================================
// Ceremony Flow Tests
// ============================================================================

#[tokio::test]
async fn test_register_start_returns_creation_options() {
    let app = create_test_app();
    let (status, body) = send(&app, "POST", "/webauthn/register/start", Some(json!({}))).await;

    assert_eq!(status, StatusCode::OK);
    let options = &body["public_key"];
    assert_eq!(options["rp"]["id"], "localhost");
    assert_eq!(options["user"]["name"], "passgate-user");
    assert_eq!(options["user"]["id"], body["user_id"]);
    assert!(!options["pubKeyCredParams"].as_array().unwrap().is_empty());

    let challenge = b64url_decode(options["challenge"].as_str().unwrap()).unwrap();
    assert!(challenge.len() >= 16);
}

#[tokio::test]
async fn test_register_then_authenticate() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let user_id = register(&app, &authenticator).await;

    let (status, body) =
        authenticate(&app, &authenticator, &user_id, AssertionOptions::new(ORIGIN, 1)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sign_count"], 1);
    assert_eq!(body["user_verified"], false);

    let (status, body) =
        authenticate(&app, &authenticator, &user_id, AssertionOptions::new(ORIGIN, 2)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["sign_count"], 2);
}

#[tokio::test]
async fn test_counter_replay_is_forbidden() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::ed25519());
    let user_id = register(&app, &authenticator).await;

    let (status, _) =
        authenticate(&app, &authenticator, &user_id, AssertionOptions::new(ORIGIN, 5)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        authenticate(&app, &authenticator, &user_id, AssertionOptions::new(ORIGIN, 5)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "COUNTER_REPLAY");
}

#[tokio::test]
async fn test_replayed_response_rejected() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let user_id = register(&app, &authenticator).await;

    let (_, start) = send(
        &app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": user_id })),
    )
    .await;
    let response =
        authenticator.assert(&challenge_from(&start["public_key"]), &AssertionOptions::new(ORIGIN, 1));
    let body = json!({ "response": response });

    let (status, _) = send(&app, "POST", "/webauthn/authenticate/finish", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", "/webauthn/authenticate/finish", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CHALLENGE_EXPIRED_OR_CONSUMED");
}

#[tokio::test]
async fn test_wrong_origin_rejected() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let user_id = register(&app, &authenticator).await;

    let mut options = AssertionOptions::new(ORIGIN, 1);
    options.origin = "http://evil.localhost:3001".into();
    let (status, body) = authenticate(&app, &authenticator, &user_id, options).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ORIGIN_MISMATCH");
}

#[tokio::test]
async fn test_first_factor_requires_user_verification() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let user_id = register(&app, &authenticator).await;

    let (_, start) = send(
        &app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": user_id, "factor": "first" })),
    )
    .await;
    assert_eq!(start["public_key"]["userVerification"], "required");

    // A factor in the finish body is ignored; the one chosen at start applies.
    let response =
        authenticator.assert(&challenge_from(&start["public_key"]), &AssertionOptions::new(ORIGIN, 1));
    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/authenticate/finish",
        Some(json!({ "response": response, "factor": "second" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "FLAG_POLICY_VIOLATION");
}

#[tokio::test]
async fn test_first_factor_passes_with_user_verification() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let user_id = register(&app, &authenticator).await;

    let (_, start) = send(
        &app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": user_id, "factor": "first" })),
    )
    .await;

    let mut options = AssertionOptions::new(ORIGIN, 1);
    options.flags |= AuthenticatorFlags::USER_VERIFIED;
    let response = authenticator.assert(&challenge_from(&start["public_key"]), &options);
    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/authenticate/finish",
        Some(json!({ "response": response })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user_verified"], true);
}

#[tokio::test]
async fn test_registration_factor_fixed_at_start() {
    let app = create_test_app();
    let (_, start) = send(
        &app,
        "POST",
        "/webauthn/register/start",
        Some(json!({ "factor": "first" })),
    )
    .await;
    assert_eq!(
        start["public_key"]["authenticatorSelection"]["userVerification"],
        "required"
    );

    // UP only
    let response = SoftAuthenticator::new(TestKey::es256()).register(
        &challenge_from(&start["public_key"]),
        &RegistrationOptions::packed_self(ORIGIN),
    );
    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/register/finish",
        Some(json!({ "response": response, "factor": "second" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "FLAG_POLICY_VIOLATION");
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[tokio::test]
async fn test_authenticate_unknown_user() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": "bm9ib2R5" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CREDENTIAL_NOT_FOUND");
}

#[tokio::test]
async fn test_authenticate_invalid_user_id() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/authenticate/start",
        Some(json!({ "user_id": "not base64!" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn test_finish_registration_without_challenge() {
    let app = create_test_app();
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let challenge = Challenge {
        value: vec![7u8; 32],
        issued_at: Utc::now(),
        expires_at: Utc::now(),
        user_id: None,
        factor: ExpectedFactor::Either,
    };
    let response = authenticator.register(&challenge, &RegistrationOptions::packed_self(ORIGIN));

    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/register/finish",
        Some(json!({ "response": response })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CHALLENGE_EXPIRED_OR_CONSUMED");
}

#[tokio::test]
async fn test_malformed_attestation_object() {
    let app = create_test_app();
    let (_, start) = send(&app, "POST", "/webauthn/register/start", Some(json!({}))).await;
    let authenticator = SoftAuthenticator::new(TestKey::es256());
    let mut response = authenticator.register(
        &challenge_from(&start["public_key"]),
        &RegistrationOptions::packed_self(ORIGIN),
    );
    response.response.attestation_object.truncate(10);

    let (status, body) = send(
        &app,
        "POST",
        "/webauthn/register/finish",
        Some(json!({ "response": response })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "DECODE_ERROR");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = create_test_app();
    let (status, _) = send(&app, "GET", "/webauthn/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
