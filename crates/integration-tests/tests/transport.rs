//! HTTP transport behaviour of `ApiClient` against the mock backend.
//!
//! Run with: cargo test -p bookshop-integration-tests

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use bookshop_integration_tests::{
    ALICE_ID, ALICE_PASSWORD, ALICE_TOKEN, ALICE_USERNAME, DUNE, MockBackend,
};
use bookshop_storefront::api::{CartStore, ProfileStore, RegisterRequest};
use bookshop_storefront::error::NETWORK_MESSAGE;
use bookshop_storefront::{ApiClient, ApiError, SessionHandle, StorefrontConfig};
use secrecy::SecretString;
use url::Url;

#[tokio::test]
async fn test_login_installs_session_and_sends_bearer() {
    let backend = MockBackend::start().await;
    let client = backend.client();

    let session = client.login(ALICE_USERNAME, ALICE_PASSWORD).await.unwrap();
    assert_eq!(session.identity().id, ALICE_ID);
    assert!(client.session().is_authenticated());
    assert!(!client.session().is_admin());

    client.get_cart(&session).await.unwrap();

    let requests = backend.requests();
    let login = &requests[0];
    assert_eq!(login.path, "/auth/login");
    assert_eq!(login.authorization, None);

    let cart = &requests[1];
    assert_eq!(cart.path, "/cart");
    assert_eq!(
        cart.authorization.as_deref(),
        Some(format!("Bearer {ALICE_TOKEN}").as_str())
    );
    assert!(requests.iter().all(|r| r.request_id.is_some()));
    assert_ne!(requests[0].request_id, requests[1].request_id);
}

#[tokio::test]
async fn test_bad_credentials_are_rejected_not_unauthorized() {
    let backend = MockBackend::start().await;
    let client = backend.client();

    let err = client.login(ALICE_USERNAME, "wrong").await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: 401,
            message: Some("Invalid username or password".to_string()),
        }
    );
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_401_on_authenticated_call_signs_out() {
    let backend = MockBackend::start().await;
    let client = backend.client();
    let session = client.login(ALICE_USERNAME, ALICE_PASSWORD).await.unwrap();

    backend.revoke_token(ALICE_TOKEN);
    let err = client.get_profile(&session).await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(client.session().current().is_none());
}

#[tokio::test]
async fn test_stale_401_does_not_sign_out_newer_session() {
    let backend = MockBackend::start().await;
    let client = backend.client();
    let stale = client.login(ALICE_USERNAME, ALICE_PASSWORD).await.unwrap();

    client
        .register(&RegisterRequest {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password: "Passw0rd!".to_string(),
            first_name: None,
            last_name: None,
            address: None,
            phone_number: None,
        })
        .await
        .unwrap();
    let carol = client.login("carol", "Passw0rd!").await.unwrap();

    backend.revoke_token(ALICE_TOKEN);
    let err = client.get_cart(&stale).await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(client.session().current().unwrap().is_same(&carol));
}

#[tokio::test]
async fn test_resume_restores_identity_from_profile() {
    let backend = MockBackend::start().await;
    let client = backend.client();

    let session = client
        .resume(SecretString::from(ALICE_TOKEN.to_string()))
        .await
        .unwrap();
    assert_eq!(session.identity().id, ALICE_ID);
    assert_eq!(session.identity().username, ALICE_USERNAME);
    assert!(client.session().is_authenticated());

    let err = client
        .resume(SecretString::from("nope".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    // A failed resume leaves the existing session alone.
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn test_error_message_extraction() {
    let backend = MockBackend::start().await;
    let client = backend.client();

    backend.fail_next(400, r#"{"message": "Book is out of stock"}"#);
    let err = client.get_book(DUNE).await.unwrap_err();
    assert_eq!(err.user_message("fallback"), "Book is out of stock");

    backend.fail_next(503, "Service Unavailable");
    let err = client.get_book(DUNE).await.unwrap_err();
    assert_eq!(err.user_message("fallback"), "Service Unavailable");
    assert!(err.is_server_fault());

    backend.fail_next(500, "<html><body>Whitelabel Error Page</body></html>");
    let err = client.get_book(DUNE).await.unwrap_err();
    assert_eq!(err.user_message("fallback"), "fallback");

    backend.fail_next(500, r#"{"error": "Internal Server Error"}"#);
    let err = client.get_book(DUNE).await.unwrap_err();
    assert_eq!(err.user_message("fallback"), "fallback");
}

#[tokio::test]
async fn test_undecodable_body_is_a_decode_error() {
    let backend = MockBackend::start().await;
    let client = backend.client();

    backend.fail_next(200, "not json");
    let err = client.get_all_books().await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let config = StorefrontConfig {
        api_url: Url::parse("http://127.0.0.1:9").unwrap(),
        request_timeout: Duration::from_secs(2),
        ..StorefrontConfig::default()
    };
    let client = ApiClient::new(&config, SessionHandle::new());

    let err = client.get_all_books().await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.user_message("fallback"), NETWORK_MESSAGE);
}
