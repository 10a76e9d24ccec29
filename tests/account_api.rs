// Integration tests for the account API
//
// Covers the login/two-factor/OAuth flows and the header-carried token
// convention: authentication responses deliver tokens in the Authorization
// response header, never in the body.

use reqwest::Url;
use std::sync::Arc;

use autoflow_client::api::{AccountApi, LoginOutcome, OAuthExchange};
use autoflow_client::auth::{RefreshChannel, RefreshCoordinator, SessionEvents, TokenStore};
use autoflow_client::client::AuthClient;
use autoflow_client::error::ApiError;

// ==================================================================================================
// Test Helpers
// ==================================================================================================

struct TestRig {
    server: mockito::ServerGuard,
    account: AccountApi,
    store: Arc<TokenStore>,
    _dir: tempfile::TempDir,
}

async fn rig() -> TestRig {
    let server = mockito::Server::new_async().await;
    let base = Url::parse(&server.url()).expect("mock server URL");

    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(TokenStore::open(&dir.path().join("auth.db")).expect("token store"));
    let session = Arc::new(SessionEvents::new(store.clone()));
    let channel = Arc::new(RefreshChannel::new(&base, 5, 10).expect("refresh channel"));
    let coordinator = Arc::new(RefreshCoordinator::new(
        store.clone(),
        channel,
        session.clone(),
    ));
    let client = Arc::new(
        AuthClient::new(base, store.clone(), coordinator, 5, 10).expect("auth client"),
    );
    let account = AccountApi::new(client, store.clone());

    TestRig {
        server,
        account,
        store,
        _dir: dir,
    }
}

// ==================================================================================================
// Login
// ==================================================================================================

#[tokio::test]
async fn test_login_stores_header_token() {
    let mut rig = rig().await;

    let login = rig
        .server
        .mock("POST", "/auth/login")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "email": "user@example.com",
            "password": "hunter2"
        })))
        .with_status(200)
        .with_header("authorization", "Bearer T1")
        .expect(1)
        .create_async()
        .await;

    let outcome = rig.account.login("user@example.com", "hunter2").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::LoggedIn));
    assert_eq!(rig.store.get().await, Some("T1".to_string()));
    login.assert_async().await;
}

#[tokio::test]
async fn test_login_with_two_factor_step() {
    let mut rig = rig().await;

    let _login = rig
        .server
        .mock("POST", "/auth/login")
        .with_status(202)
        .with_header("authorization", "Bearer CHALLENGE")
        .expect(1)
        .create_async()
        .await;

    let outcome = rig.account.login("user@example.com", "hunter2").await.unwrap();
    let challenge = match outcome {
        LoginOutcome::TwoFactorRequired { challenge } => challenge,
        other => panic!("unexpected outcome: {:?}", other),
    };
    assert_eq!(challenge, "CHALLENGE");

    // The challenge token is not a session token and must not be stored
    assert_eq!(rig.store.get().await, None);

    let verify = rig
        .server
        .mock("POST", "/auth/2fa/verify")
        .match_header("authorization", "Bearer CHALLENGE")
        .match_body(mockito::Matcher::Json(serde_json::json!({"code": "123456"})))
        .with_status(200)
        .with_header("authorization", "Bearer T1")
        .expect(1)
        .create_async()
        .await;

    rig.account
        .verify_two_factor(&challenge, "123456")
        .await
        .unwrap();
    assert_eq!(rig.store.get().await, Some("T1".to_string()));
    verify.assert_async().await;
}

#[tokio::test]
async fn test_login_missing_header_is_error() {
    let mut rig = rig().await;

    let _login = rig
        .server
        .mock("POST", "/auth/login")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let err = rig
        .account
        .login("user@example.com", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingToken));
    assert_eq!(rig.store.get().await, None);
}

#[tokio::test]
async fn test_login_rejection_passes_through() {
    let mut rig = rig().await;

    let _login = rig
        .server
        .mock("POST", "/auth/login")
        .with_status(400)
        .with_body("bad credentials")
        .expect(1)
        .create_async()
        .await;

    let err = rig
        .account
        .login("user@example.com", "wrong")
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "bad credentials");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

// ==================================================================================================
// OAuth
// ==================================================================================================

#[tokio::test]
async fn test_oauth_exchange_stores_token() {
    let mut rig = rig().await;

    let exchange = rig
        .server
        .mock("POST", "/auth/login/google")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "code": "authcode",
            "idToken": "idtok",
            "nonce": "n0nce",
            "locale": "en"
        })))
        .with_status(200)
        .with_header("authorization", "Bearer T1")
        .expect(1)
        .create_async()
        .await;

    rig.account
        .oauth_login(
            "google",
            &OAuthExchange {
                code: "authcode",
                id_token: Some("idtok"),
                nonce: Some("n0nce"),
                locale: Some("en"),
            },
        )
        .await
        .unwrap();

    assert_eq!(rig.store.get().await, Some("T1".to_string()));
    exchange.assert_async().await;
}

// ==================================================================================================
// Signup and Verification
// ==================================================================================================

#[tokio::test]
async fn test_signup_omits_absent_locale() {
    let mut rig = rig().await;

    let signup = rig
        .server
        .mock("POST", "/auth/signup")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "email": "new@example.com",
            "password": "hunter2"
        })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    rig.account
        .signup("new@example.com", "hunter2", None)
        .await
        .unwrap();
    signup.assert_async().await;
}

#[tokio::test]
async fn test_verify_email() {
    let mut rig = rig().await;

    let verify = rig
        .server
        .mock("GET", "/auth/verify/CODE123")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    rig.account.verify_email("CODE123").await.unwrap();
    verify.assert_async().await;
}

// ==================================================================================================
// Logout
// ==================================================================================================

#[tokio::test]
async fn test_logout_clears_session_and_is_idempotent() {
    let rig = rig().await;
    rig.store.set("T1").await;

    rig.account.logout().await;
    assert_eq!(rig.store.get().await, None);

    rig.account.logout().await;
    assert_eq!(rig.store.get().await, None);
}
