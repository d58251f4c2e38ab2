//! End-to-end tests of the redirect handshake against a mocked backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;

use dash_oauth_login::auth::{ApiClient, RedirectFlow, RedirectPhase};
use dash_oauth_login::config::{AuthConfig, Location};
use dash_oauth_login::popup::WindowHandle;

/// Window fake that counts close calls.
struct TestWindow {
    closed: AtomicBool,
    close_calls: AtomicUsize,
}

impl TestWindow {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl WindowHandle for TestWindow {
    fn focus(&self) {}

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn auth_config() -> AuthConfig {
    AuthConfig {
        oauth_client_id: "client-123".to_string(),
        plotly_domain: "https://plot.ly".to_string(),
        requests_pathname_prefix: "/".to_string(),
    }
}

fn api_for(origin: &str) -> ApiClient {
    let location = Location {
        origin: origin.to_string(),
    };
    let api = ApiClient::new(&location, &auth_config()).unwrap();
    api.add_cookie("_csrf_token=csrf-abc");
    api
}

fn redirect_url() -> Url {
    Url::parse("http://127.0.0.1:8050/_oauth-redirect#access_token=tok-1").unwrap()
}

#[tokio::test]
async fn authorized_flow_closes_the_window_exactly_once() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/_dash-login")
        .match_header("x-csrftoken", "csrf-abc")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({ "access_token": "tok-1" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create_async()
        .await;
    let check = server
        .mock("GET", "/_is-authorized")
        .match_header("x-csrftoken", "csrf-abc")
        .with_status(200)
        .create_async()
        .await;

    let mut flow = RedirectFlow::new(api_for(&server.url()));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();

    let phase = flow
        .run(&redirect_url(), &window, &cancel)
        .await
        .unwrap();

    assert_eq!(phase, RedirectPhase::Authorized);
    assert_eq!(window.close_calls(), 1);
    assert!(window.is_closed());
    login.assert_async().await;
    check.assert_async().await;
}

#[tokio::test]
async fn denied_flow_reports_not_authorized_and_keeps_the_window_open() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/_dash-login")
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("GET", "/_is-authorized")
        .with_status(403)
        .create_async()
        .await;

    let mut flow = RedirectFlow::new(api_for(&server.url()));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();

    let phase = flow
        .run(&redirect_url(), &window, &cancel)
        .await
        .unwrap();

    assert_eq!(phase, RedirectPhase::Denied);
    assert!(phase.describe().contains("not authorized"));
    assert_eq!(window.close_calls(), 0);
    assert!(!window.is_closed());
}

#[tokio::test]
async fn failed_login_skips_the_authorization_check() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/_dash-login")
        .with_status(500)
        .with_body(r#"{"error": "bad token"}"#)
        .create_async()
        .await;
    let check = server
        .mock("GET", "/_is-authorized")
        .expect(0)
        .create_async()
        .await;

    let mut flow = RedirectFlow::new(api_for(&server.url()));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();

    let phase = flow
        .run(&redirect_url(), &window, &cancel)
        .await
        .unwrap();

    match &phase {
        RedirectPhase::LoginFailed { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body.as_ref().unwrap(), &json!({ "error": "bad token" }));
        }
        other => panic!("expected LoginFailed, got {other:?}"),
    }
    assert!(phase.describe().contains("error occurred trying to log in"));
    assert!(phase.describe().contains("bad token"));
    assert_eq!(window.close_calls(), 0);
    check.assert_async().await;
}

#[tokio::test]
async fn network_failure_surfaces_as_generic_login_error() {
    // Nothing listens here; the exchange fails at the network level.
    let mut flow = RedirectFlow::new(api_for("http://127.0.0.1:9"));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();

    let phase = flow
        .run(&redirect_url(), &window, &cancel)
        .await
        .unwrap();

    match phase {
        RedirectPhase::LoginFailed { status, body } => {
            assert_eq!(status, 500);
            assert!(body.is_some(), "network error content should be shown");
        }
        other => panic!("expected LoginFailed, got {other:?}"),
    }
    assert_eq!(window.close_calls(), 0);
}

#[tokio::test]
async fn missing_fragment_token_sends_empty_body() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/_dash-login")
        .match_body(Matcher::Json(json!({})))
        .with_status(200)
        .with_body("{}")
        .create_async()
        .await;
    server
        .mock("GET", "/_is-authorized")
        .with_status(403)
        .create_async()
        .await;

    let mut flow = RedirectFlow::new(api_for(&server.url()));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();

    let bare = Url::parse("http://127.0.0.1:8050/_oauth-redirect").unwrap();
    let phase = flow.run(&bare, &window, &cancel).await.unwrap();

    assert_eq!(phase, RedirectPhase::Denied);
    login.assert_async().await;
}

#[tokio::test]
async fn two_mounts_issue_one_request_pair_each() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/_dash-login")
        .with_status(200)
        .with_body("{}")
        .expect(2)
        .create_async()
        .await;
    let check = server
        .mock("GET", "/_is-authorized")
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let cancel = CancellationToken::new();
    for _ in 0..2 {
        let mut flow = RedirectFlow::new(api_for(&server.url()));
        let window = TestWindow::new();
        let phase = flow
            .run(&redirect_url(), &window, &cancel)
            .await
            .unwrap();
        assert_eq!(phase, RedirectPhase::Authorized);
        assert_eq!(window.close_calls(), 1);
    }

    login.assert_async().await;
    check.assert_async().await;
}

#[tokio::test]
async fn cancelled_flow_makes_no_state_updates() {
    let mut server = mockito::Server::new_async().await;
    let login = server
        .mock("POST", "/_dash-login")
        .expect(0)
        .create_async()
        .await;

    let mut flow = RedirectFlow::new(api_for(&server.url()));
    let window = TestWindow::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = flow.run(&redirect_url(), &window, &cancel).await;
    assert!(result.is_err());
    assert_eq!(window.close_calls(), 0);
    login.assert_async().await;
}
