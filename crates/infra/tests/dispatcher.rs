//! Tests for domain-scoped bearer injection. Each test points the
//! config at a live mock origin and inspects what actually arrived.

use std::path::{Path, PathBuf};

use keyrelay_infra::ScopedBearerDispatcher;
use wiremock::matchers::{any, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    _dir: tempfile::TempDir,
    config_path: PathBuf,
    token_path: PathBuf,
}

/// Write a config file scoped to `api_base_url` and, optionally, a token
/// record next to it.
fn setup(api_base_url: &str, access_token: Option<&str>) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    let token_path = dir.path().join("tokens.json");

    let config = serde_json::json!({
        "client_id": "client",
        "client_secret": "secret",
        "issuer_url": "https://issuer.example.com",
        "api_base_url": api_base_url,
        "token_path": token_path,
    });
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    if let Some(token) = access_token {
        write_token(&token_path, token);
    }

    Setup { _dir: dir, config_path, token_path }
}

fn write_token(path: &Path, access_token: &str) {
    let record = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600,
        "issued_at": chrono::Utc::now().timestamp_millis(),
    });
    std::fs::write(path, serde_json::to_string_pretty(&record).unwrap()).unwrap();
}

fn get_request(url: &str) -> reqwest::Request {
    reqwest::Client::new().get(url).build().unwrap()
}

#[tokio::test]
async fn injects_bearer_for_exact_host_match() {
    let api = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer tok123"))
        .and(header("x-keyrelay-auth-type", "OAUTH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&api)
        .await;

    let setup = setup(&api.uri(), Some("tok123"));
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    let response = dispatcher.execute(get_request(&format!("{}/data", api.uri()))).await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn out_of_scope_host_gets_no_token() {
    let other = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&other).await;

    // Token is scoped to a host the request does not target
    let setup = setup("https://api.internal.example.com", Some("tok123"));
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    dispatcher.execute(get_request(&format!("{}/data", other.uri()))).await.unwrap();

    let requests = other.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    assert!(requests[0].headers.get("x-keyrelay-auth-type").is_none());
}

#[tokio::test]
async fn lookalike_host_gets_no_token() {
    let lookalike = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&lookalike).await;

    // Suffix-style matching would hand the token to
    // api.example.com.evil.test; exact equality must not
    let setup = setup("https://api.example.com", Some("tok123"));
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    dispatcher.execute(get_request(&format!("{}/steal", lookalike.uri()))).await.unwrap();

    let requests = lookalike.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn missing_token_file_sends_request_unauthenticated() {
    let api = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&api).await;

    let setup = setup(&api.uri(), None);
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    dispatcher.execute(get_request(&format!("{}/data", api.uri()))).await.unwrap();

    let requests = api.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn missing_config_file_sends_request_unauthenticated() {
    let api = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&api).await;

    let dispatcher = ScopedBearerDispatcher::new("/nonexistent/keyrelay/config.json");
    dispatcher.execute(get_request(&format!("{}/data", api.uri()))).await.unwrap();

    let requests = api.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn existing_authorization_header_is_preserved() {
    let api = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&api).await;

    let setup = setup(&api.uri(), Some("tok123"));
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    let request = reqwest::Client::new()
        .get(format!("{}/data", api.uri()))
        .header("authorization", "Bearer caller-token")
        .build()
        .unwrap();
    dispatcher.execute(request).await.unwrap();

    let requests = api.received_requests().await.unwrap();
    let auth = requests[0].headers.get("authorization").unwrap();
    assert_eq!(auth, "Bearer caller-token");
    // The marker header is still appended
    assert_eq!(requests[0].headers.get("x-keyrelay-auth-type").unwrap(), "OAUTH");
}

#[tokio::test]
async fn token_rotation_is_picked_up_per_request() {
    let api = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).mount(&api).await;

    let setup = setup(&api.uri(), Some("tok-first"));
    let dispatcher = ScopedBearerDispatcher::new(&setup.config_path);

    dispatcher.execute(get_request(&format!("{}/one", api.uri()))).await.unwrap();
    write_token(&setup.token_path, "tok-second");
    dispatcher.execute(get_request(&format!("{}/two", api.uri()))).await.unwrap();

    let requests = api.received_requests().await.unwrap();
    assert_eq!(requests[0].headers.get("authorization").unwrap(), "Bearer tok-first");
    assert_eq!(requests[1].headers.get("authorization").unwrap(), "Bearer tok-second");
}
