//! End-to-end: config → service → HTTP server over TCP, with a mocked provider.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use translate_proxy::cache::{CacheStore, SqliteStore};
use translate_proxy::config::{AppConfig, CacheBackend};
use translate_proxy::translate::key::derive_key;

async fn mock_google(server: &MockServer, text: &str, target: &str, translated: &str) {
    Mock::given(method("POST"))
        .and(path("/language/translate/v2"))
        .and(body_partial_json(json!({"q": [text], "target": target})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"translations": [{"translatedText": translated}]}
        })))
        .expect(1)
        .mount(server)
        .await;
}

fn config_for(provider: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.provider.api_key = Some("test-key".into());
    config.provider.base_url = Some(provider.uri());
    config.provider.timeout_secs = 5;
    config
}

/// Start the proxy on an ephemeral port; returns its base URL and shutdown handle.
async fn start(config: &AppConfig) -> (String, CancellationToken, tokio::task::JoinHandle<()>) {
    let service = translate_proxy::build_service(config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move {
        translate_proxy::serve(listener, service, token).await.unwrap();
    });
    (base, shutdown, handle)
}

async fn post(base: &str, body: Value) -> (u16, Option<String>, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/translate"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let outcome = resp
        .headers()
        .get("x-translation-outcome")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (status, outcome, resp.json().await.unwrap())
}

#[tokio::test]
async fn hello_bonjour_round_trip() {
    let provider = MockServer::start().await;
    mock_google(&provider, "hello", "fr", "bonjour").await;

    let (base, shutdown, handle) = start(&config_for(&provider)).await;

    let (status, outcome, body) = post(&base, json!({"text": "hello", "languageCode": "fr"})).await;
    assert_eq!(status, 200);
    assert_eq!(outcome.as_deref(), Some("miss"));
    assert_eq!(body, json!({"text": "bonjour"}));

    // Served from cache: the mock expects exactly one provider call.
    let (_, outcome, body) = post(&base, json!({"text": "hello", "languageCode": "fr"})).await;
    assert_eq!(outcome.as_deref(), Some("hit"));
    assert_eq!(body["text"], "bonjour");

    // Reverse direction was stored too.
    let (_, outcome, body) = post(&base, json!({"text": "bonjour", "languageCode": "en"})).await;
    assert_eq!(outcome.as_deref(), Some("hit"));
    assert_eq!(body["text"], "hello");

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn malformed_and_invalid_language_requests() {
    let provider = MockServer::start().await;
    let (base, shutdown, _handle) = start(&config_for(&provider)).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/translate"))
        .body("this is not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    assert!(!resp.text().await.unwrap().is_empty());

    let (status, outcome, body) =
        post(&base, json!({"text": "hello", "languageCode": "no such language"})).await;
    assert_eq!(status, 200);
    assert_eq!(outcome.as_deref(), Some("invalid_language"));
    assert_eq!(body, json!({"text": ""}));

    // the provider was never reached
    assert!(provider.received_requests().await.unwrap().is_empty());
    shutdown.cancel();
}

#[tokio::test]
async fn sqlite_backend_persists_both_directions() {
    let provider = MockServer::start().await;
    mock_google(&provider, "good morning", "de", "guten Morgen").await;

    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("cache.db");

    let mut config = config_for(&provider);
    config.cache.backend = CacheBackend::Sqlite;
    config.cache.path = db.clone();
    config.cache.key_prefix = "tp:".into();
    config.cache.hot_capacity = 16;

    let (base, shutdown, handle) = start(&config).await;
    let (_, _, body) = post(&base, json!({"text": "good morning", "languageCode": "de"})).await;
    assert_eq!(body["text"], "guten Morgen");
    shutdown.cancel();
    handle.await.unwrap();

    // Read the file back directly, bypassing the proxy.
    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(
        store.get(&derive_key("tp:", "good morning")).await.unwrap().as_deref(),
        Some("guten Morgen")
    );
    assert_eq!(
        store.get(&derive_key("tp:", "guten Morgen")).await.unwrap().as_deref(),
        Some("good morning")
    );
}

#[tokio::test]
async fn provider_outage_yields_empty_text() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&provider)
        .await;

    let (base, shutdown, _handle) = start(&config_for(&provider)).await;
    let (status, outcome, body) = post(&base, json!({"text": "hello", "languageCode": "fr"})).await;
    assert_eq!(status, 200);
    assert_eq!(outcome.as_deref(), Some("provider_unavailable"));
    assert_eq!(body["text"], "");

    let metrics: Value = reqwest::get(format!("{base}/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["counters"]["provider_error"], 1);
    assert_eq!(metrics["counters"]["cache_miss"], 1);
    shutdown.cancel();
}

#[tokio::test]
async fn missing_api_key_fails_startup() {
    let mut config = AppConfig::default();
    config.provider.api_key_env = Some("TRANSLATE_PROXY_TEST_KEY_THAT_IS_NEVER_SET".into());
    assert!(translate_proxy::build_service(&config).await.is_err());
}
