//! HTTP surface: `POST /translate`, `GET /health`, `GET /metrics`.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info_span, warn, Instrument};

use crate::metrics::MetricsSnapshot;
use crate::translate::{Outcome, TranslationService};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
pub const OUTCOME_HEADER: HeaderName = HeaderName::from_static("x-translation-outcome");

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranslationService>,
}

/// Request body. Field names are matched leniently; missing or null fields are empty.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TranslateBody {
    #[serde(alias = "Text", deserialize_with = "null_as_empty")]
    pub text: String,
    #[serde(
        rename = "languageCode",
        alias = "LanguageCode",
        alias = "language_code",
        deserialize_with = "null_as_empty"
    )]
    pub language_code: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateReply {
    pub text: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/translate", post(translate))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        // Texts of any length are accepted.
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `POST /translate`. Always 200 once the body decodes; failures carry an
/// empty `text` and are told apart by the outcome header.
async fn translate(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("translate", request_id = %request_id);

    async move {
        let req: TranslateBody = match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "request body rejected");
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        };

        let result = state
            .service
            .translate(&req.text, &req.language_code)
            .await;
        let outcome = Outcome::of(&result);
        debug!(outcome = outcome.as_str(), target_lang = %req.language_code, "lookup finished");

        let text = result.map(|t| t.text).unwrap_or_default();
        let mut response = Json(TranslateReply { text }).into_response();
        let headers = response.headers_mut();
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            headers.insert(REQUEST_ID_HEADER, v);
        }
        headers.insert(OUTCOME_HEADER, HeaderValue::from_static(outcome.as_str()));
        response
    }
    .instrument(span)
    .await
}

/// `GET /health`
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.service.cache_name(),
        "provider": state.service.provider_name(),
    }))
}

/// `GET /metrics`
async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsRegistry;
    use crate::translate::testing::{FakeProvider, FlakyStore};
    use crate::translate::TranslateError;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app_with(provider: FakeProvider) -> (Router, Arc<FlakyStore>) {
        let cache = Arc::new(FlakyStore::default());
        let service = TranslationService::new(
            Arc::new(provider),
            cache.clone(),
            Arc::new(MetricsRegistry::new()),
        );
        let app = router(AppState {
            service: Arc::new(service),
        });
        (app, cache)
    }

    fn post_translate(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/translate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(resp: Response) -> Vec<u8> {
        axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn translates_and_reports_outcome() {
        let (app, _) = app_with(FakeProvider::new(vec![("hello", "bonjour")]));

        let resp = app
            .clone()
            .oneshot(post_translate(r#"{"text":"hello","languageCode":"fr"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "miss");
        assert!(resp.headers().contains_key(&REQUEST_ID_HEADER));
        let reply: TranslateReply = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(reply.text, "bonjour");

        let resp = app
            .oneshot(post_translate(r#"{"text":"hello","languageCode":"fr"}"#))
            .await
            .unwrap();
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "hit");
    }

    #[tokio::test]
    async fn malformed_body_is_400_with_text() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let resp = app.oneshot(post_translate("{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = String::from_utf8(read_body(resp).await).unwrap();
        assert!(!body.is_empty());
    }

    #[tokio::test]
    async fn wrong_field_type_is_400() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let resp = app
            .oneshot(post_translate(r#"{"text": 5, "languageCode": "fr"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_language_is_200_with_empty_text() {
        let (app, _) = app_with(FakeProvider::new(vec![("hello", "bonjour")]));
        let resp = app
            .oneshot(post_translate(r#"{"text":"hello","languageCode":"??"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "invalid_language");
        let reply: TranslateReply = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(reply.text, "");
    }

    #[tokio::test]
    async fn provider_failure_is_200_with_empty_text() {
        let (app, _) = app_with(FakeProvider::failing(TranslateError::Timeout));
        let resp = app
            .oneshot(post_translate(r#"{"text":"hello","languageCode":"fr"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "provider_unavailable");
        let reply: TranslateReply = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert!(reply.text.is_empty());
    }

    #[tokio::test]
    async fn accepts_capitalized_fields_without_content_type() {
        let (app, _) = app_with(FakeProvider::new(vec![("hello", "hola")]));
        let req = Request::builder()
            .method("POST")
            .uri("/translate")
            .body(Body::from(r#"{"Text":"hello","LanguageCode":"es"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let reply: TranslateReply = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(reply.text, "hola");
    }

    #[tokio::test]
    async fn missing_fields_default_to_empty() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let resp = app.oneshot(post_translate("{}")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "no_translation");
    }

    #[tokio::test]
    async fn null_fields_are_treated_as_empty() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let resp = app
            .oneshot(post_translate(r#"{"text":null,"languageCode":null}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "no_translation");
    }

    #[tokio::test]
    async fn bodies_above_two_mebibytes_are_accepted() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let text = "a".repeat(3 * 1024 * 1024);
        let body = serde_json::to_string(&json!({"text": text, "languageCode": "??"})).unwrap();
        let resp = app.oneshot(post_translate(&body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[&OUTCOME_HEADER], "invalid_language");
    }

    #[tokio::test]
    async fn health_and_metrics() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["cache"], "flaky");
        assert_eq!(body["provider"], "fake");

        let resp = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(&read_body(resp).await).unwrap();
        assert!(body["counters"].is_object());
        assert!(body["histograms"].is_object());
    }

    #[tokio::test]
    async fn get_on_translate_is_rejected() {
        let (app, _) = app_with(FakeProvider::new(Vec::new()));
        let resp = app
            .oneshot(Request::builder().uri("/translate").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
