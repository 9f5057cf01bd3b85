//! Google Cloud Translation (v2 REST) client.
//! One `POST /language/translate/v2` per lookup, plain-text format.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::language::TargetLanguage;
use super::{TranslateError, TranslationProvider};
use crate::config::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_TRANSLATE_API_KEY";
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GoogleTranslateClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleTranslateClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Misconfigured(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, TranslateError> {
        let api_key = config.resolve_api_key(DEFAULT_API_KEY_ENV)?;
        Self::new(
            api_key,
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.timeout(),
        )
    }
}

#[derive(Serialize)]
struct TranslateBody<'a> {
    q: [&'a str; 1],
    target: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Deserialize)]
struct TranslateData {
    #[serde(default)]
    translations: Vec<TranslatedItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslatedItem {
    translated_text: String,
}

#[async_trait]
impl TranslationProvider for GoogleTranslateClient {
    async fn translate(
        &self,
        text: &str,
        target: &TargetLanguage,
    ) -> Result<String, TranslateError> {
        let body = TranslateBody {
            q: [text],
            target: target.as_str(),
            format: "text",
        };

        let resp = self
            .http
            .post(format!("{}/language/translate/v2", self.base_url))
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslateError::Timeout
                } else {
                    // the error ends up in logs; keep the endpoint URL out of it
                    TranslateError::ProviderUnavailable(e.without_url().to_string())
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(0);
            return Err(TranslateError::RateLimited { retry_after_ms });
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "google translate rejected request");
            return Err(TranslateError::ProviderUnavailable(format!(
                "unexpected status {}: {}",
                status,
                body_text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| {
                TranslateError::ProviderUnavailable(format!("bad response: {}", e.without_url()))
            })?;

        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslateError::NoTranslation)
    }

    fn name(&self) -> &'static str {
        "google"
    }
}
