//! DeepSeek chat/completions translation client.
//! Connection pooling via reqwest, simple token-bucket rate limiting,
//! retry on 429 / 5xx / timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::language::TargetLanguage;
use super::{TranslateError, TranslationProvider};
use crate::config::ProviderConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_API_KEY_ENV: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

const MAX_429_RETRIES: u32 = 3;
const MAX_5XX_RETRIES: u32 = 2;
/// Ceiling on any single backoff, including a server-sent Retry-After.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(8);

/// DeepSeek chat/completions client (non-streaming).
pub struct DeepSeekClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    /// Simple token-bucket: tracks the next allowed request time.
    next_allowed: Arc<tokio::sync::Mutex<Instant>>,
    /// Minimum interval between requests (e.g. 100ms = 10 req/s).
    min_interval: Duration,
}

impl DeepSeekClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        min_interval: Duration,
    ) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(4)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .build()
            .map_err(|e| TranslateError::Misconfigured(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            next_allowed: Arc::new(tokio::sync::Mutex::new(Instant::now())),
            min_interval,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, TranslateError> {
        let api_key = config.resolve_api_key(DEFAULT_API_KEY_ENV)?;
        Self::new(
            api_key,
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.model.as_deref().unwrap_or(DEFAULT_MODEL),
            config.timeout(),
            Duration::from_millis(config.min_interval_ms),
        )
    }

    /// Wait until the rate limiter allows a request.
    async fn rate_limit_wait(&self) {
        let mut next = self.next_allowed.lock().await;
        let now = Instant::now();
        if *next > now {
            tokio::time::sleep(*next - now).await;
        }
        *next = Instant::now() + self.min_interval;
    }

    /// Send request with retry logic.
    /// 429: Retry-After or 1s/2s/4s (max 3).
    /// 5xx: exponential backoff (max 2).
    /// Timeout: immediate retry once.
    /// Each budget is counted separately; every wait is capped at `MAX_RETRY_WAIT`.
    async fn send_with_retry(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, TranslateError> {
        let mut rate_limited: u32 = 0;
        let mut server_errors: u32 = 0;
        let mut timeout_retried = false;

        loop {
            let result = self
                .http
                .post(format!("{}/v1/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(resp);
                }
                Ok(resp) if resp.status().as_u16() == 429 => {
                    let retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    if rate_limited >= MAX_429_RETRIES {
                        return Err(TranslateError::RateLimited {
                            retry_after_ms: retry_after.map_or(0, |d| d.as_millis() as u64),
                        });
                    }
                    let wait = rate_limit_wait_for(retry_after, rate_limited);
                    warn!(
                        attempt = rate_limited,
                        wait_ms = wait.as_millis() as u64,
                        "429 rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    rate_limited += 1;
                }
                Ok(resp) if resp.status().is_server_error() => {
                    if server_errors >= MAX_5XX_RETRIES {
                        return Err(TranslateError::ProviderUnavailable(format!(
                            "server error: {}",
                            resp.status()
                        )));
                    }
                    let wait = server_error_wait_for(server_errors);
                    warn!(
                        attempt = server_errors,
                        status = resp.status().as_u16(),
                        wait_ms = wait.as_millis() as u64,
                        "5xx error, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    server_errors += 1;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body_text = resp.text().await.unwrap_or_default();
                    return Err(TranslateError::ProviderUnavailable(format!(
                        "unexpected status {}: {}",
                        status,
                        body_text.chars().take(200).collect::<String>()
                    )));
                }
                Err(e) if e.is_timeout() => {
                    if timeout_retried {
                        return Err(TranslateError::Timeout);
                    }
                    warn!("request timeout, retrying once");
                    timeout_retried = true;
                }
                Err(e) => {
                    return Err(TranslateError::ProviderUnavailable(e.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl TranslationProvider for DeepSeekClient {
    async fn translate(
        &self,
        text: &str,
        target: &TargetLanguage,
    ) -> Result<String, TranslateError> {
        self.rate_limit_wait().await;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": build_user_prompt(text, target.as_str())}
            ],
            "max_tokens": estimate_max_tokens(text),
            "stream": false,
            "temperature": 0.1
        });

        let resp = self.send_with_retry(&body).await?;
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| TranslateError::ProviderUnavailable(format!("bad response: {e}")))?;

        if let Some(usage) = parsed.usage {
            debug!(tokens = usage.total_tokens, "deepseek usage");
        }

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "deepseek"
    }
}

/// Backoff after a 429: the server's Retry-After if given, else 1s/2s/4s.
fn rate_limit_wait_for(retry_after: Option<Duration>, attempt: u32) -> Duration {
    retry_after
        .unwrap_or_else(|| Duration::from_secs(1 << attempt.min(3)))
        .min(MAX_RETRY_WAIT)
}

/// Backoff after a 5xx: 500ms, 1s, ...
fn server_error_wait_for(attempt: u32) -> Duration {
    Duration::from_millis(500 * (1 << attempt.min(4))).min(MAX_RETRY_WAIT)
}

// --- Prompt construction ---

/// System prompt kept under 60 tokens.
const SYSTEM_PROMPT: &str = "You are a translator. Output only the translation, nothing else.";

/// Build compact user prompt: {"t":"text","l":"lang"}
fn build_user_prompt(text: &str, target_lang: &str) -> String {
    serde_json::json!({ "t": text, "l": target_lang }).to_string()
}

/// Estimate max_tokens: (input_tokens * 1.15 + 32), clamped to 64..=768.
fn estimate_max_tokens(text: &str) -> u32 {
    // Rough: ~4 chars/token for Latin, ~1.5 for CJK
    let estimated_input_tokens = text.len() as f64 / 3.0;
    let max = (estimated_input_tokens * 1.15 + 32.0) as u32;
    max.clamp(64, 768)
}

// --- Response types ---

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}
