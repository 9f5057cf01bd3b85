//! Translation lookup: cache-first, provider fallback, bidirectional write-back.

pub mod deepseek;
pub mod google;
pub mod inflight;
pub mod key;
pub mod language;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::config::{ProviderConfig, ProviderKind};
use crate::metrics::{metric_names, MetricsRegistry};

use self::deepseek::DeepSeekClient;
use self::google::GoogleTranslateClient;
use self::inflight::InFlight;
use self::key::derive_key;
use self::language::TargetLanguage;

/// Successful lookup result.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub text: String,
    /// True when served from the cache without a provider call.
    pub cached: bool,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("invalid language code {code:?}: {reason}")]
    InvalidLanguage { code: String, reason: String },
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("translation timeout")]
    Timeout,
    #[error("provider returned no translation")]
    NoTranslation,
    #[error("provider misconfigured: {0}")]
    Misconfigured(String),
}

/// What happened to a lookup, as reported to HTTP callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Hit,
    Miss,
    InvalidLanguage,
    ProviderUnavailable,
    NoTranslation,
}

impl Outcome {
    pub fn of(result: &Result<Translation, TranslateError>) -> Self {
        match result {
            Ok(t) if t.cached => Outcome::Hit,
            Ok(_) => Outcome::Miss,
            Err(TranslateError::InvalidLanguage { .. }) => Outcome::InvalidLanguage,
            Err(TranslateError::NoTranslation) => Outcome::NoTranslation,
            Err(
                TranslateError::ProviderUnavailable(_)
                | TranslateError::RateLimited { .. }
                | TranslateError::Timeout
                | TranslateError::Misconfigured(_),
            ) => Outcome::ProviderUnavailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Hit => "hit",
            Outcome::Miss => "miss",
            Outcome::InvalidLanguage => "invalid_language",
            Outcome::ProviderUnavailable => "provider_unavailable",
            Outcome::NoTranslation => "no_translation",
        }
    }
}

/// Adapter for external translation services.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Translate `text` into `target`. An empty string means the provider had
    /// nothing to offer; the service maps it to [`TranslateError::NoTranslation`].
    async fn translate(&self, text: &str, target: &TargetLanguage)
        -> Result<String, TranslateError>;

    fn name(&self) -> &'static str;
}

/// Build the configured provider client.
pub fn open_provider(
    config: &ProviderConfig,
) -> Result<Arc<dyn TranslationProvider>, TranslateError> {
    let provider: Arc<dyn TranslationProvider> = match config.kind {
        ProviderKind::Google => Arc::new(GoogleTranslateClient::from_config(config)?),
        ProviderKind::Deepseek => Arc::new(DeepSeekClient::from_config(config)?),
    };
    info!(provider = provider.name(), "translation provider initialized");
    Ok(provider)
}

/// The lookup orchestrator. Provider and cache are injected so either can be
/// swapped for a fake.
pub struct TranslationService {
    provider: Arc<dyn TranslationProvider>,
    cache: Arc<dyn CacheStore>,
    metrics: Arc<MetricsRegistry>,
    key_prefix: String,
    inflight: Option<InFlight<Result<String, TranslateError>>>,
}

impl TranslationService {
    pub fn new(
        provider: Arc<dyn TranslationProvider>,
        cache: Arc<dyn CacheStore>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            provider,
            cache,
            metrics,
            key_prefix: String::new(),
            inflight: Some(InFlight::new()),
        }
    }

    /// Namespace every cache key with `prefix`.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Enable or disable sharing of concurrent identical misses.
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.inflight = enabled.then(InFlight::new);
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn cache_name(&self) -> &'static str {
        self.cache.name()
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Look `text` up in the cache; on a miss translate it into `language_code`
    /// and store both directions.
    pub async fn translate(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Translation, TranslateError> {
        let start = Instant::now();
        let span = self.metrics.span(metric_names::LOOKUP);
        let result = self.lookup(text, language_code, start).await;
        span.finish();

        if let Err(ref e) = result {
            match e {
                TranslateError::InvalidLanguage { .. } => {
                    self.metrics.incr(metric_names::INVALID_LANGUAGE)
                }
                TranslateError::NoTranslation => self.metrics.incr(metric_names::NO_TRANSLATION),
                _ => self.metrics.incr(metric_names::PROVIDER_ERROR),
            }
        }
        result
    }

    async fn lookup(
        &self,
        text: &str,
        language_code: &str,
        start: Instant,
    ) -> Result<Translation, TranslateError> {
        if text.is_empty() {
            return Err(TranslateError::NoTranslation);
        }

        let key = derive_key(&self.key_prefix, text);

        if let Some(hit) = self.cache_get(&key).await {
            self.metrics.incr(metric_names::CACHE_HIT);
            debug!(chars = text.chars().count(), "cache hit");
            return Ok(Translation {
                text: hit,
                cached: true,
                elapsed_ms: elapsed_ms(start),
            });
        }
        self.metrics.incr(metric_names::CACHE_MISS);

        let target = TargetLanguage::parse(language_code).inspect_err(|e| {
            warn!(error = %e, "language code rejected");
        })?;

        let translated = match &self.inflight {
            Some(inflight) => {
                let call_key = format!("{target}|{key}");
                let (result, shared) = inflight
                    .run(&call_key, || self.fetch_and_store(text, &key, &target))
                    .await;
                if shared {
                    self.metrics.incr(metric_names::INFLIGHT_SHARED);
                    debug!(target_lang = %target, "joined in-flight translation");
                }
                result?
            }
            None => self.fetch_and_store(text, &key, &target).await?,
        };

        Ok(Translation {
            text: translated,
            cached: false,
            elapsed_ms: elapsed_ms(start),
        })
    }

    /// Provider call plus best-effort write of both directions.
    async fn fetch_and_store(
        &self,
        text: &str,
        key: &str,
        target: &TargetLanguage,
    ) -> Result<String, TranslateError> {
        self.metrics.incr(metric_names::PROVIDER_CALLS);
        let span = self.metrics.span(metric_names::PROVIDER_CALL);
        let result = self.provider.translate(text, target).await;
        let provider_us = span.finish();

        let translated = match result {
            Ok(t) if t.is_empty() => {
                info!(provider = self.provider.name(), target_lang = %target, "provider returned empty translation");
                return Err(TranslateError::NoTranslation);
            }
            Ok(t) => t,
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    target_lang = %target,
                    error = %e,
                    "provider call failed"
                );
                return Err(e);
            }
        };

        debug!(
            provider = self.provider.name(),
            target_lang = %target,
            provider_ms = provider_us / 1000.0,
            "provider translation received"
        );

        self.cache_set(key, &translated).await;
        let reverse_key = derive_key(&self.key_prefix, &translated);
        self.cache_set(&reverse_key, text).await;

        Ok(translated)
    }

    /// Errors and empty values read as a miss.
    async fn cache_get(&self, key: &str) -> Option<String> {
        let span = self.metrics.span(metric_names::CACHE_GET);
        let result = self.cache.get(key).await;
        span.finish();

        match result {
            Ok(Some(value)) if !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                self.metrics.incr(metric_names::CACHE_ERROR);
                warn!(cache = self.cache.name(), error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    async fn cache_set(&self, key: &str, value: &str) {
        let span = self.metrics.span(metric_names::CACHE_SET);
        let result = self.cache.set(key, value).await;
        span.finish();

        if let Err(e) = result {
            self.metrics.incr(metric_names::CACHE_ERROR);
            warn!(cache = self.cache.name(), error = %e, "cache write failed");
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fakes shared by unit tests across the crate.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::cache::{CacheError, MemoryStore};

    /// Provider answering from a fixed table; records every call.
    pub struct FakeProvider {
        table: Vec<(&'static str, &'static str)>,
        pub calls: Mutex<Vec<(String, String)>>,
        pub fail_with: Option<TranslateError>,
        pub delay: Duration,
    }

    impl FakeProvider {
        pub fn new(table: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                table,
                calls: Mutex::new(Vec::new()),
                fail_with: None,
                delay: Duration::ZERO,
            }
        }

        pub fn failing(err: TranslateError) -> Self {
            let mut p = Self::new(Vec::new());
            p.fail_with = Some(err);
            p
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl TranslationProvider for FakeProvider {
        async fn translate(
            &self,
            text: &str,
            target: &TargetLanguage,
        ) -> Result<String, TranslateError> {
            self.calls
                .lock()
                .push((text.to_string(), target.as_str().to_string()));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(ref e) = self.fail_with {
                return Err(e.clone());
            }
            Ok(self
                .table
                .iter()
                .find(|(src, _)| *src == text)
                .map(|(_, dst)| dst.to_string())
                .unwrap_or_default())
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    /// Memory store whose reads and writes can be switched off.
    #[derive(Default)]
    pub struct FlakyStore {
        pub inner: MemoryStore,
        pub fail_get: AtomicBool,
        pub fail_set: AtomicBool,
        pub sets: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("read refused".into()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            if self.fail_set.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("write refused".into()));
            }
            self.inner.set(key, value).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }
}
