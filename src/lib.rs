//! translate-proxy: HTTP translation proxy with a bidirectional key-value cache.
//! Library root: tracing setup, service wiring, server lifecycle.

pub mod cache;
pub mod config;
pub mod metrics;
pub mod server;
pub mod translate;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use config::{AppConfig, LoggingConfig};
use metrics::MetricsRegistry;
use server::AppState;
use translate::TranslationService;

/// Install the global tracing subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    // A second call (tests, embedding) keeps the first subscriber.
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Build the lookup service from configuration: cache backend, provider, options.
pub async fn build_service(config: &AppConfig) -> anyhow::Result<TranslationService> {
    let cache = cache::open_store(&config.cache).await?;
    let provider = translate::open_provider(&config.provider)?;

    info!(
        cache = cache.name(),
        provider = provider.name(),
        dedupe = config.translate.dedupe_in_flight,
        "translation service ready"
    );

    Ok(
        TranslationService::new(provider, cache, Arc::new(MetricsRegistry::new()))
            .with_key_prefix(config.cache.key_prefix.clone())
            .with_dedupe(config.translate.dedupe_in_flight),
    )
}

/// Serve on `listener` until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(
    listener: TcpListener,
    service: TranslationService,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = server::router(AppState {
        service: Arc::new(service),
    });

    info!(addr = %listener.local_addr()?, "translate-proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("translate-proxy stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
