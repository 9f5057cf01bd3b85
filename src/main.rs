use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use translate_proxy::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "translate-proxy", version, about = "HTTP translation proxy with a bidirectional cache")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "TRANSLATE_PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    translate_proxy::init_tracing(&config.logging);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "translate-proxy starting");

    let service = translate_proxy::build_service(&config)
        .await
        .context("building translation service")?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        translate_proxy::shutdown_signal().await;
        trigger.cancel();
    });

    let listener = tokio::net::TcpListener::bind(config.server.listen)
        .await
        .with_context(|| format!("binding {}", config.server.listen))?;

    translate_proxy::serve(listener, service, shutdown).await
}
