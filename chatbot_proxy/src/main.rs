use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatbot_proxy::{app, client::HfClient, config::ProxyConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatbot_proxy=info,tower_http=info".into()),
        )
        .init();

    let cfg = ProxyConfig::from_env()?;
    let addr = cfg.addr()?;
    tracing::info!(upstream = ?cfg.upstream, "upstream config");

    let client = HfClient::new(&cfg.upstream).context("failed to build HTTP client")?;
    let router = app(AppState::new(client));

    tracing::info!("chatbot_proxy v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
