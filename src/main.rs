//! Process entry point: load configuration, build the store registry,
//! serve HTTP until interrupted, then shut everything down in order.

use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use propstore_server::{router, AppConfig, AppContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let ctx = Arc::new(AppContext::from_config(&config).context("initializing stores")?);
    for name in ctx.store_names() {
        info!(store = name, "store ready");
    }

    let app = router(Arc::clone(&ctx));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    info!(port = config.port, "propstore listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("interrupt received; shutting down");
        })
        .await
        .context("serving HTTP")?;

    ctx.shutdown().await;
    Ok(())
}
