use std::sync::Arc;

use anyhow::Context;

use repair_dispatch::config::AppConfig;
use repair_dispatch::pipeline::RepairPipeline;
use repair_dispatch::routes::app_routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    eprintln!("🔧 Repair Dispatch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listen: http://{}", config.bind_addr);
    eprintln!("   Submit: POST http://{}/submit_repair", config.bind_addr);
    eprintln!("   Ledger: {}", config.ledger_path.display());
    eprintln!(
        "   Verification: {}",
        if config.verify.secret.is_some() {
            "enabled"
        } else {
            "NOT CONFIGURED (all submissions refused)"
        }
    );
    let sinks = config.enabled_sinks();
    eprintln!(
        "   Relays: {}\n",
        if sinks.is_empty() {
            "none".to_string()
        } else {
            sinks.join(", ")
        }
    );

    let pipeline = Arc::new(RepairPipeline::from_config(&config));
    let app = app_routes(pipeline, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Repair dispatch server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
