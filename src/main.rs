/// DID Registry daemon
///
/// Opens the document store, starts background jobs and runs until
/// interrupted.
use anyhow::Context as _;
use did_registry::{
    config::{LogFormat, RegistryConfig},
    context::AppContext,
    jobs::JobScheduler,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RegistryConfig::from_env().context("failed to load configuration")?;

    // Initialize logging
    init_tracing(&config);

    tracing::info!(
        "{} v{} starting ({:?})",
        config.service.name,
        config.service.version,
        config.service.environment
    );

    // Create application context
    let ctx = AppContext::new(config)
        .await
        .context("failed to initialize registry")?;
    let ctx = Arc::new(ctx);

    // Start background jobs
    let scheduler = Arc::new(JobScheduler::new(Arc::clone(&ctx)));
    let jobs = scheduler.start();

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, stopping");

    for job in jobs {
        job.abort();
    }
    ctx.shutdown().await;

    tracing::info!("Registry stopped");
    Ok(())
}

fn init_tracing(config: &RegistryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
