use sentinel::{Config, ContentMonitor, ModerationContext};

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");
    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sentinel=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        "Starting content monitor (delay {:?}, thresholds {}/{})",
        config.processing_delay,
        config.drawer_instruction_threshold,
        config.pixmap_block_threshold
    );

    // Without an engine adapter attached, run in moderation-disabled mode:
    // the classifier rates everything safe and every side effect is a no-op.
    let monitor = ContentMonitor::new(config, ModerationContext::disabled("sentinel"));
    monitor.start();

    shutdown_signal().await;
    monitor.shutdown().await;

    tracing::info!("Content monitor stopped.");
    Ok(())
}
