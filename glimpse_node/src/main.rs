use anyhow::Context;
use glimpse_core::GlimpseCore;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let core = GlimpseCore::start()
        .await
        .context("failed to start glimpse core")?;

    info!(
        data = %core.config.database_path().display(),
        "serving, press ctrl-c to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    info!("shutting down");
    core.shutdown().await.context("failed to shut down cleanly")?;
    Ok(())
}
