use std::sync::Arc;

use anyhow::Context;

use marketing_api::app::{self, services};
use marketing_infra::{EngineConfig, NotificationService, ReservationSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    marketing_observability::init();

    let config = EngineConfig::from_env().context("invalid engine configuration")?;

    let catalog = match &config.catalog_path {
        Some(path) => services::Catalog::load(path)?,
        None => {
            tracing::warn!("MARKETING_CATALOG_PATH not set; starting with an empty catalog");
            services::Catalog::default()
        }
    };

    // No notification backend is wired in; EMAIL/SMS degrade to logged no-ops.
    let services =
        Arc::new(services::build_services(&config, catalog, NotificationService::disabled()).await?);

    let sweeper = ReservationSweeper::new(services.engine().inventory().clone(), config.sweep_interval)
        .spawn();

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app::build_app(services))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    Ok(())
}
