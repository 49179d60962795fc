use anyhow::{anyhow, Result};
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use tracing::info;

/// Serve the metrics route; returns immediately when nothing is routed.
pub async fn start(settings_config: &SettingsConfig) -> Result<()> {
    let metrics = get_metrics();
    let state = MetricsState::new(metrics.registry.clone());
    let app = state.router(&settings_config.metrics);

    let Some(server) = settings_config.server.as_ref().filter(|_| app.has_routes()) else {
        return Ok(());
    };

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow!("cannot bind '{}': {}", addr, e))?;
    info!(%addr, "metrics server listening");
    metrics.up.set(1);
    axum::serve(listener, app).await?;

    Ok(())
}
