use tokio::sync::watch;
use tracing::info;

use warpgrid_autoscale::config::parse_duration;

use crate::engine::Context;

/// Evaluate all resources every `interval` until Ctrl-C.
pub async fn run(ctx: &Context, interval: &str) -> anyhow::Result<()> {
    let interval = parse_duration(interval)
        .ok_or_else(|| anyhow::anyhow!("invalid interval {interval:?}, expected e.g. \"30s\" or \"5m\""))?;
    if interval.is_zero() {
        anyhow::bail!("interval must be greater than zero");
    }
    let autoscaler = ctx.autoscaler();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(interval_secs = interval.as_secs(), "autoscaler loop starting");
    autoscaler.run(interval, shutdown_rx).await;
    info!("autoscaler loop stopped");
    Ok(())
}
