use warpgrid_state::CancelSignal;

use crate::engine::{Context, epoch_secs};

pub async fn predict(ctx: &Context, resource_id: &str, hours: u32) -> anyhow::Result<()> {
    let autoscaler = ctx.autoscaler();
    let target = epoch_secs() + hours.max(1) as u64 * 3600;
    let recommendation = autoscaler
        .generate_prediction(resource_id, target, &CancelSignal::never())
        .await?;
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    Ok(())
}

pub async fn apply(ctx: &Context, resource_id: &str, hours: u32) -> anyhow::Result<()> {
    let autoscaler = ctx.autoscaler();
    let cancel = CancelSignal::never();
    let target = epoch_secs() + hours.max(1) as u64 * 3600;
    let mut recommendation = autoscaler
        .generate_prediction(resource_id, target, &cancel)
        .await?;
    let applied = autoscaler
        .apply_recommendation(&mut recommendation, &cancel)
        .await?;
    println!("{}", serde_json::to_string_pretty(&recommendation)?);
    if !applied {
        anyhow::bail!("scaling {resource_id} failed; see `warpscale analyze` for the recorded event");
    }
    Ok(())
}
