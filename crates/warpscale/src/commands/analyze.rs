use crate::engine::{Context, epoch_secs};

pub async fn analyze(ctx: &Context, resource_id: &str, days: u32) -> anyhow::Result<()> {
    if ctx.store.get_resource(resource_id)?.is_none() {
        anyhow::bail!("resource not found: {resource_id}");
    }
    let end = epoch_secs();
    let start = end.saturating_sub(days as u64 * 86_400);
    let metrics = ctx.performance().analyze(resource_id, start, end).await;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
