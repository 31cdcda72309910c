use crate::engine::Context;

pub async fn optimize(ctx: &Context, resource_id: &str, save: bool) -> anyhow::Result<()> {
    let config = ctx.optimizer().optimize(resource_id).await?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    if save {
        ctx.store.put_configuration(&config)?;
        eprintln!("Saved configuration for {resource_id}");
    }
    Ok(())
}
