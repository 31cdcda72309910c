use warpgrid_state::ResourceInfo;

use crate::engine::Context;

pub fn add(ctx: &Context, id: &str, kind: &str, name: Option<&str>, instances: u32) -> anyhow::Result<()> {
    if id.is_empty() {
        anyhow::bail!("resource id must not be empty");
    }
    let resource = ResourceInfo {
        id: id.to_string(),
        kind: kind.to_string(),
        name: name.unwrap_or(id).to_string(),
        current_instances: instances,
    };
    ctx.store.put_resource(&resource)?;
    println!("Registered {} ({}) with {} instance(s)", resource.id, resource.kind, instances);
    Ok(())
}

pub fn list(ctx: &Context) -> anyhow::Result<()> {
    let resources = ctx.store.list_resources()?;
    println!("{}", serde_json::to_string_pretty(&resources)?);
    Ok(())
}
