use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;

use warpgrid_state::MetricDataPoint;
use warpgrid_state::store::group_by_metric;

use crate::engine::Context;

#[derive(Deserialize)]
struct Row {
    metric: String,
    timestamp: u64,
    value: f64,
}

/// Load points from `file` into the store for `resource_id`.
pub fn ingest(ctx: &Context, resource_id: &str, metric: Option<&str>, file: &Path) -> anyhow::Result<()> {
    if ctx.store.get_resource(resource_id)?.is_none() {
        anyhow::bail!("resource not found: {resource_id}");
    }
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let grouped: BTreeMap<String, Vec<MetricDataPoint>> = match metric {
        Some(metric) => {
            let points: Vec<MetricDataPoint> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse points in {}", file.display()))?;
            [(metric.to_string(), points)].into_iter().collect()
        }
        None => {
            let rows: Vec<Row> = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse rows in {}", file.display()))?;
            group_by_metric(rows.into_iter().map(|r| {
                (
                    r.metric,
                    MetricDataPoint {
                        timestamp: r.timestamp,
                        value: r.value,
                    },
                )
            }))
        }
    };

    for (metric, points) in &grouped {
        ctx.store.put_metric_points(resource_id, metric, points)?;
        println!("Ingested {} point(s) for {resource_id}/{metric}", points.len());
    }
    Ok(())
}
