//! Threshold-based provisioning report.
//!
//! Samples of the primary CPU metric below the scale-down threshold count
//! as over-provisioned time; samples above the scale-up threshold count as
//! under-provisioned time.

use std::sync::Arc;

use tracing::debug;

use warpgrid_state::{
    BoxFuture, ConfigurationSource, ResourceDirectory, ScalingConfiguration, ScalingThresholds,
    TelemetrySource, UtilizationAnalyzer, UtilizationReport, is_cpu_metric,
};

use crate::patterns::primary_metric;

pub struct ThresholdUtilization {
    telemetry: Arc<dyn TelemetrySource>,
    directory: Arc<dyn ResourceDirectory>,
    configs: Arc<dyn ConfigurationSource>,
}

impl ThresholdUtilization {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        directory: Arc<dyn ResourceDirectory>,
        configs: Arc<dyn ConfigurationSource>,
    ) -> Self {
        Self {
            telemetry,
            directory,
            configs,
        }
    }

    /// Metric and thresholds in force for a resource.
    async fn policy(&self, resource_id: &str) -> anyhow::Result<(String, ScalingThresholds)> {
        if let Some(config) = self.configs.get_configuration(resource_id).await? {
            return Ok((metric_of(&config), config.thresholds));
        }
        let metric = match self.directory.get_resource(resource_id).await? {
            Some(resource) => primary_metric(&resource.kind),
            None => "cpu_percent".to_string(),
        };
        Ok((metric, ScalingThresholds::default()))
    }

    pub async fn report(&self, resource_id: &str, start: u64, end: u64) -> anyhow::Result<UtilizationReport> {
        let (metric, thresholds) = self.policy(resource_id).await?;
        let points = self.telemetry.get_metrics(resource_id, &metric, start, end).await?;
        let values: Vec<f64> = points.iter().map(|p| p.value).filter(|v| v.is_finite()).collect();
        if values.is_empty() {
            debug!(resource = %resource_id, %metric, "no samples for utilization report");
            return Ok(UtilizationReport::default());
        }
        let total = values.len() as f64;
        let over = values.iter().filter(|v| **v < thresholds.scale_down_threshold).count() as f64;
        let under = values.iter().filter(|v| **v > thresholds.scale_up_threshold).count() as f64;
        Ok(UtilizationReport {
            over_provisioned_pct: over / total * 100.0,
            under_provisioned_pct: under / total * 100.0,
        })
    }
}

fn metric_of(config: &ScalingConfiguration) -> String {
    config
        .metrics
        .primary
        .iter()
        .find(|m| is_cpu_metric(m))
        .cloned()
        .unwrap_or_else(|| primary_metric(&config.resource_type))
}

impl UtilizationAnalyzer for ThresholdUtilization {
    fn analyze<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<UtilizationReport>> {
        Box::pin(self.report(resource_id, start, end))
    }
}
