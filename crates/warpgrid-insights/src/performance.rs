//! Scaling performance scorecard.
//!
//! A reporting surface: every sub-query that fails is logged and replaced
//! by zero/empty, so `analyze` always returns a scorecard.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use warpgrid_state::{
    CostAnalysis, CostSignal, EventStore, ForecastAccuracy, ScalingEvent, ScalingPerformanceMetrics,
    UtilizationAnalyzer, UtilizationReport,
};

/// Builds [`ScalingPerformanceMetrics`] from the event store and optional
/// utilization, cost, and accuracy collaborators.
pub struct PerformanceAnalyzer {
    events: Arc<dyn EventStore>,
    utilization: Option<Arc<dyn UtilizationAnalyzer>>,
    cost: Option<Arc<dyn CostSignal>>,
    accuracy: Option<Arc<dyn ForecastAccuracy>>,
}

impl PerformanceAnalyzer {
    pub fn new(events: Arc<dyn EventStore>) -> Self {
        Self {
            events,
            utilization: None,
            cost: None,
            accuracy: None,
        }
    }

    pub fn with_utilization(mut self, utilization: Arc<dyn UtilizationAnalyzer>) -> Self {
        self.utilization = Some(utilization);
        self
    }

    pub fn with_cost(mut self, cost: Arc<dyn CostSignal>) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_accuracy(mut self, accuracy: Arc<dyn ForecastAccuracy>) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Scorecard for `resource_id` over `[start, end]`.
    pub async fn analyze(&self, resource_id: &str, start: u64, end: u64) -> ScalingPerformanceMetrics {
        let (events, utilization, cost, accuracy) = tokio::join!(
            self.events(resource_id, start, end),
            self.utilization(resource_id, start, end),
            self.cost(resource_id),
            self.accuracy(resource_id, start, end),
        );

        let successful: Vec<&ScalingEvent> = events.iter().filter(|e| e.success).collect();
        let average_response_time_secs = if successful.is_empty() {
            0.0
        } else {
            successful
                .iter()
                .map(|e| e.timestamp.saturating_sub(e.triggered_at) as f64)
                .sum::<f64>()
                / successful.len() as f64
        };
        let cost_savings_percentage = if cost.total_monthly_cost > 0.0 {
            cost.potential_monthly_savings / cost.total_monthly_cost * 100.0
        } else {
            0.0
        };

        let metrics = ScalingPerformanceMetrics {
            resource_id: resource_id.to_string(),
            start,
            end,
            total_scaling_events: events.len() as u32,
            successful_scaling_events: successful.len() as u32,
            average_response_time_secs,
            over_provisioning_percentage: utilization.over_provisioned_pct,
            under_provisioning_percentage: utilization.under_provisioned_pct,
            cost_savings_percentage,
            prediction_accuracy: accuracy,
        };
        info!(
            resource = %resource_id,
            events = metrics.total_scaling_events,
            successful = metrics.successful_scaling_events,
            response_secs = metrics.average_response_time_secs,
            "scaling performance analyzed"
        );
        metrics
    }

    async fn events(&self, resource_id: &str, start: u64, end: u64) -> Vec<ScalingEvent> {
        self.events
            .query(resource_id, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!(resource = %resource_id, error = %e, "event query failed, reporting no events");
                Vec::new()
            })
    }

    async fn utilization(&self, resource_id: &str, start: u64, end: u64) -> UtilizationReport {
        let Some(utilization) = &self.utilization else {
            return UtilizationReport::default();
        };
        utilization
            .analyze(resource_id, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!(resource = %resource_id, error = %e, "utilization analysis failed");
                UtilizationReport::default()
            })
    }

    async fn cost(&self, resource_id: &str) -> CostAnalysis {
        let Some(cost) = &self.cost else {
            return CostAnalysis::default();
        };
        cost.analyze_cost(resource_id).await.unwrap_or_else(|e| {
            warn!(resource = %resource_id, error = %e, "cost analysis failed");
            CostAnalysis::default()
        })
    }

    async fn accuracy(&self, resource_id: &str, start: u64, end: u64) -> BTreeMap<String, f64> {
        let Some(accuracy) = &self.accuracy else {
            return BTreeMap::new();
        };
        accuracy
            .accuracy(resource_id, start, end)
            .await
            .unwrap_or_else(|e| {
                warn!(resource = %resource_id, error = %e, "accuracy analysis failed");
                BTreeMap::new()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_state::{BoxFuture, ScalingAction, StateStore};

    use crate::cost::StaticCost;

    struct Broken;

    impl EventStore for Broken {
        fn append<'a>(&'a self, _event: &'a ScalingEvent) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async { Err(anyhow::anyhow!("event store offline")) })
        }

        fn query<'a>(&'a self, _r: &'a str, _s: u64, _e: u64) -> BoxFuture<'a, anyhow::Result<Vec<ScalingEvent>>> {
            Box::pin(async { Err(anyhow::anyhow!("event store offline")) })
        }
    }

    impl UtilizationAnalyzer for Broken {
        fn analyze<'a>(&'a self, _r: &'a str, _s: u64, _e: u64) -> BoxFuture<'a, anyhow::Result<UtilizationReport>> {
            Box::pin(async { Err(anyhow::anyhow!("no utilization")) })
        }
    }

    impl CostSignal for Broken {
        fn analyze_cost<'a>(&'a self, _scope: &'a str) -> BoxFuture<'a, anyhow::Result<CostAnalysis>> {
            Box::pin(async { Err(anyhow::anyhow!("no billing")) })
        }
    }

    impl ForecastAccuracy for Broken {
        fn accuracy<'a>(&'a self, _r: &'a str, _s: u64, _e: u64) -> BoxFuture<'a, anyhow::Result<BTreeMap<String, f64>>> {
            Box::pin(async { Err(anyhow::anyhow!("no accuracy")) })
        }
    }

    struct FixedUtilization(UtilizationReport);

    impl UtilizationAnalyzer for FixedUtilization {
        fn analyze<'a>(&'a self, _r: &'a str, _s: u64, _e: u64) -> BoxFuture<'a, anyhow::Result<UtilizationReport>> {
            Box::pin(async move { Ok(self.0) })
        }
    }

    fn event(timestamp: u64, triggered_at: u64, success: bool) -> ScalingEvent {
        ScalingEvent {
            resource_id: "vmss-1".to_string(),
            action: ScalingAction::ScaleUp,
            from_instances: 2,
            to_instances: 3,
            trigger: "predictive".to_string(),
            success,
            error_message: (!success).then(|| "failed".to_string()),
            triggered_at,
            timestamp,
        }
    }

    #[tokio::test]
    async fn summarizes_events_and_collaborators() {
        let store = StateStore::open_in_memory().unwrap();
        store.append_event(&event(1_000, 990, true)).unwrap();
        store.append_event(&event(2_000, 1_970, true)).unwrap();
        store.append_event(&event(3_000, 2_900, false)).unwrap();
        store.append_event(&event(9_000, 8_000, true)).unwrap();

        let analyzer = PerformanceAnalyzer::new(Arc::new(store))
            .with_utilization(Arc::new(FixedUtilization(UtilizationReport {
                over_provisioned_pct: 12.5,
                under_provisioned_pct: 3.0,
            })))
            .with_cost(Arc::new(StaticCost::new(CostAnalysis {
                total_monthly_cost: 1000.0,
                potential_monthly_savings: 150.0,
            })));

        let m = analyzer.analyze("vmss-1", 0, 5_000).await;
        assert_eq!(m.total_scaling_events, 3);
        assert_eq!(m.successful_scaling_events, 2);
        // (10 + 30) / 2; the failed event is excluded.
        assert!((m.average_response_time_secs - 20.0).abs() < 1e-9);
        assert_eq!(m.over_provisioning_percentage, 12.5);
        assert_eq!(m.under_provisioning_percentage, 3.0);
        assert!((m.cost_savings_percentage - 15.0).abs() < 1e-9);
        assert!(m.prediction_accuracy.is_empty());
    }

    #[tokio::test]
    async fn failing_collaborators_default_to_zero() {
        let broken = Arc::new(Broken);
        let analyzer = PerformanceAnalyzer::new(broken.clone())
            .with_utilization(broken.clone())
            .with_cost(broken.clone())
            .with_accuracy(broken);

        let m = analyzer.analyze("vmss-1", 0, 5_000).await;
        assert_eq!(m.total_scaling_events, 0);
        assert_eq!(m.average_response_time_secs, 0.0);
        assert_eq!(m.over_provisioning_percentage, 0.0);
        assert_eq!(m.cost_savings_percentage, 0.0);
        assert!(m.prediction_accuracy.is_empty());
        assert_eq!(m.resource_id, "vmss-1");
    }

    #[tokio::test]
    async fn zero_total_cost_means_no_savings() {
        let store = StateStore::open_in_memory().unwrap();
        let analyzer = PerformanceAnalyzer::new(Arc::new(store)).with_cost(Arc::new(StaticCost::new(CostAnalysis {
            total_monthly_cost: 0.0,
            potential_monthly_savings: 50.0,
        })));
        assert_eq!(analyzer.analyze("vmss-1", 0, 10).await.cost_savings_percentage, 0.0);
    }
}
