//! Collaborator traits consumed by the autoscaling core.
//!
//! Every trait is dyn-compatible and returns a boxed `Send` future so that
//! implementations can be swapped at runtime (the `StateStore` implements
//! the storage-backed ones; tests inject doubles). Errors cross these
//! boundaries as `anyhow::Error`.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::types::*;

/// Boxed future alias used by all collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Raw historical telemetry.
pub trait TelemetrySource: Send + Sync {
    /// Points for one metric in `[start, end]` (epoch seconds, inclusive).
    fn get_metrics<'a>(
        &'a self,
        resource_id: &'a str,
        metric: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<Vec<MetricDataPoint>>>;
}

/// Resource lookup.
pub trait ResourceDirectory: Send + Sync {
    fn get_resource<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<ResourceInfo>>>;

    /// Every resource the directory knows about.
    fn list_resources(&self) -> BoxFuture<'_, anyhow::Result<Vec<ResourceInfo>>>;
}

/// Append-only audit trail of scaling attempts.
pub trait EventStore: Send + Sync {
    fn append<'a>(&'a self, event: &'a ScalingEvent) -> BoxFuture<'a, anyhow::Result<()>>;

    /// Events for a resource with `start <= timestamp <= end`, in completion order.
    fn query<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<Vec<ScalingEvent>>>;
}

/// Active scaling policy lookup.
pub trait ConfigurationSource: Send + Sync {
    fn get_configuration<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<ScalingConfiguration>>>;
}

/// Cost figures for a scope (resource id or group).
pub trait CostSignal: Send + Sync {
    fn analyze_cost<'a>(&'a self, scope_id: &'a str) -> BoxFuture<'a, anyhow::Result<CostAnalysis>>;
}

/// Over/under-provisioning analysis.
pub trait UtilizationAnalyzer: Send + Sync {
    fn analyze<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<UtilizationReport>>;
}

/// Per-metric forecast accuracy over a window.
pub trait ForecastAccuracy: Send + Sync {
    fn accuracy<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<BTreeMap<String, f64>>>;
}

/// Long-range usage pattern characterization.
pub trait UsagePatternSource: Send + Sync {
    fn analyze_patterns<'a>(
        &'a self,
        resource: &'a ResourceInfo,
    ) -> BoxFuture<'a, anyhow::Result<UsagePatternAnalysis>>;
}
