//! Domain types for predictive autoscaling.
//!
//! These types cover telemetry points, forecasts, recommendations, the
//! audit trail of scaling events, the scaling policy object, and the
//! derived analytics read models. All types are serializable to/from JSON
//! for storage in redb tables and for CLI output.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike};
use serde::{Deserialize, Serialize};

/// Unique identifier for a scalable resource.
pub type ResourceId = String;

/// Resource kind for virtual machine scale sets.
pub const KIND_VM_SCALE_SET: &str = "virtual-machine-scale-set";

/// Resource kind for platform hosting plans.
pub const KIND_HOSTING_PLAN: &str = "platform-hosting-plan";

/// Resource kind for managed container clusters.
pub const KIND_CONTAINER_CLUSTER: &str = "managed-container-cluster";

// ── Telemetry ─────────────────────────────────────────────────────

/// A single telemetry sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricDataPoint {
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    pub value: f64,
}

// ── Resources ─────────────────────────────────────────────────────

/// Resource directory record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceInfo {
    pub id: ResourceId,
    /// Resource kind, e.g. `virtual-machine-scale-set`.
    pub kind: String,
    pub name: String,
    /// Live instance/node count as last known to the directory.
    pub current_instances: u32,
}

// ── Forecasts ─────────────────────────────────────────────────────

/// One forecast step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictionPoint {
    pub timestamp: u64,
    pub value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Forecast for a single metric over the requested horizon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPrediction {
    pub metric_name: String,
    /// One point per horizon step, strictly increasing in timestamp.
    pub predictions: Vec<PredictionPoint>,
    pub mean_absolute_error: f64,
    pub root_mean_squared_error: f64,
}

// ── Recommendations ───────────────────────────────────────────────

/// The scaling action a recommendation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    None,
    ScaleUp,
    ScaleDown,
    EmergencyScale,
}

impl ScalingAction {
    /// True for actions that add capacity.
    pub fn is_upward(self) -> bool {
        matches!(self, Self::ScaleUp | Self::EmergencyScale)
    }
}

impl std::fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::ScaleUp => "scale_up",
            Self::ScaleDown => "scale_down",
            Self::EmergencyScale => "emergency_scale",
        };
        f.write_str(s)
    }
}

/// A scaling recommendation produced for one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRecommendation {
    pub id: String,
    pub resource_id: ResourceId,
    /// The time the prediction targets.
    pub prediction_time: u64,
    /// When the recommendation was generated.
    pub created_at: u64,
    pub current_instances: u32,
    pub recommended_instances: u32,
    pub action: ScalingAction,
    /// Average predicted primary load for the next interval.
    pub predicted_load: f64,
    /// Confidence in `[0, 1]`.
    pub confidence_score: f64,
    pub reasoning: String,
    pub metric_predictions: Vec<MetricPrediction>,
    /// Set by the executor on successful application.
    pub execution_time: Option<u64>,
}

// ── Audit trail ───────────────────────────────────────────────────

/// Audit record for one execution attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingEvent {
    pub resource_id: ResourceId,
    pub action: ScalingAction,
    pub from_instances: u32,
    pub to_instances: u32,
    /// What caused the attempt: "predictive", "schedule", "manual", ...
    pub trigger: String,
    pub success: bool,
    pub error_message: Option<String>,
    /// When the triggering recommendation was created.
    pub triggered_at: u64,
    /// When the attempt completed.
    pub timestamp: u64,
}

// ── Analytics read models ─────────────────────────────────────────

/// Aggregate scorecard over a time window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScalingPerformanceMetrics {
    pub resource_id: ResourceId,
    pub start: u64,
    pub end: u64,
    pub total_scaling_events: u32,
    pub successful_scaling_events: u32,
    /// Mean seconds from trigger to completed execution (successful events only).
    pub average_response_time_secs: f64,
    pub over_provisioning_percentage: f64,
    pub under_provisioning_percentage: f64,
    pub cost_savings_percentage: f64,
    /// metric name → accuracy in `[0, 1]`.
    pub prediction_accuracy: BTreeMap<String, f64>,
}

/// Weekend load relative to weekdays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeekendPattern {
    Low,
    #[default]
    Normal,
    High,
}

/// Derived characterization of a resource's historical load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UsagePatternAnalysis {
    pub has_seasonality: bool,
    pub seasonality_period_days: u32,
    /// UTC hours of day (0-23), ascending.
    pub peak_hours: Vec<u32>,
    pub low_usage_hours: Vec<u32>,
    pub weekend_pattern: WeekendPattern,
    /// Relative growth over the analysed window (0.1 = +10%).
    pub growth_trend: f64,
}

/// Cost figures from the cost-analysis collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct CostAnalysis {
    pub total_monthly_cost: f64,
    pub potential_monthly_savings: f64,
}

/// Provisioning report from the utilization collaborator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct UtilizationReport {
    pub over_provisioned_pct: f64,
    pub under_provisioned_pct: f64,
}

// ── Scaling configuration ─────────────────────────────────────────

/// Overall tuning goal of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingStrategy {
    #[default]
    Balanced,
    Aggressive,
    CostOptimized,
    PerformanceOptimized,
}

/// How raw samples are folded into an aggregation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Average,
    Maximum,
    Minimum,
    Total,
}

/// Forecasting model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PredictionModel {
    Smoothing,
    #[default]
    TrendExtrapolation,
    SeasonalDecomposition,
}

/// Which metrics drive and inform scaling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSelection {
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
    pub lookback_days: u32,
    pub horizon_hours: u32,
    pub aggregation_window_minutes: u32,
    pub aggregation: Aggregation,
}

impl MetricSelection {
    /// Primary then secondary metric names.
    pub fn all(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(self.secondary.iter())
            .cloned()
            .collect()
    }
}

/// Utilization thresholds (percent) and timing guards (minutes).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingThresholds {
    pub scale_up_threshold: f64,
    pub scale_down_threshold: f64,
    pub emergency_threshold: f64,
    pub cooldown_minutes: u32,
    pub stabilization_window_minutes: u32,
}

impl Default for ScalingThresholds {
    fn default() -> Self {
        Self {
            scale_up_threshold: 70.0,
            scale_down_threshold: 30.0,
            emergency_threshold: 85.0,
            cooldown_minutes: 10,
            stabilization_window_minutes: 5,
        }
    }
}

/// Day of week, Sunday-first to match cron numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Monday through Friday.
    pub const WORKDAYS: [Weekday; 5] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
    ];

    /// Cron day number (Sunday = 0).
    pub fn cron_number(self) -> u32 {
        self as u32
    }

    pub fn from_cron_number(n: u32) -> Option<Self> {
        Some(match n {
            0 | 7 => Self::Sunday,
            1 => Self::Monday,
            2 => Self::Tuesday,
            3 => Self::Wednesday,
            4 => Self::Thursday,
            5 => Self::Friday,
            6 => Self::Saturday,
            _ => return None,
        })
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Self::Saturday | Self::Sunday)
    }

    /// UTC day of week of a unix timestamp.
    pub fn of_timestamp(ts: u64) -> Self {
        let days = DateTime::from_timestamp(ts as i64, 0)
            .map(|dt| dt.weekday().num_days_from_sunday())
            .unwrap_or(4); // 1970-01-01 was a Thursday
        Self::from_cron_number(days).unwrap_or(Self::Thursday)
    }

    pub fn next(self) -> Self {
        Self::from_cron_number((self.cron_number() + 1) % 7).unwrap_or(Self::Sunday)
    }
}

/// UTC hour of day (0-23) of a unix timestamp.
pub fn hour_of_day(ts: u64) -> u32 {
    DateTime::from_timestamp(ts as i64, 0)
        .map(|dt| dt.hour())
        .unwrap_or(((ts / 3600) % 24) as u32)
}

/// A blocked maintenance window: `[start_hour, end_hour)` UTC on `day`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaintenanceWindow {
    pub day: Weekday,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl MaintenanceWindow {
    /// Whether `ts` falls inside the window. A window whose end is not after
    /// its start wraps past midnight into the next day.
    pub fn contains(&self, ts: u64) -> bool {
        let day = Weekday::of_timestamp(ts);
        let hour = hour_of_day(ts);
        if self.start_hour < self.end_hour {
            day == self.day && hour >= self.start_hour && hour < self.end_hour
        } else {
            (day == self.day && hour >= self.start_hour)
                || (day == self.day.next() && hour < self.end_hour)
        }
    }
}

/// Hard limits on how capacity may move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingConstraints {
    pub minimum_instances: u32,
    pub maximum_instances: u32,
    pub scale_up_step: u32,
    pub scale_down_step: u32,
    pub max_scale_up_per_hour: u32,
    pub max_scale_down_per_hour: u32,
    pub maintenance_windows: Vec<MaintenanceWindow>,
}

impl Default for ScalingConstraints {
    fn default() -> Self {
        Self {
            minimum_instances: 1,
            maximum_instances: 10,
            scale_up_step: 1,
            scale_down_step: 1,
            max_scale_up_per_hour: 5,
            max_scale_down_per_hour: 3,
            maintenance_windows: Vec::new(),
        }
    }
}

/// Forecaster parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionSettings {
    pub model: PredictionModel,
    /// Season length for seasonal decomposition, e.g. 168 for a weekly cycle.
    #[serde(default = "default_season_hours")]
    pub season_hours: u32,
    pub horizon_hours: u32,
    pub confidence_level: f64,
    pub anomaly_detection: bool,
}

/// Daily season.
pub const DEFAULT_SEASON_HOURS: u32 = 24;

fn default_season_hours() -> u32 {
    DEFAULT_SEASON_HOURS
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            model: PredictionModel::TrendExtrapolation,
            season_hours: DEFAULT_SEASON_HOURS,
            horizon_hours: 24,
            confidence_level: 0.95,
            anomaly_detection: true,
        }
    }
}

impl From<PredictionModel> for PredictionSettings {
    fn from(model: PredictionModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }
}

/// Calendar rule that pins capacity at a fixed time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingSchedule {
    pub name: String,
    /// Cron rendering of `days`/`hour`/`minute`, e.g. `0 9 * * 1-5`.
    pub cron: String,
    pub days: Vec<Weekday>,
    pub hour: u32,
    pub minute: u32,
    pub target_instances: u32,
}

impl ScalingSchedule {
    /// Build a schedule and render its cron expression.
    pub fn new(name: &str, days: Vec<Weekday>, hour: u32, minute: u32, target_instances: u32) -> Self {
        let cron = format!("{minute} {hour} * * {}", cron_days(&days));
        Self {
            name: name.to_string(),
            cron,
            days,
            hour,
            minute,
            target_instances,
        }
    }
}

/// Cron day-of-week field: `*`, a range like `1-5`, or a list like `0,6`.
fn cron_days(days: &[Weekday]) -> String {
    let mut numbers: Vec<u32> = days.iter().map(|d| d.cron_number()).collect();
    numbers.sort_unstable();
    numbers.dedup();
    match numbers.as_slice() {
        [] => "*".to_string(),
        [only] => only.to_string(),
        [first, .., last] if numbers.len() == 7 && *first == 0 && *last == 6 => "*".to_string(),
        [first, .., last] if (*last - *first) as usize + 1 == numbers.len() => format!("{first}-{last}"),
        _ => numbers
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// The scaling policy for one resource. Replaced as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingConfiguration {
    pub resource_id: ResourceId,
    pub resource_type: String,
    pub strategy: ScalingStrategy,
    pub metrics: MetricSelection,
    pub thresholds: ScalingThresholds,
    pub constraints: ScalingConstraints,
    pub prediction_settings: PredictionSettings,
    pub schedules: Vec<ScalingSchedule>,
    pub is_enabled: bool,
}

impl ScalingConfiguration {
    /// Baseline policy used until an optimized one has been stored.
    pub fn baseline(resource: &ResourceInfo) -> Self {
        let (primary, secondary) = default_metrics_for_kind(&resource.kind);
        Self {
            resource_id: resource.id.clone(),
            resource_type: resource.kind.clone(),
            strategy: ScalingStrategy::Balanced,
            metrics: MetricSelection {
                primary,
                secondary,
                lookback_days: 30,
                horizon_hours: 24,
                aggregation_window_minutes: 5,
                aggregation: Aggregation::Average,
            },
            thresholds: ScalingThresholds::default(),
            constraints: ScalingConstraints::default(),
            prediction_settings: PredictionSettings::default(),
            schedules: Vec::new(),
            is_enabled: true,
        }
    }
}

/// Primary and secondary metric names for a resource kind.
pub fn default_metrics_for_kind(kind: &str) -> (Vec<String>, Vec<String>) {
    let (primary, secondary): (&[&str], &[&str]) = match kind {
        KIND_VM_SCALE_SET => (
            &["cpu_percent", "memory_percent"],
            &["network_in_bytes", "network_out_bytes"],
        ),
        KIND_HOSTING_PLAN => (
            &["cpu_percent", "memory_percent"],
            &["http_queue_length", "requests"],
        ),
        KIND_CONTAINER_CLUSTER => (
            &["node_cpu_percent", "node_memory_percent"],
            &["pod_count", "pending_pods"],
        ),
        _ => (&["cpu_percent", "memory_percent"], &[]),
    };
    (
        primary.iter().map(|s| s.to_string()).collect(),
        secondary.iter().map(|s| s.to_string()).collect(),
    )
}

/// True if a metric name identifies a CPU-like signal.
pub fn is_cpu_metric(name: &str) -> bool {
    name.to_ascii_lowercase().contains("cpu")
}

impl ResourceInfo {
    /// Build the key for the resources table.
    pub fn table_key(&self) -> String {
        self.id.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_metric_matching_is_case_insensitive() {
        assert!(is_cpu_metric("cpu_percent"));
        assert!(is_cpu_metric("Node_CPU_Percent"));
        assert!(!is_cpu_metric("memory_percent"));
    }

    #[test]
    fn baseline_uses_kind_metrics() {
        let resource = ResourceInfo {
            id: "aks-1".to_string(),
            kind: KIND_CONTAINER_CLUSTER.to_string(),
            name: "aks".to_string(),
            current_instances: 3,
        };
        let cfg = ScalingConfiguration::baseline(&resource);
        assert_eq!(cfg.metrics.primary[0], "node_cpu_percent");
        assert_eq!(cfg.metrics.all().len(), 4);
        assert!(cfg.is_enabled);
        assert_eq!(cfg.constraints.maximum_instances, 10);
    }

    #[test]
    fn weekday_cron_numbers() {
        assert_eq!(Weekday::Sunday.cron_number(), 0);
        assert_eq!(Weekday::Saturday.cron_number(), 6);
        assert_eq!(Weekday::from_cron_number(7), Some(Weekday::Sunday));
        assert_eq!(Weekday::from_cron_number(8), None);
        assert!(Weekday::Saturday.is_weekend());
        assert!(!Weekday::Friday.is_weekend());
    }

    #[test]
    fn timestamp_calendar_helpers() {
        // 1970-01-01 00:00 UTC was a Thursday.
        assert_eq!(Weekday::of_timestamp(0), Weekday::Thursday);
        // 1970-01-03 13:30 UTC was a Saturday.
        let sat = 2 * 86_400 + 13 * 3600 + 1800;
        assert_eq!(Weekday::of_timestamp(sat), Weekday::Saturday);
        assert_eq!(hour_of_day(sat), 13);
        assert_eq!(Weekday::Saturday.next(), Weekday::Sunday);
    }

    #[test]
    fn maintenance_window_contains() {
        // Sunday 1970-01-04.
        let sunday = 3 * 86_400;
        let window = MaintenanceWindow {
            day: Weekday::Sunday,
            start_hour: 2,
            end_hour: 4,
        };
        assert!(window.contains(sunday + 2 * 3600));
        assert!(window.contains(sunday + 3 * 3600 + 3599));
        assert!(!window.contains(sunday + 4 * 3600));
        assert!(!window.contains(sunday + 2 * 3600 + 86_400));

        let overnight = MaintenanceWindow {
            day: Weekday::Sunday,
            start_hour: 22,
            end_hour: 2,
        };
        assert!(overnight.contains(sunday + 23 * 3600));
        assert!(overnight.contains(sunday + 86_400 + 3600));
        assert!(!overnight.contains(sunday + 86_400 + 3 * 3600));
    }

    #[test]
    fn schedule_renders_cron() {
        let weekdays = ScalingSchedule::new("ramp", Weekday::WORKDAYS.to_vec(), 9, 0, 6);
        assert_eq!(weekdays.cron, "0 9 * * 1-5");
        let saturday = ScalingSchedule::new("weekend", vec![Weekday::Saturday], 0, 0, 1);
        assert_eq!(saturday.cron, "0 0 * * 6");
        let split = ScalingSchedule::new("split", vec![Weekday::Saturday, Weekday::Sunday], 8, 30, 2);
        assert_eq!(split.cron, "30 8 * * 0,6");
    }

    #[test]
    fn settings_without_season_default_to_daily() {
        let json = r#"{"model":"seasonal_decomposition","horizon_hours":24,"confidence_level":0.95,"anomaly_detection":true}"#;
        let settings: PredictionSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.season_hours, DEFAULT_SEASON_HOURS);
        assert_eq!(settings.model, PredictionModel::SeasonalDecomposition);
    }

    #[test]
    fn action_serializes_snake_case() {
        let json = serde_json::to_string(&ScalingAction::EmergencyScale).unwrap();
        assert_eq!(json, "\"emergency_scale\"");
        assert!(ScalingAction::EmergencyScale.is_upward());
        assert!(!ScalingAction::ScaleDown.is_upward());
    }
}
