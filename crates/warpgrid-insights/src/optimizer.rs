//! Configuration optimizer.
//!
//! Derives a complete [`ScalingConfiguration`] for a resource from its
//! usage pattern. The output replaces any previous configuration as a
//! whole; storing it is up to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use warpgrid_state::{
    Aggregation, DEFAULT_SEASON_HOURS, MaintenanceWindow, MetricSelection, PredictionModel,
    PredictionSettings,
    ResourceDirectory, ResourceInfo, ScalingConfiguration, ScalingConstraints, ScalingSchedule,
    ScalingStrategy, ScalingThresholds, UsagePatternAnalysis, UsagePatternSource, WeekendPattern,
    Weekday, default_metrics_for_kind,
};

use crate::error::{InsightsError, InsightsResult};

/// Ceiling used when no per-kind limit is configured.
pub const DEFAULT_MAX_INSTANCES: u32 = 10;

pub struct ConfigurationOptimizer {
    directory: Arc<dyn ResourceDirectory>,
    patterns: Arc<dyn UsagePatternSource>,
    /// resource kind → maximum instances.
    max_instances: HashMap<String, u32>,
}

impl ConfigurationOptimizer {
    pub fn new(directory: Arc<dyn ResourceDirectory>, patterns: Arc<dyn UsagePatternSource>) -> Self {
        Self {
            directory,
            patterns,
            max_instances: HashMap::new(),
        }
    }

    pub fn with_max_instances(mut self, max_instances: HashMap<String, u32>) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub async fn optimize(&self, resource_id: &str) -> InsightsResult<ScalingConfiguration> {
        let resource = self
            .directory
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| InsightsError::ResourceNotFound(resource_id.to_string()))?;

        let pattern = match self.patterns.analyze_patterns(&resource).await {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!(resource = %resource_id, error = %e, "usage pattern analysis failed, assuming no pattern");
                UsagePatternAnalysis::default()
            }
        };

        let ceiling = self.max_instances.get(&resource.kind).copied();
        let config = derive_configuration(&resource, &pattern, ceiling);
        info!(
            resource = %resource_id,
            strategy = ?config.strategy,
            model = ?config.prediction_settings.model,
            max = config.constraints.maximum_instances,
            schedules = config.schedules.len(),
            "scaling configuration optimized"
        );
        Ok(config)
    }
}

/// Build the configuration for `resource` from its usage pattern.
pub fn derive_configuration(
    resource: &ResourceInfo,
    pattern: &UsagePatternAnalysis,
    max_instances: Option<u32>,
) -> ScalingConfiguration {
    let constraints = constraints(pattern, max_instances);
    let schedules = schedules(pattern, &constraints);
    let (primary, secondary) = default_metrics_for_kind(&resource.kind);

    ScalingConfiguration {
        resource_id: resource.id.clone(),
        resource_type: resource.kind.clone(),
        strategy: strategy(pattern),
        metrics: MetricSelection {
            primary,
            secondary,
            lookback_days: 30,
            horizon_hours: 24,
            aggregation_window_minutes: 5,
            aggregation: Aggregation::Average,
        },
        thresholds: thresholds(pattern),
        constraints,
        prediction_settings: PredictionSettings {
            model: model(pattern),
            season_hours: season_hours(pattern),
            horizon_hours: 24,
            confidence_level: 0.95,
            anomaly_detection: true,
        },
        schedules,
        is_enabled: true,
    }
}

pub fn strategy(pattern: &UsagePatternAnalysis) -> ScalingStrategy {
    if pattern.growth_trend > 0.1 {
        ScalingStrategy::Aggressive
    } else if pattern.has_seasonality && pattern.peak_hours.len() > 6 {
        ScalingStrategy::PerformanceOptimized
    } else if pattern.weekend_pattern == WeekendPattern::Low {
        ScalingStrategy::CostOptimized
    } else {
        ScalingStrategy::Balanced
    }
}

fn thresholds(pattern: &UsagePatternAnalysis) -> ScalingThresholds {
    ScalingThresholds {
        scale_up_threshold: if pattern.has_seasonality { 65.0 } else { 70.0 },
        scale_down_threshold: 30.0,
        emergency_threshold: 85.0,
        cooldown_minutes: if pattern.growth_trend > 0.05 { 5 } else { 10 },
        stabilization_window_minutes: 5,
    }
}

fn constraints(pattern: &UsagePatternAnalysis, max_instances: Option<u32>) -> ScalingConstraints {
    let minimum_instances = 1;
    ScalingConstraints {
        minimum_instances,
        maximum_instances: max_instances
            .unwrap_or(DEFAULT_MAX_INSTANCES)
            .max(minimum_instances),
        scale_up_step: if pattern.growth_trend > 0.1 { 2 } else { 1 },
        scale_down_step: 1,
        max_scale_up_per_hour: 5,
        max_scale_down_per_hour: 3,
        maintenance_windows: vec![MaintenanceWindow {
            day: Weekday::Sunday,
            start_hour: 2,
            end_hour: 4,
        }],
    }
}

pub fn model(pattern: &UsagePatternAnalysis) -> PredictionModel {
    if pattern.has_seasonality && pattern.seasonality_period_days > 1 {
        PredictionModel::SeasonalDecomposition
    } else if pattern.growth_trend != 0.0 {
        PredictionModel::TrendExtrapolation
    } else {
        PredictionModel::Smoothing
    }
}

/// Season length handed to seasonal decomposition: the mined period in
/// hours, or a day when no period was found.
pub fn season_hours(pattern: &UsagePatternAnalysis) -> u32 {
    if pattern.has_seasonality && pattern.seasonality_period_days > 0 {
        pattern.seasonality_period_days.saturating_mul(24)
    } else {
        DEFAULT_SEASON_HOURS
    }
}

fn schedules(pattern: &UsagePatternAnalysis, constraints: &ScalingConstraints) -> Vec<ScalingSchedule> {
    let min = constraints.minimum_instances;
    let max = constraints.maximum_instances;
    let mut schedules = Vec::new();

    if let (Some(first), Some(last)) = (pattern.peak_hours.iter().min(), pattern.peak_hours.iter().max()) {
        let peak_target = (min + 1).max((0.6 * max as f64).ceil() as u32).min(max);
        let off_peak_target = min.max((0.3 * max as f64).ceil() as u32);
        schedules.push(ScalingSchedule::new(
            "weekday-ramp-up",
            Weekday::WORKDAYS.to_vec(),
            *first,
            0,
            peak_target,
        ));
        schedules.push(ScalingSchedule::new(
            "weekday-ramp-down",
            Weekday::WORKDAYS.to_vec(),
            (*last + 1) % 24,
            0,
            off_peak_target,
        ));
    }

    if pattern.weekend_pattern == WeekendPattern::Low {
        schedules.push(ScalingSchedule::new("weekend-low", vec![Weekday::Saturday], 0, 0, min));
    }

    schedules
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_state::{BoxFuture, KIND_CONTAINER_CLUSTER, KIND_HOSTING_PLAN, StateStore};

    fn resource(kind: &str) -> ResourceInfo {
        ResourceInfo {
            id: "res-1".to_string(),
            kind: kind.to_string(),
            name: "res".to_string(),
            current_instances: 2,
        }
    }

    fn pattern() -> UsagePatternAnalysis {
        UsagePatternAnalysis::default()
    }

    #[test]
    fn strategy_rules_in_order() {
        let mut p = pattern();
        assert_eq!(strategy(&p), ScalingStrategy::Balanced);

        p.weekend_pattern = WeekendPattern::Low;
        assert_eq!(strategy(&p), ScalingStrategy::CostOptimized);

        p.has_seasonality = true;
        p.peak_hours = (8..=14).collect();
        assert_eq!(strategy(&p), ScalingStrategy::PerformanceOptimized);

        p.growth_trend = 0.15;
        assert_eq!(strategy(&p), ScalingStrategy::Aggressive);
    }

    #[test]
    fn six_peak_hours_is_not_performance_optimized() {
        let mut p = pattern();
        p.has_seasonality = true;
        p.peak_hours = (9..=14).collect();
        assert_eq!(strategy(&p), ScalingStrategy::Balanced);
    }

    #[test]
    fn model_selection() {
        let mut p = pattern();
        assert_eq!(model(&p), PredictionModel::Smoothing);
        p.growth_trend = -0.02;
        assert_eq!(model(&p), PredictionModel::TrendExtrapolation);
        p.has_seasonality = true;
        p.seasonality_period_days = 1;
        assert_eq!(model(&p), PredictionModel::TrendExtrapolation);
        p.seasonality_period_days = 7;
        assert_eq!(model(&p), PredictionModel::SeasonalDecomposition);
    }

    #[test]
    fn weekly_pattern_forecasts_with_weekly_season() {
        let mut p = pattern();
        assert_eq!(season_hours(&p), 24);
        p.has_seasonality = true;
        p.seasonality_period_days = 1;
        assert_eq!(season_hours(&p), 24);

        p.seasonality_period_days = 7;
        p.weekend_pattern = WeekendPattern::Low;
        let cfg = derive_configuration(&resource(KIND_HOSTING_PLAN), &p, None);
        assert_eq!(cfg.prediction_settings.model, PredictionModel::SeasonalDecomposition);
        assert_eq!(cfg.prediction_settings.season_hours, 168);
    }

    #[test]
    fn neutral_pattern_yields_baseline_shape() {
        let cfg = derive_configuration(&resource(KIND_HOSTING_PLAN), &pattern(), None);
        assert_eq!(cfg.strategy, ScalingStrategy::Balanced);
        assert_eq!(cfg.metrics.primary, vec!["cpu_percent", "memory_percent"]);
        assert_eq!(cfg.metrics.secondary, vec!["http_queue_length", "requests"]);
        assert_eq!(cfg.metrics.lookback_days, 30);
        assert_eq!(cfg.thresholds.scale_up_threshold, 70.0);
        assert_eq!(cfg.thresholds.cooldown_minutes, 10);
        assert_eq!(cfg.constraints.maximum_instances, 10);
        assert_eq!(cfg.constraints.scale_up_step, 1);
        assert_eq!(cfg.constraints.maintenance_windows.len(), 1);
        assert!(cfg.schedules.is_empty());
        assert!(cfg.is_enabled);
        assert!(cfg.prediction_settings.anomaly_detection);
    }

    #[test]
    fn growing_seasonal_resource() {
        let p = UsagePatternAnalysis {
            has_seasonality: true,
            seasonality_period_days: 1,
            peak_hours: vec![9, 10, 11, 12, 13, 14, 15, 16, 17],
            low_usage_hours: vec![0, 1, 2, 3],
            weekend_pattern: WeekendPattern::Low,
            growth_trend: 0.2,
        };
        let cfg = derive_configuration(&resource(KIND_CONTAINER_CLUSTER), &p, Some(20));
        assert_eq!(cfg.strategy, ScalingStrategy::Aggressive);
        assert_eq!(cfg.thresholds.scale_up_threshold, 65.0);
        assert_eq!(cfg.thresholds.cooldown_minutes, 5);
        assert_eq!(cfg.constraints.scale_up_step, 2);
        assert_eq!(cfg.constraints.maximum_instances, 20);
        assert_eq!(cfg.metrics.primary[0], "node_cpu_percent");

        let names: Vec<&str> = cfg.schedules.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["weekday-ramp-up", "weekday-ramp-down", "weekend-low"]);
        assert_eq!(cfg.schedules[0].cron, "0 9 * * 1-5");
        assert_eq!(cfg.schedules[0].target_instances, 12);
        assert_eq!(cfg.schedules[1].cron, "0 18 * * 1-5");
        assert_eq!(cfg.schedules[1].target_instances, 6);
        assert_eq!(cfg.schedules[2].cron, "0 0 * * 6");
        assert_eq!(cfg.schedules[2].target_instances, 1);
    }

    #[test]
    fn ramp_down_wraps_midnight() {
        let p = UsagePatternAnalysis {
            peak_hours: vec![20, 21, 22, 23],
            ..UsagePatternAnalysis::default()
        };
        let cfg = derive_configuration(&resource(KIND_HOSTING_PLAN), &p, None);
        assert_eq!(cfg.schedules[0].hour, 20);
        assert_eq!(cfg.schedules[0].target_instances, 6);
        assert_eq!(cfg.schedules[1].hour, 0);
        assert_eq!(cfg.schedules[1].target_instances, 3);
    }

    #[test]
    fn small_ceiling_keeps_targets_in_range() {
        let p = UsagePatternAnalysis {
            peak_hours: vec![9],
            ..UsagePatternAnalysis::default()
        };
        let cfg = derive_configuration(&resource(KIND_HOSTING_PLAN), &p, Some(1));
        assert_eq!(cfg.constraints.maximum_instances, 1);
        assert!(cfg.schedules.iter().all(|s| s.target_instances == 1));
    }

    struct FailingPatterns;

    impl UsagePatternSource for FailingPatterns {
        fn analyze_patterns<'a>(
            &'a self,
            _resource: &'a ResourceInfo,
        ) -> BoxFuture<'a, anyhow::Result<UsagePatternAnalysis>> {
            Box::pin(async { Err(anyhow::anyhow!("history unavailable")) })
        }
    }

    #[tokio::test]
    async fn missing_resource_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        let optimizer = ConfigurationOptimizer::new(Arc::new(store), Arc::new(FailingPatterns));
        assert!(matches!(
            optimizer.optimize("ghost").await,
            Err(InsightsError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failing_pattern_source_falls_back_to_neutral() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_resource(&resource(KIND_HOSTING_PLAN)).unwrap();
        let mut limits = HashMap::new();
        limits.insert(KIND_HOSTING_PLAN.to_string(), 30);
        let optimizer =
            ConfigurationOptimizer::new(Arc::new(store), Arc::new(FailingPatterns)).with_max_instances(limits);

        let cfg = optimizer.optimize("res-1").await.unwrap();
        assert_eq!(cfg.strategy, ScalingStrategy::Balanced);
        assert_eq!(cfg.prediction_settings.model, PredictionModel::Smoothing);
        assert_eq!(cfg.constraints.maximum_instances, 30);
        assert_eq!(cfg.resource_id, "res-1");
    }
}
