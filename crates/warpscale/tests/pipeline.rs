//! End-to-end pipeline tests against a file-backed store.
//!
//! Registers a resource, loads telemetry, produces and applies a
//! recommendation, then reopens the store and checks what was persisted.

use std::collections::HashMap;
use std::sync::Arc;

use warpgrid_autoscale::{ActuatorRegistry, Executor, PredictiveAutoscaler};
use warpgrid_forecast::Forecaster;
use warpgrid_insights::{
    ConfigurationOptimizer, PatternMiner, PerformanceAnalyzer, ThresholdUtilization, derive_configuration,
};
use warpgrid_state::*;

// Monday 1970-01-12 00:00 UTC.
const NOW: u64 = 11 * 86_400;

fn vmss(instances: u32) -> ResourceInfo {
    ResourceInfo {
        id: "vmss-web".to_string(),
        kind: KIND_VM_SCALE_SET.to_string(),
        name: "web".to_string(),
        current_instances: instances,
    }
}

fn hourly_cpu(hours: u64, value: impl Fn(u64) -> f64) -> Vec<MetricDataPoint> {
    (1..=hours)
        .map(|h| {
            let timestamp = NOW - h * 3600;
            MetricDataPoint {
                timestamp,
                value: value(timestamp),
            }
        })
        .collect()
}

fn autoscaler(store: &StateStore) -> PredictiveAutoscaler {
    let shared = Arc::new(store.clone());
    let executor = Executor::new(
        shared.clone(),
        shared.clone(),
        ActuatorRegistry::recording(store.clone()),
    );
    PredictiveAutoscaler::new(
        shared.clone(),
        shared.clone(),
        shared.clone(),
        Forecaster::new(shared),
        executor,
    )
}

#[tokio::test]
async fn hot_resource_scales_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warpscale.redb");

    {
        let store = StateStore::open(&path).unwrap();
        store.put_resource(&vmss(4)).unwrap();
        store
            .put_metric_points("vmss-web", "cpu_percent", &hourly_cpu(48, |_| 95.0))
            .unwrap();

        let scaler = autoscaler(&store);
        let cancel = CancelSignal::never();
        let mut rec = scaler
            .generate_prediction_at("vmss-web", NOW + 3600, NOW, &cancel)
            .await
            .unwrap();
        assert_eq!(rec.action, ScalingAction::EmergencyScale);
        assert_eq!(rec.recommended_instances, 6);

        assert!(scaler.apply_recommendation(&mut rec, &cancel).await.unwrap());
        assert!(rec.execution_time.is_some());
    }

    let store = StateStore::open(&path).unwrap();
    assert_eq!(store.get_resource("vmss-web").unwrap().unwrap().current_instances, 6);

    let events = store.list_events("vmss-web", 0, u64::MAX).unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].success);
    assert_eq!(events[0].from_instances, 4);
    assert_eq!(events[0].to_instances, 6);
    assert_eq!(events[0].trigger, "predictive");

    let metrics = PerformanceAnalyzer::new(Arc::new(store.clone()))
        .analyze("vmss-web", 0, u64::MAX)
        .await;
    assert_eq!(metrics.total_scaling_events, 1);
    assert_eq!(metrics.successful_scaling_events, 1);
}

#[tokio::test]
async fn saved_optimization_drives_next_decision() {
    let store = StateStore::open_in_memory().unwrap();
    store.put_resource(&vmss(2)).unwrap();
    // Business hours busy, nights quiet, for two weeks.
    let points = hourly_cpu(14 * 24, |ts| {
        if (9..=17).contains(&hour_of_day(ts)) { 80.0 } else { 20.0 }
    });
    store.put_metric_points("vmss-web", "cpu_percent", &points).unwrap();

    let shared = Arc::new(store.clone());
    let miner = PatternMiner::new(shared.clone());
    let pattern = miner.mine(&vmss(2), NOW).await.unwrap();
    assert_eq!(pattern.peak_hours, (9..=17).collect::<Vec<u32>>());

    let optimizer = ConfigurationOptimizer::new(shared.clone(), Arc::new(miner))
        .with_max_instances(HashMap::from([(KIND_VM_SCALE_SET.to_string(), 8)]));
    let config = optimizer.optimize("vmss-web").await.unwrap();
    assert_eq!(config.resource_id, "vmss-web");
    assert_eq!(config.constraints.maximum_instances, 8);
    assert!(!config.schedules.is_empty());
    store.put_configuration(&config).unwrap();

    assert_eq!(store.get_configuration("vmss-web").unwrap(), Some(config.clone()));

    let report = ThresholdUtilization::new(shared.clone(), shared.clone(), shared)
        .report("vmss-web", NOW - 14 * 86_400, NOW)
        .await
        .unwrap();
    assert!(report.over_provisioned_pct + report.under_provisioned_pct <= 100.0);

    let rec = autoscaler(&store)
        .generate_prediction_at("vmss-web", NOW + 3600, NOW, &CancelSignal::never())
        .await
        .unwrap();
    assert!(rec.recommended_instances >= config.constraints.minimum_instances);
    assert!(rec.recommended_instances <= config.constraints.maximum_instances);
}

#[tokio::test]
async fn quiet_weekends_are_forecast_with_a_weekly_season() {
    // Monday 1970-02-09 00:00 UTC, after three full weeks of history.
    const LATER: u64 = 39 * 86_400;
    let store = StateStore::open_in_memory().unwrap();
    store.put_resource(&vmss(3)).unwrap();
    let points: Vec<MetricDataPoint> = (1..=3 * 168u64)
        .map(|h| {
            let timestamp = LATER - h * 3600;
            let weekend = Weekday::of_timestamp(timestamp).is_weekend();
            MetricDataPoint {
                timestamp,
                value: if weekend { 20.0 } else { 60.0 },
            }
        })
        .collect();
    store.put_metric_points("vmss-web", "cpu_percent", &points).unwrap();

    let shared = Arc::new(store.clone());
    let miner = PatternMiner::new(shared.clone());
    let pattern = miner.mine(&vmss(3), LATER).await.unwrap();
    assert_eq!(pattern.weekend_pattern, WeekendPattern::Low);

    let config = derive_configuration(&vmss(3), &pattern, None);
    assert_eq!(config.prediction_settings.model, PredictionModel::SeasonalDecomposition);
    assert_eq!(config.prediction_settings.season_hours, 168);

    let predictions = Forecaster::new(shared)
        .predict_at(
            "vmss-web",
            &["cpu_percent".to_string()],
            168,
            &config.prediction_settings,
            LATER,
            &CancelSignal::never(),
        )
        .await
        .unwrap();
    let saturday_noon = LATER + 5 * 86_400 + 12 * 3600;
    let tuesday_noon = LATER + 86_400 + 12 * 3600;
    let at = |ts: u64| {
        predictions[0]
            .predictions
            .iter()
            .find(|p| p.timestamp == ts)
            .unwrap()
            .value
    };
    assert!((at(saturday_noon) - 20.0).abs() < 1.0);
    assert!((at(tuesday_noon) - 60.0).abs() < 1.0);
}
