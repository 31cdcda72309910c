//! Metric forecaster — fetches history per metric and projects it forward.
//!
//! Each metric is fetched and forecast on its own task, so one slow or
//! failing metric never holds up or aborts the others. A metric with no
//! usable history is left out of the result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use warpgrid_state::{CancelSignal, MetricDataPoint, MetricPrediction, PredictionSettings, TelemetrySource};

use crate::error::{ForecastError, ForecastResult};
use crate::strategy::StrategyRegistry;

/// Default history window.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Default bound on a single telemetry fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Forecasts metrics for a resource from its telemetry.
#[derive(Clone)]
pub struct Forecaster {
    telemetry: Arc<dyn TelemetrySource>,
    strategies: Arc<StrategyRegistry>,
    lookback_secs: u64,
    fetch_timeout: Duration,
}

impl Forecaster {
    /// Create a forecaster with the default strategies, 30-day lookback, and 10s fetch timeout.
    pub fn new(telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self {
            telemetry,
            strategies: Arc::new(StrategyRegistry::default()),
            lookback_secs: DEFAULT_LOOKBACK_DAYS as u64 * 86_400,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_strategies(mut self, strategies: StrategyRegistry) -> Self {
        self.strategies = Arc::new(strategies);
        self
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_secs = days as u64 * 86_400;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    /// Forecast `metric_names` for `resource_id` starting from the current time.
    pub async fn predict(
        &self,
        resource_id: &str,
        metric_names: &[String],
        horizon_hours: u32,
        settings: &PredictionSettings,
        cancel: &CancelSignal,
    ) -> ForecastResult<Vec<MetricPrediction>> {
        self.predict_at(resource_id, metric_names, horizon_hours, settings, epoch_secs(), cancel)
            .await
    }

    /// Forecast as of `now`. Results keep the order of `metric_names`.
    pub async fn predict_at(
        &self,
        resource_id: &str,
        metric_names: &[String],
        horizon_hours: u32,
        settings: &PredictionSettings,
        now: u64,
        cancel: &CancelSignal,
    ) -> ForecastResult<Vec<MetricPrediction>> {
        if metric_names.is_empty() {
            return Err(ForecastError::InvalidRequest("no metrics requested".to_string()));
        }
        if horizon_hours == 0 {
            return Err(ForecastError::InvalidRequest("horizon must be at least 1 hour".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }

        let start = now.saturating_sub(self.lookback_secs);
        let mut tasks = JoinSet::new();
        let mut task_metrics = HashMap::new();

        for (index, metric) in metric_names.iter().enumerate() {
            let telemetry = self.telemetry.clone();
            let strategies = self.strategies.clone();
            let resource_id = resource_id.to_string();
            let metric_name = metric.clone();
            let fetch_timeout = self.fetch_timeout;
            let settings = settings.clone();

            let handle = tasks.spawn(async move {
                let series =
                    fetch_series(telemetry.as_ref(), &resource_id, &metric_name, start, now, fetch_timeout)
                        .await?;
                let prediction = strategies.forecast(&settings, &metric_name, horizon_hours, &series, now);
                debug!(
                    resource = %resource_id,
                    metric = %metric_name,
                    points = series.len(),
                    model = ?settings.model,
                    season_hours = settings.season_hours,
                    "metric forecast computed"
                );
                Some((index, prediction))
            });
            task_metrics.insert(handle.id(), metric.clone());
        }

        let mut slots: Vec<Option<MetricPrediction>> = vec![None; metric_names.len()];
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!(resource = %resource_id, "forecast cancelled");
                    return Err(ForecastError::Cancelled);
                }
                joined = tasks.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((_, Some((index, prediction))))) => slots[index] = Some(prediction),
                    Some(Ok((_, None))) => {}
                    Some(Err(e)) => {
                        let metric = task_metrics.get(&e.id()).map(String::as_str).unwrap_or("?");
                        error!(resource = %resource_id, %metric, error = %e, "metric forecast task failed");
                    }
                },
            }
        }

        let predictions: Vec<MetricPrediction> = slots.into_iter().flatten().collect();
        info!(
            resource = %resource_id,
            requested = metric_names.len(),
            forecast = predictions.len(),
            horizon_hours,
            "metrics forecast"
        );
        Ok(predictions)
    }
}

/// Fetch, clean, and sort one metric's history. `None` means "no usable data".
async fn fetch_series(
    telemetry: &dyn TelemetrySource,
    resource_id: &str,
    metric: &str,
    start: u64,
    end: u64,
    timeout: Duration,
) -> Option<Vec<MetricDataPoint>> {
    let fetched = tokio::time::timeout(timeout, telemetry.get_metrics(resource_id, metric, start, end)).await;
    let mut points = match fetched {
        Ok(Ok(points)) => points,
        Ok(Err(e)) => {
            warn!(resource = %resource_id, %metric, error = %e, "telemetry fetch failed, skipping metric");
            return None;
        }
        Err(_) => {
            warn!(
                resource = %resource_id,
                %metric,
                timeout_ms = timeout.as_millis() as u64,
                "telemetry fetch timed out, skipping metric"
            );
            return None;
        }
    };

    let before = points.len();
    points.retain(|p| p.value.is_finite());
    if points.len() < before {
        debug!(resource = %resource_id, %metric, dropped = before - points.len(), "dropped non-finite samples");
    }
    if points.is_empty() {
        info!(resource = %resource_id, %metric, "no historical data, skipping metric");
        return None;
    }

    points.sort_by_key(|p| p.timestamp);
    Some(points)
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use warpgrid_state::{BoxFuture, PredictionModel, StateStore};

    const NOW: u64 = 40 * 86_400;

    /// Telemetry double keyed by metric name; "fail" errors, "slow" hangs.
    struct FakeTelemetry {
        series: HashMap<String, Vec<MetricDataPoint>>,
    }

    impl TelemetrySource for FakeTelemetry {
        fn get_metrics<'a>(
            &'a self,
            _resource_id: &'a str,
            metric: &'a str,
            _start: u64,
            _end: u64,
        ) -> BoxFuture<'a, anyhow::Result<Vec<MetricDataPoint>>> {
            Box::pin(async move {
                match metric {
                    "fail" => anyhow::bail!("telemetry backend unavailable"),
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Vec::new())
                    }
                    _ => Ok(self.series.get(metric).cloned().unwrap_or_default()),
                }
            })
        }
    }

    fn hourly(values: &[f64]) -> Vec<MetricDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| MetricDataPoint {
                timestamp: NOW - (values.len() - i) as u64 * 3600,
                value,
            })
            .collect()
    }

    fn forecaster(series: HashMap<String, Vec<MetricDataPoint>>) -> Forecaster {
        Forecaster::new(Arc::new(FakeTelemetry { series })).with_fetch_timeout(Duration::from_millis(50))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn rejects_empty_metric_list() {
        let f = forecaster(HashMap::new());
        let err = f
            .predict_at("vm", &[], 1, &PredictionModel::TrendExtrapolation.into(), NOW, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn rejects_zero_horizon() {
        let f = forecaster(HashMap::new());
        let err = f
            .predict_at("vm", &names(&["cpu"]), 0, &PredictionModel::TrendExtrapolation.into(), NOW, &CancelSignal::never())
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn failing_and_empty_metrics_are_skipped() {
        let mut series = HashMap::new();
        series.insert("cpu_percent".to_string(), hourly(&[50.0; 48]));
        series.insert("memory_percent".to_string(), hourly(&[30.0; 48]));
        let f = forecaster(series);

        let predictions = f
            .predict_at(
                "vm",
                &names(&["fail", "cpu_percent", "empty", "slow", "memory_percent"]),
                6,
                &PredictionModel::TrendExtrapolation.into(),
                NOW,
                &CancelSignal::never(),
            )
            .await
            .unwrap();

        let got: Vec<&str> = predictions.iter().map(|p| p.metric_name.as_str()).collect();
        assert_eq!(got, vec!["cpu_percent", "memory_percent"]);
        assert_eq!(predictions[0].predictions.len(), 6);
        assert_eq!(predictions[0].predictions[0].timestamp, NOW + 3600);
    }

    #[tokio::test]
    async fn out_of_order_points_are_sorted() {
        let mut points = hourly(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0]);
        points.reverse();
        let mut series = HashMap::new();
        series.insert("cpu".to_string(), points);
        let f = forecaster(series);

        let predictions = f
            .predict_at("vm", &names(&["cpu"]), 1, &PredictionModel::TrendExtrapolation.into(), NOW, &CancelSignal::never())
            .await
            .unwrap();
        // Rising once sorted: next step lies above the last average.
        assert!(predictions[0].predictions[0].value > 70.0);
    }

    #[tokio::test]
    async fn cancelled_before_start_returns_error() {
        let (handle, signal) = CancelSignal::pair();
        handle.cancel();
        let f = forecaster(HashMap::new());
        let err = f
            .predict_at("vm", &names(&["cpu"]), 1, &PredictionModel::TrendExtrapolation.into(), NOW, &signal)
            .await
            .unwrap_err();
        assert!(matches!(err, ForecastError::Cancelled));
    }

    #[tokio::test]
    async fn cancellation_interrupts_slow_fetch() {
        let (handle, signal) = CancelSignal::pair();
        let f = Forecaster::new(Arc::new(FakeTelemetry { series: HashMap::new() }))
            .with_fetch_timeout(Duration::from_secs(3600));

        let task = tokio::spawn(async move {
            f.predict_at("vm", &names(&["slow"]), 1, &PredictionModel::TrendExtrapolation.into(), NOW, &signal)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        assert!(matches!(result, Err(ForecastError::Cancelled)));
    }

    #[tokio::test]
    async fn reads_history_from_state_store() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_metric_points("vm", "cpu_percent", &hourly(&[42.0; 30])).unwrap();
        // Outside the lookback window; must be ignored.
        store
            .put_metric_points("vm", "cpu_percent", &[MetricDataPoint { timestamp: 5, value: 1000.0 }])
            .unwrap();

        let f = Forecaster::new(Arc::new(store)).with_lookback_days(7);
        let predictions = f
            .predict_at("vm", &names(&["cpu_percent"]), 2, &PredictionModel::Smoothing.into(), NOW, &CancelSignal::never())
            .await
            .unwrap();
        assert!((predictions[0].predictions[0].value - 42.0).abs() < 1e-9);
    }
}
