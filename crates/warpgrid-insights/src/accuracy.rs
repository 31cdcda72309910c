//! Forecast accuracy by backtesting.
//!
//! Forecasts each configured metric from the history before the window's
//! start, then scores the forecast against the hourly means of what was
//! actually observed: `accuracy = clamp(1 − MAPE, 0, 1)`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use warpgrid_forecast::{Forecaster, STEP_SECS};
use warpgrid_state::{
    BoxFuture, CancelSignal, ConfigurationSource, ForecastAccuracy, MetricDataPoint,
    MetricPrediction, ResourceDirectory, ScalingConfiguration, TelemetrySource,
};

/// Longest backtest horizon (one week).
pub const MAX_BACKTEST_HOURS: u32 = 168;

pub struct BacktestAccuracy {
    forecaster: Forecaster,
    telemetry: Arc<dyn TelemetrySource>,
    directory: Arc<dyn ResourceDirectory>,
    configs: Arc<dyn ConfigurationSource>,
}

impl BacktestAccuracy {
    pub fn new(
        forecaster: Forecaster,
        telemetry: Arc<dyn TelemetrySource>,
        directory: Arc<dyn ResourceDirectory>,
        configs: Arc<dyn ConfigurationSource>,
    ) -> Self {
        Self {
            forecaster,
            telemetry,
            directory,
            configs,
        }
    }

    pub async fn score(&self, resource_id: &str, start: u64, end: u64) -> anyhow::Result<BTreeMap<String, f64>> {
        let config = match self.configs.get_configuration(resource_id).await? {
            Some(config) => Some(config),
            None => self
                .directory
                .get_resource(resource_id)
                .await?
                .map(|r| ScalingConfiguration::baseline(&r)),
        };
        let Some(config) = config else {
            return Ok(BTreeMap::new());
        };
        let metrics = config.metrics.all();
        if metrics.is_empty() || end <= start {
            return Ok(BTreeMap::new());
        }

        let hours = (end - start).div_ceil(STEP_SECS).clamp(1, MAX_BACKTEST_HOURS as u64) as u32;
        let predictions = self
            .forecaster
            .predict_at(
                resource_id,
                &metrics,
                hours,
                &config.prediction_settings,
                start,
                &CancelSignal::never(),
            )
            .await?;

        let mut scores = BTreeMap::new();
        for prediction in &predictions {
            let actual = self
                .telemetry
                .get_metrics(resource_id, &prediction.metric_name, start, end)
                .await?;
            if let Some(accuracy) = score_prediction(prediction, &actual) {
                debug!(resource = %resource_id, metric = %prediction.metric_name, accuracy, "backtest scored");
                scores.insert(prediction.metric_name.clone(), accuracy);
            }
        }
        Ok(scores)
    }
}

/// Compare each forecast step at `T` against the mean of actuals in
/// `(T - 1h, T]`. `None` when no step has a non-zero actual to compare.
pub fn score_prediction(prediction: &MetricPrediction, actual: &[MetricDataPoint]) -> Option<f64> {
    let mut errors = Vec::new();
    for point in &prediction.predictions {
        let from = point.timestamp.saturating_sub(STEP_SECS);
        let bucket: Vec<f64> = actual
            .iter()
            .filter(|a| a.timestamp > from && a.timestamp <= point.timestamp && a.value.is_finite())
            .map(|a| a.value)
            .collect();
        if bucket.is_empty() {
            continue;
        }
        let observed = bucket.iter().sum::<f64>() / bucket.len() as f64;
        if observed == 0.0 {
            continue;
        }
        errors.push(((observed - point.value) / observed).abs());
    }
    if errors.is_empty() {
        return None;
    }
    let mape = errors.iter().sum::<f64>() / errors.len() as f64;
    Some((1.0 - mape).clamp(0.0, 1.0))
}

impl ForecastAccuracy for BacktestAccuracy {
    fn accuracy<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<BTreeMap<String, f64>>> {
        Box::pin(self.score(resource_id, start, end))
    }
}
