//! Forecasting strategies and the model registry.
//!
//! A strategy turns a sorted, non-empty historical series into a
//! [`MetricPrediction`] covering `horizon_hours` one-hour steps starting at
//! `now + 1h`. The registry maps each [`PredictionModel`] to a strategy;
//! the linear-trend strategy is always the fallback.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use warpgrid_state::{MetricDataPoint, MetricPrediction, PredictionModel, PredictionSettings};

use crate::linear::LinearTrend;
use crate::seasonal::SeasonalDecomposition;
use crate::smoothing::ExponentialSmoothing;

/// Forecast step length in seconds.
pub const STEP_SECS: u64 = 3600;

/// A pluggable forecasting method.
pub trait ForecastStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Forecast `horizon_hours` steps from a sorted, non-empty series.
    ///
    /// Returns `None` when the series does not suit this strategy; the
    /// registry then falls back to the linear trend.
    fn forecast(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> Option<MetricPrediction>;

    /// Forecast with a caller-chosen season length. Strategies without a
    /// seasonal component ignore `season_hours`.
    fn forecast_with_season(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
        season_hours: u32,
    ) -> Option<MetricPrediction> {
        let _ = season_hours;
        self.forecast(metric, horizon_hours, series, now)
    }
}

/// Maps prediction models to strategies.
pub struct StrategyRegistry {
    strategies: HashMap<PredictionModel, Arc<dyn ForecastStrategy>>,
    fallback: LinearTrend,
}

impl StrategyRegistry {
    /// A registry with only the linear-trend fallback.
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: LinearTrend,
        }
    }

    /// Register (or replace) the strategy for a model.
    pub fn register(mut self, model: PredictionModel, strategy: Arc<dyn ForecastStrategy>) -> Self {
        self.strategies.insert(model, strategy);
        self
    }

    /// Whether a dedicated strategy is registered for `model`.
    pub fn has(&self, model: PredictionModel) -> bool {
        self.strategies.contains_key(&model)
    }

    /// Forecast with the strategy for `settings.model`, falling back to linear trend.
    pub fn forecast(
        &self,
        settings: &PredictionSettings,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> MetricPrediction {
        if let Some(strategy) = self.strategies.get(&settings.model) {
            if let Some(prediction) =
                strategy.forecast_with_season(metric, horizon_hours, series, now, settings.season_hours)
            {
                return prediction;
            }
            debug!(
                %metric,
                strategy = strategy.name(),
                points = series.len(),
                "strategy declined series, using linear trend"
            );
        }
        self.fallback.project(metric, horizon_hours, series, now)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::empty()
            .register(PredictionModel::TrendExtrapolation, Arc::new(LinearTrend))
            .register(PredictionModel::Smoothing, Arc::new(ExponentialSmoothing::default()))
            .register(
                PredictionModel::SeasonalDecomposition,
                Arc::new(SeasonalDecomposition::default()),
            )
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Timestamp of horizon step `h` (1-indexed).
pub(crate) fn step_timestamp(now: u64, h: u32) -> u64 {
    now + STEP_SECS * h as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_state::PredictionPoint;

    struct Declines;

    impl ForecastStrategy for Declines {
        fn name(&self) -> &'static str {
            "declines"
        }

        fn forecast(&self, _: &str, _: u32, _: &[MetricDataPoint], _: u64) -> Option<MetricPrediction> {
            None
        }
    }

    struct Constant(f64);

    impl ForecastStrategy for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn forecast(&self, metric: &str, horizon: u32, _: &[MetricDataPoint], now: u64) -> Option<MetricPrediction> {
            Some(MetricPrediction {
                metric_name: metric.to_string(),
                predictions: (1..=horizon)
                    .map(|h| PredictionPoint {
                        timestamp: step_timestamp(now, h),
                        value: self.0,
                        lower_bound: self.0,
                        upper_bound: self.0,
                    })
                    .collect(),
                mean_absolute_error: 0.0,
                root_mean_squared_error: 0.0,
            })
        }
    }

    fn series() -> Vec<MetricDataPoint> {
        (0..8)
            .map(|i| MetricDataPoint {
                timestamp: i * STEP_SECS,
                value: 10.0,
            })
            .collect()
    }

    #[test]
    fn registered_strategy_is_used() {
        let registry = StrategyRegistry::empty().register(PredictionModel::Smoothing, Arc::new(Constant(42.0)));
        let p = registry.forecast(&PredictionModel::Smoothing.into(), "cpu", 2, &series(), 0);
        assert_eq!(p.predictions[0].value, 42.0);
    }

    #[test]
    fn unregistered_model_falls_back_to_linear() {
        let registry = StrategyRegistry::empty();
        assert!(!registry.has(PredictionModel::SeasonalDecomposition));
        let p = registry.forecast(&PredictionModel::SeasonalDecomposition.into(), "cpu", 3, &series(), 0);
        assert_eq!(p.predictions.len(), 3);
        assert!((p.predictions[0].value - 10.0).abs() < 1e-9);
    }

    #[test]
    fn declining_strategy_falls_back_to_linear() {
        let registry = StrategyRegistry::empty().register(PredictionModel::Smoothing, Arc::new(Declines));
        let p = registry.forecast(&PredictionModel::Smoothing.into(), "cpu", 1, &series(), 0);
        assert_eq!(p.predictions.len(), 1);
    }

    #[test]
    fn short_series_gets_flat_band_under_every_model() {
        let registry = StrategyRegistry::default();
        let series: Vec<MetricDataPoint> = [40.0, 50.0, 60.0]
            .iter()
            .enumerate()
            .map(|(i, &value)| MetricDataPoint {
                timestamp: i as u64 * STEP_SECS,
                value,
            })
            .collect();
        for model in [
            PredictionModel::Smoothing,
            PredictionModel::TrendExtrapolation,
            PredictionModel::SeasonalDecomposition,
        ] {
            let p = registry.forecast(&model.into(), "cpu", 2, &series, 3 * STEP_SECS);
            for point in &p.predictions {
                assert!((point.value - 50.0).abs() < 1e-9, "{model:?}");
                assert!((point.lower_bound - 40.0).abs() < 1e-9, "{model:?}");
                assert!((point.upper_bound - 60.0).abs() < 1e-9, "{model:?}");
            }
            assert!((p.mean_absolute_error - 10.0).abs() < 1e-9, "{model:?}");
        }
    }

    #[test]
    fn default_registry_covers_every_model() {
        let registry = StrategyRegistry::default();
        for model in [
            PredictionModel::Smoothing,
            PredictionModel::TrendExtrapolation,
            PredictionModel::SeasonalDecomposition,
        ] {
            assert!(registry.has(model));
        }
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev(&[3.0, 3.0, 3.0]), 0.0);
        assert!((std_dev(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
    }
}
