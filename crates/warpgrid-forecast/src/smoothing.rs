//! Simple exponential smoothing.
//!
//! Projects the final smoothed level flat across the horizon. The band is
//! built from the one-step-ahead residuals of the smoother. Series shorter
//! than one linear-trend window are declined so they get the flat ±20%
//! forecast instead of a band built from one or two residuals.

use warpgrid_state::{MetricDataPoint, MetricPrediction, PredictionPoint};

use crate::linear::{Z_95, smoothing_window};
use crate::strategy::{ForecastStrategy, mean, std_dev, step_timestamp};

/// Exponential smoothing with a fixed smoothing factor.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoothing {
    /// Weight of the newest observation, in `(0, 1]`.
    pub alpha: f64,
}

impl Default for ExponentialSmoothing {
    fn default() -> Self {
        Self { alpha: 0.3 }
    }
}

impl ForecastStrategy for ExponentialSmoothing {
    fn name(&self) -> &'static str {
        "exponential-smoothing"
    }

    fn forecast(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> Option<MetricPrediction> {
        if smoothing_window(series.len()) == 0 || !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return None;
        }

        let mut level = series[0].value;
        let mut residuals = Vec::with_capacity(series.len() - 1);
        for point in &series[1..] {
            residuals.push(point.value - level);
            level = self.alpha * point.value + (1.0 - self.alpha) * level;
        }

        let value = level.max(0.0);
        let radius = Z_95 * std_dev(&residuals);
        let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
        let sq: Vec<f64> = residuals.iter().map(|r| r * r).collect();

        let predictions = (1..=horizon_hours)
            .map(|h| PredictionPoint {
                timestamp: step_timestamp(now, h),
                value,
                lower_bound: (value - radius).max(0.0),
                upper_bound: value + radius,
            })
            .collect();

        Some(MetricPrediction {
            metric_name: metric.to_string(),
            predictions,
            mean_absolute_error: mean(&abs),
            root_mean_squared_error: mean(&sq).sqrt(),
        })
    }
}
