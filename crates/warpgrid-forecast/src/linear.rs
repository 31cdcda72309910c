//! Linear trend over a moving average — the baseline forecasting method.
//!
//! ```text
//! window     = min(24, n / 4)
//! averages   = moving averages of `window` consecutive points
//! trend      = (averages.last - averages.first) / averages.len
//! value(h)   = max(0, averages.last + trend * h)
//! radius     = 1.96 * stddev(averages)            // 95% band
//! bounds(h)  = [max(0, value - radius), value + radius]
//! MAE        = stddev(averages), RMSE = 1.1 * MAE
//! ```
//!
//! Series shorter than one window get a flat forecast at the sample mean
//! with bounds at ±20%.

use warpgrid_state::{MetricDataPoint, MetricPrediction, PredictionPoint};

use crate::strategy::{ForecastStrategy, mean, std_dev, step_timestamp};

/// Upper bound on the smoothing window (one day of hourly points).
pub const MAX_WINDOW: usize = 24;

/// z-score of a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Half-width of the flat-forecast band, as a fraction of the mean.
pub const FLAT_BAND: f64 = 0.2;

/// Linear trend extrapolation with a confidence band.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrend;

impl LinearTrend {
    /// Always produces a forecast; used directly as the registry fallback.
    pub fn project(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> MetricPrediction {
        let values: Vec<f64> = series.iter().map(|p| p.value).collect();
        let window = smoothing_window(values.len());
        if window == 0 || values.len() < window {
            return flat_forecast(metric, horizon_hours, &values, now);
        }

        let averages: Vec<f64> = values.windows(window).map(mean).collect();
        let first = averages[0];
        let last = averages[averages.len() - 1];
        let trend = (last - first) / averages.len() as f64;
        let sd = std_dev(&averages);
        let radius = Z_95 * sd;

        let predictions = (1..=horizon_hours)
            .map(|h| {
                let value = (last + trend * h as f64).max(0.0);
                PredictionPoint {
                    timestamp: step_timestamp(now, h),
                    value,
                    lower_bound: (value - radius).max(0.0),
                    upper_bound: value + radius,
                }
            })
            .collect();

        MetricPrediction {
            metric_name: metric.to_string(),
            predictions,
            mean_absolute_error: sd,
            root_mean_squared_error: 1.1 * sd,
        }
    }
}

impl ForecastStrategy for LinearTrend {
    fn name(&self) -> &'static str {
        "linear-trend"
    }

    fn forecast(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> Option<MetricPrediction> {
        Some(self.project(metric, horizon_hours, series, now))
    }
}

/// Moving-average window for a series of `len` points.
pub fn smoothing_window(len: usize) -> usize {
    (len / 4).min(MAX_WINDOW)
}

/// Flat projection of the sample mean with a ±20% band.
///
/// The error fields carry the band half-width so that downstream
/// confidence scoring does not read a degenerate forecast as exact.
pub fn flat_forecast(metric: &str, horizon_hours: u32, values: &[f64], now: u64) -> MetricPrediction {
    let m = mean(values).max(0.0);
    let half_width = m * FLAT_BAND;
    let predictions = (1..=horizon_hours)
        .map(|h| PredictionPoint {
            timestamp: step_timestamp(now, h),
            value: m,
            lower_bound: m - half_width,
            upper_bound: m + half_width,
        })
        .collect();

    let mae = half_width;
    MetricPrediction {
        metric_name: metric.to_string(),
        predictions,
        mean_absolute_error: mae,
        root_mean_squared_error: 1.1 * mae,
    }
}
