//! Usage pattern miner.
//!
//! Characterizes a resource's long-range load from its primary CPU metric:
//!
//! ```text
//! hourly profile   mean per UTC hour of day
//! peak hours       hourly mean > 1.2 × overall mean
//! low hours        hourly mean < 0.8 × overall mean
//! weekend pattern  weekend / weekday mean: < 0.7 Low, > 1.3 High
//! seasonality      weekly if the weekend pattern is not Normal,
//!                  else daily if the hourly profile's CV > 0.15
//! growth trend     (mean of later daily means − earlier) / earlier
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use warpgrid_state::{
    BoxFuture, MetricDataPoint, ResourceInfo, TelemetrySource, UsagePatternAnalysis,
    UsagePatternSource, WeekendPattern, Weekday, default_metrics_for_kind, hour_of_day,
    is_cpu_metric,
};

pub const PEAK_FACTOR: f64 = 1.2;
pub const LOW_FACTOR: f64 = 0.8;
pub const WEEKEND_LOW_RATIO: f64 = 0.7;
pub const WEEKEND_HIGH_RATIO: f64 = 1.3;
pub const DAILY_CV_THRESHOLD: f64 = 0.15;

const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Mines usage patterns from stored telemetry.
pub struct PatternMiner {
    telemetry: Arc<dyn TelemetrySource>,
    lookback_days: u32,
}

impl PatternMiner {
    pub fn new(telemetry: Arc<dyn TelemetrySource>) -> Self {
        Self {
            telemetry,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Analyze the resource's primary CPU metric over the lookback ending at `now`.
    pub async fn mine(&self, resource: &ResourceInfo, now: u64) -> anyhow::Result<UsagePatternAnalysis> {
        let metric = primary_metric(&resource.kind);
        let start = now.saturating_sub(self.lookback_days as u64 * 86_400);
        let points = tokio::time::timeout(
            FETCH_TIMEOUT,
            self.telemetry.get_metrics(&resource.id, &metric, start, now),
        )
        .await
        .map_err(|_| anyhow::anyhow!("telemetry fetch for {metric} timed out"))??;

        let analysis = analyze_series(&points);
        info!(
            resource = %resource.id,
            %metric,
            points = points.len(),
            seasonal = analysis.has_seasonality,
            period_days = analysis.seasonality_period_days,
            peak_hours = analysis.peak_hours.len(),
            weekend = ?analysis.weekend_pattern,
            growth = analysis.growth_trend,
            "usage patterns mined"
        );
        Ok(analysis)
    }
}

impl UsagePatternSource for PatternMiner {
    fn analyze_patterns<'a>(
        &'a self,
        resource: &'a ResourceInfo,
    ) -> BoxFuture<'a, anyhow::Result<UsagePatternAnalysis>> {
        Box::pin(async move { self.mine(resource, epoch_secs()).await })
    }
}

/// The first CPU-like primary metric for a kind, else its first primary.
pub fn primary_metric(kind: &str) -> String {
    let (primary, _) = default_metrics_for_kind(kind);
    primary
        .iter()
        .find(|m| is_cpu_metric(m))
        .or_else(|| primary.first())
        .cloned()
        .unwrap_or_else(|| "cpu_percent".to_string())
}

/// Characterize a series. An empty series yields the neutral analysis.
pub fn analyze_series(points: &[MetricDataPoint]) -> UsagePatternAnalysis {
    let points: Vec<MetricDataPoint> = points.iter().copied().filter(|p| p.value.is_finite()).collect();
    if points.is_empty() {
        return UsagePatternAnalysis::default();
    }

    let overall = mean(points.iter().map(|p| p.value));

    let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for p in &points {
        by_hour.entry(hour_of_day(p.timestamp)).or_default().push(p.value);
    }
    let hourly: BTreeMap<u32, f64> = by_hour
        .into_iter()
        .map(|(hour, values)| (hour, mean(values.into_iter())))
        .collect();

    let (peak_hours, low_usage_hours) = if overall > 0.0 {
        (
            hourly
                .iter()
                .filter(|(_, m)| **m > overall * PEAK_FACTOR)
                .map(|(h, _)| *h)
                .collect(),
            hourly
                .iter()
                .filter(|(_, m)| **m < overall * LOW_FACTOR)
                .map(|(h, _)| *h)
                .collect(),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let weekend_pattern = weekend_pattern(&points);
    let hourly_means: Vec<f64> = hourly.values().copied().collect();
    let daily_seasonal = coefficient_of_variation(&hourly_means) > DAILY_CV_THRESHOLD;

    let (has_seasonality, seasonality_period_days) = if weekend_pattern != WeekendPattern::Normal {
        (true, 7)
    } else if daily_seasonal {
        (true, 1)
    } else {
        (false, 0)
    };

    let growth_trend = growth_trend(&points);
    debug!(
        overall,
        hours = hourly_means.len(),
        daily_seasonal,
        growth_trend,
        "series characterized"
    );

    UsagePatternAnalysis {
        has_seasonality,
        seasonality_period_days,
        peak_hours,
        low_usage_hours,
        weekend_pattern,
        growth_trend,
    }
}

fn weekend_pattern(points: &[MetricDataPoint]) -> WeekendPattern {
    let (weekend, weekday): (Vec<&MetricDataPoint>, Vec<&MetricDataPoint>) = points
        .iter()
        .partition(|p| Weekday::of_timestamp(p.timestamp).is_weekend());
    if weekend.is_empty() || weekday.is_empty() {
        return WeekendPattern::Normal;
    }
    let weekday_mean = mean(weekday.iter().map(|p| p.value));
    if weekday_mean <= 0.0 {
        return WeekendPattern::Normal;
    }
    let ratio = mean(weekend.iter().map(|p| p.value)) / weekday_mean;
    if ratio < WEEKEND_LOW_RATIO {
        WeekendPattern::Low
    } else if ratio > WEEKEND_HIGH_RATIO {
        WeekendPattern::High
    } else {
        WeekendPattern::Normal
    }
}

/// Relative change between the earlier and later halves of the daily means.
fn growth_trend(points: &[MetricDataPoint]) -> f64 {
    let mut by_day: BTreeMap<u64, Vec<f64>> = BTreeMap::new();
    for p in points {
        by_day.entry(p.timestamp / 86_400).or_default().push(p.value);
    }
    if by_day.len() < 2 {
        return 0.0;
    }
    let daily: Vec<f64> = by_day.into_values().map(|v| mean(v.into_iter())).collect();
    let (earlier, later) = daily.split_at(daily.len() / 2);
    let earlier = mean(earlier.iter().copied());
    let later = mean(later.iter().copied());
    if earlier <= 0.0 {
        return 0.0;
    }
    (later - earlier) / earlier
}

fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values.iter().copied());
    if m <= 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / m
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
