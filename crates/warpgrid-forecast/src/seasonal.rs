//! Seasonal decomposition, daily by default.
//!
//! The season length comes from `PredictionSettings::season_hours` when set
//! (168 for a weekly cycle). Samples are folded into hourly buckets, a
//! per-phase offset is
//! estimated against the overall mean, the deseasonalized series is
//! projected with the linear trend, and the offset for each future hour is
//! added back.

use std::collections::BTreeMap;

use warpgrid_state::{MetricDataPoint, MetricPrediction};

use crate::linear::LinearTrend;
use crate::strategy::{ForecastStrategy, STEP_SECS, mean};

/// Additive seasonal model.
#[derive(Debug, Clone, Copy)]
pub struct SeasonalDecomposition {
    /// Season length in hourly steps.
    pub period_hours: u64,
}

impl Default for SeasonalDecomposition {
    fn default() -> Self {
        Self { period_hours: 24 }
    }
}

impl SeasonalDecomposition {
    /// Per-phase offsets from the overall mean of the hourly buckets.
    fn offsets(&self, hourly: &BTreeMap<u64, f64>) -> Vec<f64> {
        let overall = mean(&hourly.values().copied().collect::<Vec<_>>());
        let mut sums = vec![0.0; self.period_hours as usize];
        let mut counts = vec![0usize; self.period_hours as usize];
        for (&hour, &value) in hourly {
            let phase = (hour % self.period_hours) as usize;
            sums[phase] += value;
            counts[phase] += 1;
        }
        sums.iter()
            .zip(&counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    0.0
                } else {
                    sum / count as f64 - overall
                }
            })
            .collect()
    }
}

impl ForecastStrategy for SeasonalDecomposition {
    fn name(&self) -> &'static str {
        "seasonal-decomposition"
    }

    fn forecast(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
    ) -> Option<MetricPrediction> {
        if self.period_hours == 0 {
            return None;
        }

        let hourly = hourly_means(series);
        let (first, last) = (*hourly.keys().next()?, *hourly.keys().next_back()?);
        // Two full seasons are needed to tell the season from noise.
        if hourly.len() < 2 * self.period_hours as usize || last - first + 1 < 2 * self.period_hours {
            return None;
        }

        let offsets = self.offsets(&hourly);
        let deseasonalized: Vec<MetricDataPoint> = hourly
            .iter()
            .map(|(&hour, &value)| MetricDataPoint {
                timestamp: hour * STEP_SECS,
                value: value - offsets[(hour % self.period_hours) as usize],
            })
            .collect();

        let mut prediction = LinearTrend.project(metric, horizon_hours, &deseasonalized, now);
        for point in &mut prediction.predictions {
            let offset = offsets[((point.timestamp / STEP_SECS) % self.period_hours) as usize];
            let value = (point.value + offset).max(0.0);
            point.lower_bound = (point.lower_bound + offset).clamp(0.0, value);
            point.upper_bound = (point.upper_bound + offset).max(value);
            point.value = value;
        }
        Some(prediction)
    }

    fn forecast_with_season(
        &self,
        metric: &str,
        horizon_hours: u32,
        series: &[MetricDataPoint],
        now: u64,
        season_hours: u32,
    ) -> Option<MetricPrediction> {
        let period_hours = if season_hours == 0 {
            self.period_hours
        } else {
            season_hours as u64
        };
        Self { period_hours }.forecast(metric, horizon_hours, series, now)
    }
}

/// Mean value per absolute hour index (`timestamp / 3600`).
fn hourly_means(series: &[MetricDataPoint]) -> BTreeMap<u64, f64> {
    let mut buckets: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for point in series {
        let entry = buckets.entry(point.timestamp / STEP_SECS).or_insert((0.0, 0));
        entry.0 += point.value;
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(hour, (sum, count))| (hour, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warpgrid_state::{PredictionModel, PredictionSettings, Weekday};

    use crate::strategy::StrategyRegistry;

    /// Three days of hourly samples: 80 during 09-17, 20 otherwise.
    fn daily_cycle(days: u64) -> Vec<MetricDataPoint> {
        (0..days * 24)
            .map(|h| MetricDataPoint {
                timestamp: h * STEP_SECS,
                value: if (9..17).contains(&(h % 24)) { 80.0 } else { 20.0 },
            })
            .collect()
    }

    #[test]
    fn declines_less_than_two_seasons() {
        let s = SeasonalDecomposition::default();
        assert!(s.forecast("cpu", 24, &daily_cycle(1), 0).is_none());
    }

    #[test]
    fn projects_daily_shape() {
        let series = daily_cycle(3);
        let now = 3 * 24 * STEP_SECS - STEP_SECS; // last sample hour
        let p = SeasonalDecomposition::default().forecast("cpu", 24, &series, now).unwrap();
        assert_eq!(p.predictions.len(), 24);

        let at = |hour_of_day: u64| {
            p.predictions
                .iter()
                .find(|x| (x.timestamp / STEP_SECS) % 24 == hour_of_day)
                .unwrap()
                .value
        };
        assert!(at(12) > at(3) + 40.0, "business hours should stay high");
        assert!((at(12) - 80.0).abs() < 5.0);
        assert!((at(3) - 20.0).abs() < 5.0);
    }

    #[test]
    fn bounds_hold_after_reseasoning() {
        let series = daily_cycle(4);
        let p = SeasonalDecomposition::default().forecast("cpu", 48, &series, 0).unwrap();
        for point in &p.predictions {
            assert!(0.0 <= point.lower_bound);
            assert!(point.lower_bound <= point.value);
            assert!(point.value <= point.upper_bound);
        }
    }

    /// Three weeks of hourly samples: 60 on weekdays, 20 at weekends.
    fn weekly_cycle() -> Vec<MetricDataPoint> {
        (0..3 * 168)
            .map(|h| {
                let timestamp = h * STEP_SECS;
                let weekend = Weekday::of_timestamp(timestamp).is_weekend();
                MetricDataPoint {
                    timestamp,
                    value: if weekend { 20.0 } else { 60.0 },
                }
            })
            .collect()
    }

    #[test]
    fn weekly_season_keeps_weekend_dip() {
        let series = weekly_cycle();
        let now = series.last().unwrap().timestamp;
        let settings = PredictionSettings {
            model: PredictionModel::SeasonalDecomposition,
            season_hours: 168,
            ..PredictionSettings::default()
        };
        let p = StrategyRegistry::default().forecast(&settings, "cpu", 168, &series, now);
        assert_eq!(p.predictions.len(), 168);

        let (weekend, weekday): (Vec<&warpgrid_state::PredictionPoint>, Vec<&warpgrid_state::PredictionPoint>) = p
            .predictions
            .iter()
            .partition(|x| Weekday::of_timestamp(x.timestamp).is_weekend());
        assert_eq!(weekend.len(), 48);
        assert!(weekend.iter().all(|x| (x.value - 20.0).abs() < 1.0));
        assert!(weekday.iter().all(|x| (x.value - 60.0).abs() < 1.0));
    }

    #[test]
    fn zero_season_keeps_configured_period() {
        let series = daily_cycle(3);
        let now = 3 * 24 * STEP_SECS - STEP_SECS;
        let s = SeasonalDecomposition::default();
        assert_eq!(
            s.forecast_with_season("cpu", 24, &series, now, 0),
            s.forecast("cpu", 24, &series, now)
        );
    }

    #[test]
    fn hourly_means_fold_samples() {
        let series = vec![
            MetricDataPoint { timestamp: 0, value: 10.0 },
            MetricDataPoint { timestamp: 1800, value: 30.0 },
            MetricDataPoint { timestamp: 3600, value: 5.0 },
        ];
        let hourly = hourly_means(&series);
        assert_eq!(hourly[&0], 20.0);
        assert_eq!(hourly[&1], 5.0);
    }
}
