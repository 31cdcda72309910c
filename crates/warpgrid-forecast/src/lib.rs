//! warpgrid-forecast — metric forecasting for predictive autoscaling.
//!
//! Turns a resource's historical telemetry into bounded per-metric
//! projections. Forecasting methods are pluggable [`ForecastStrategy`]
//! implementations selected per resource through
//! `ScalingConfiguration.prediction_settings.model`; the linear trend is the
//! guaranteed fallback.
//!
//! # Architecture
//!
//! ```text
//! Forecaster
//!   ├── TelemetrySource (history per metric, bounded by a fetch timeout)
//!   ├── one task per metric (failures isolated, skipped metrics logged)
//!   └── StrategyRegistry
//!       ├── TrendExtrapolation    → LinearTrend (fallback)
//!       ├── Smoothing             → ExponentialSmoothing
//!       └── SeasonalDecomposition → SeasonalDecomposition (`season_hours`, daily by default)
//! ```

pub mod error;
pub mod forecaster;
pub mod linear;
pub mod seasonal;
pub mod smoothing;
pub mod strategy;

pub use error::{ForecastError, ForecastResult};
pub use forecaster::Forecaster;
pub use linear::LinearTrend;
pub use seasonal::SeasonalDecomposition;
pub use smoothing::ExponentialSmoothing;
pub use strategy::{ForecastStrategy, StrategyRegistry, STEP_SECS};
