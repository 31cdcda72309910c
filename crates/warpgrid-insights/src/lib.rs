//! warpgrid-insights — how well scaling performs, and how to tune it.
//!
//! - [`PatternMiner`] characterizes long-range load (daily/weekly
//!   seasonality, peak and quiet hours, growth).
//! - [`ConfigurationOptimizer`] turns a usage pattern into a complete
//!   scaling configuration, including calendar schedules.
//! - [`PerformanceAnalyzer`] builds a scorecard from the audit trail and
//!   the utilization, cost, and accuracy collaborators. It never fails;
//!   missing data reads as zero.
//!
//! [`ThresholdUtilization`], [`BacktestAccuracy`], and [`StaticCost`] are
//! store-backed implementations of those collaborators.

pub mod accuracy;
pub mod cost;
pub mod error;
pub mod optimizer;
pub mod patterns;
pub mod performance;
pub mod utilization;

pub use accuracy::BacktestAccuracy;
pub use cost::StaticCost;
pub use error::{InsightsError, InsightsResult};
pub use optimizer::{ConfigurationOptimizer, derive_configuration};
pub use patterns::{PatternMiner, analyze_series};
pub use performance::PerformanceAnalyzer;
pub use utilization::ThresholdUtilization;
