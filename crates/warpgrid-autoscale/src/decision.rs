//! Scaling decision: turns forecasts into an action and a target capacity.
//!
//! The decision looks only at the primary (CPU-like) metric and only at the
//! first horizon step. Boundaries come from the configured thresholds:
//!
//! ```text
//! emergency boundary  = emergency_threshold + 5      (85 → 90)
//! scale-up boundary   = scale_up_threshold + 10      (70 → 80)
//! scale-up target     = scale_up_threshold           (70)
//! scale-down trigger  = scale_down_threshold         (30)
//! scale-down target   = scale_down_threshold + 20    (50)
//!
//! max_upper > emergency            → EmergencyScale, ceil(current · max / up_target)
//! max_upper > scale-up boundary    → ScaleUp,        ceil(current · max / up_target)
//! avg < down trigger, current > 1  → ScaleDown,      max(1, floor(current · avg / down_target))
//! otherwise                        → None
//! ```
//!
//! This module is pure: identical inputs always produce identical output.

use thiserror::Error;

use warpgrid_state::{MetricPrediction, ScalingAction, ScalingThresholds, is_cpu_metric};

/// Outcome of a scaling decision, before policy constraints are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingAnalysis {
    pub action: ScalingAction,
    pub recommended_instances: u32,
    /// Average predicted primary load for the first horizon step.
    pub predicted_load: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
}

impl ScalingAnalysis {
    /// Hold the current capacity.
    pub fn hold(current_instances: u32, predicted_load: f64, confidence: f64, reasoning: String) -> Self {
        Self {
            action: ScalingAction::None,
            recommended_instances: current_instances,
            predicted_load,
            confidence,
            reasoning,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum DecisionError {
    #[error("malformed prediction for {metric}: {reason}")]
    MalformedPrediction { metric: String, reason: String },
}

/// Utilization boundaries derived from a set of thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionBoundaries {
    pub emergency: f64,
    pub scale_up: f64,
    pub scale_up_target: f64,
    pub scale_down: f64,
    pub scale_down_target: f64,
}

impl From<&ScalingThresholds> for DecisionBoundaries {
    fn from(t: &ScalingThresholds) -> Self {
        Self {
            emergency: t.emergency_threshold + 5.0,
            scale_up: t.scale_up_threshold + 10.0,
            scale_up_target: t.scale_up_threshold,
            scale_down: t.scale_down_threshold,
            scale_down_target: t.scale_down_threshold + 20.0,
        }
    }
}

/// Decide how `current_instances` should change given the forecasts.
///
/// Returns `action = None` with `confidence = 0` when no CPU-like metric is
/// present. A primary forecast that cannot be trusted is an error, never a
/// guessed action. Scale-up targets are computed from at least one
/// instance, so a resource at zero instances can still scale up.
pub fn decide(
    predictions: &[MetricPrediction],
    current_instances: u32,
    thresholds: &ScalingThresholds,
) -> Result<ScalingAnalysis, DecisionError> {
    let Some(primary) = predictions.iter().find(|p| is_cpu_metric(&p.metric_name)) else {
        let names: Vec<&str> = predictions.iter().map(|p| p.metric_name.as_str()).collect();
        return Ok(ScalingAnalysis::hold(
            current_instances,
            0.0,
            0.0,
            format!(
                "No CPU metric among forecasts [{}]; insufficient signal to change capacity.",
                names.join(", ")
            ),
        ));
    };

    validate(primary)?;

    let first_ts = primary.predictions[0].timestamp;
    let step: Vec<_> = primary
        .predictions
        .iter()
        .filter(|p| p.timestamp == first_ts)
        .collect();
    let avg_predicted = step.iter().map(|p| p.value).sum::<f64>() / step.len() as f64;
    let max_predicted = step
        .iter()
        .map(|p| p.upper_bound)
        .fold(f64::NEG_INFINITY, f64::max);

    let confidence = confidence(primary);
    let bounds = DecisionBoundaries::from(thresholds);
    let metric = &primary.metric_name;

    if max_predicted > bounds.scale_up {
        let action = if max_predicted > bounds.emergency {
            ScalingAction::EmergencyScale
        } else {
            ScalingAction::ScaleUp
        };
        let recommended =
            (current_instances.max(1) as f64 * max_predicted / bounds.scale_up_target).ceil() as u32;
        let boundary = if action == ScalingAction::EmergencyScale {
            format!("emergency boundary of {:.1}%", bounds.emergency)
        } else {
            format!("scale-up boundary of {:.1}%", bounds.scale_up)
        };
        return Ok(ScalingAnalysis {
            action,
            recommended_instances: recommended,
            predicted_load: avg_predicted,
            confidence,
            reasoning: format!(
                "Predicted {metric} upper bound {max_predicted:.1}% (average {avg_predicted:.1}%) exceeds the {boundary}; \
                 {action}: {current_instances} -> {recommended} instances to bring load to {:.1}%.",
                bounds.scale_up_target
            ),
        });
    }

    if avg_predicted < bounds.scale_down && current_instances > 1 {
        let recommended =
            ((current_instances as f64 * avg_predicted / bounds.scale_down_target).floor() as u32).max(1);
        return Ok(ScalingAnalysis {
            action: ScalingAction::ScaleDown,
            recommended_instances: recommended,
            predicted_load: avg_predicted,
            confidence,
            reasoning: format!(
                "Predicted {metric} average {avg_predicted:.1}% is below {:.1}% (upper bound {max_predicted:.1}%); \
                 scale_down: {current_instances} -> {recommended} instances to bring load to {:.1}%.",
                bounds.scale_down, bounds.scale_down_target
            ),
        });
    }

    Ok(ScalingAnalysis::hold(
        current_instances,
        avg_predicted,
        confidence,
        format!(
            "Predicted {metric} average {avg_predicted:.1}% with upper bound {max_predicted:.1}% is within \
             [{:.1}%, {:.1}%]; holding at {current_instances} instances.",
            bounds.scale_down, bounds.scale_up
        ),
    ))
}

fn validate(primary: &MetricPrediction) -> Result<(), DecisionError> {
    let malformed = |reason: &str| DecisionError::MalformedPrediction {
        metric: primary.metric_name.clone(),
        reason: reason.to_string(),
    };
    if primary.predictions.is_empty() {
        return Err(malformed("no prediction points"));
    }
    for point in &primary.predictions {
        if !(point.value.is_finite() && point.lower_bound.is_finite() && point.upper_bound.is_finite()) {
            return Err(malformed("non-finite prediction value"));
        }
        if point.lower_bound > point.upper_bound {
            return Err(malformed("lower bound above upper bound"));
        }
    }
    if !primary.mean_absolute_error.is_finite() || primary.mean_absolute_error < 0.0 {
        return Err(malformed("invalid mean absolute error"));
    }
    Ok(())
}

fn confidence(primary: &MetricPrediction) -> f64 {
    let mae = primary.mean_absolute_error;
    if mae == 0.0 {
        return 1.0;
    }
    let avg = primary.predictions.iter().map(|p| p.value).sum::<f64>()
        / primary.predictions.len() as f64;
    if avg == 0.0 {
        return 0.5;
    }
    (1.0 - mae / avg).clamp(0.0, 1.0)
}
