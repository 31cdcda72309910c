//! Policy guard: applies a resource's scaling configuration to a raw decision.
//!
//! Enforcement order: enabled flag, maintenance windows, cooldown,
//! stabilization, hourly rate caps, step limits, and finally the
//! `[minimum_instances, maximum_instances]` clamp. Every adjustment appends
//! a sentence to the reasoning so an operator can see why the raw decision
//! was changed.

use warpgrid_state::{ScalingAction, ScalingConfiguration, ScalingEvent};

use crate::decision::ScalingAnalysis;

/// Window used for the hourly rate caps.
const RATE_WINDOW_SECS: u64 = 3600;

/// Inputs the guard needs besides the raw decision.
pub struct PolicyContext<'a> {
    pub config: &'a ScalingConfiguration,
    /// Recent events for the resource, any order.
    pub recent_events: &'a [ScalingEvent],
    pub now: u64,
}

impl PolicyContext<'_> {
    /// How far back the guard needs event history.
    pub fn lookback_secs(config: &ScalingConfiguration) -> u64 {
        let cooldown = config.thresholds.cooldown_minutes as u64 * 60;
        let stabilization = config.thresholds.stabilization_window_minutes as u64 * 60;
        RATE_WINDOW_SECS.max(cooldown).max(stabilization)
    }

    fn successful_within(&self, secs: u64) -> impl Iterator<Item = &ScalingEvent> {
        let since = self.now.saturating_sub(secs);
        self.recent_events
            .iter()
            .filter(move |e| e.success && e.action != ScalingAction::None && e.timestamp > since)
    }
}

/// Apply the configured policy to a raw decision for `current_instances`.
pub fn apply_policy(
    mut analysis: ScalingAnalysis,
    current_instances: u32,
    ctx: &PolicyContext<'_>,
) -> ScalingAnalysis {
    let config = ctx.config;
    let constraints = &config.constraints;

    if !config.is_enabled {
        return hold(analysis, current_instances, "Autoscaling is disabled for this resource.");
    }

    if let Some(window) = constraints
        .maintenance_windows
        .iter()
        .find(|w| w.contains(ctx.now))
    {
        let note = format!(
            "Inside the {:?} {:02}:00-{:02}:00 UTC maintenance window; no change.",
            window.day, window.start_hour, window.end_hour
        );
        return hold(analysis, current_instances, &note);
    }

    let cooldown_secs = config.thresholds.cooldown_minutes as u64 * 60;
    if matches!(analysis.action, ScalingAction::ScaleUp | ScalingAction::ScaleDown)
        && cooldown_secs > 0
        && ctx.successful_within(cooldown_secs).next().is_some()
    {
        let note = format!(
            "Cooldown of {} minutes active after a recent scaling event.",
            config.thresholds.cooldown_minutes
        );
        return hold(analysis, current_instances, &note);
    }

    let stabilization_secs = config.thresholds.stabilization_window_minutes as u64 * 60;
    if analysis.action == ScalingAction::ScaleDown
        && stabilization_secs > 0
        && ctx
            .successful_within(stabilization_secs)
            .any(|e| e.action.is_upward())
    {
        let note = format!(
            "Scale-down held: capacity was raised within the {}-minute stabilization window.",
            config.thresholds.stabilization_window_minutes
        );
        return hold(analysis, current_instances, &note);
    }

    match analysis.action {
        ScalingAction::ScaleUp => {
            let ups = ctx
                .successful_within(RATE_WINDOW_SECS)
                .filter(|e| e.action.is_upward())
                .count() as u32;
            if ups >= constraints.max_scale_up_per_hour {
                let note = format!(
                    "Hourly scale-up limit of {} reached.",
                    constraints.max_scale_up_per_hour
                );
                return hold(analysis, current_instances, &note);
            }
        }
        ScalingAction::ScaleDown => {
            let downs = ctx
                .successful_within(RATE_WINDOW_SECS)
                .filter(|e| e.action == ScalingAction::ScaleDown)
                .count() as u32;
            if downs >= constraints.max_scale_down_per_hour {
                let note = format!(
                    "Hourly scale-down limit of {} reached.",
                    constraints.max_scale_down_per_hour
                );
                return hold(analysis, current_instances, &note);
            }
        }
        ScalingAction::EmergencyScale | ScalingAction::None => {}
    }

    let raw = analysis.recommended_instances;
    let (target, step) = match analysis.action {
        ScalingAction::ScaleUp => {
            let step = constraints.scale_up_step.max(1);
            (raw.min(current_instances.saturating_add(step)), step)
        }
        ScalingAction::ScaleDown => {
            let step = constraints.scale_down_step.max(1);
            (raw.max(current_instances.saturating_sub(step)), step)
        }
        ScalingAction::EmergencyScale | ScalingAction::None => (raw, 0),
    };
    if target != raw {
        append(
            &mut analysis.reasoning,
            &format!("Limited to a step of {step} instance(s): {raw} -> {target}."),
        );
    }

    let min = constraints.minimum_instances;
    let max = constraints.maximum_instances.max(min);
    let clamped = target.clamp(min, max);
    if clamped != target {
        append(
            &mut analysis.reasoning,
            &format!("Clamped to the configured range [{min}, {max}]: {target} -> {clamped}."),
        );
    }
    analysis.recommended_instances = clamped;

    if clamped == current_instances {
        if analysis.action != ScalingAction::None {
            append(
                &mut analysis.reasoning,
                &format!("Constrained target equals current capacity; holding at {current_instances}."),
            );
        }
        analysis.action = ScalingAction::None;
    } else if analysis.action == ScalingAction::None
        || analysis.action.is_upward() != (clamped > current_instances)
    {
        // The clamp itself moved capacity back into range.
        analysis.action = if clamped > current_instances {
            ScalingAction::ScaleUp
        } else {
            ScalingAction::ScaleDown
        };
    }

    analysis
}

fn hold(mut analysis: ScalingAnalysis, current_instances: u32, note: &str) -> ScalingAnalysis {
    analysis.action = ScalingAction::None;
    analysis.recommended_instances = current_instances;
    append(&mut analysis.reasoning, note);
    analysis
}

fn append(reasoning: &mut String, sentence: &str) {
    if !reasoning.is_empty() {
        reasoning.push(' ');
    }
    reasoning.push_str(sentence);
}
