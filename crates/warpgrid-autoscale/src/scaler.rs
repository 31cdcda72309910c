//! Predictive autoscaler: forecast, decide, guard, and apply.
//!
//! `generate_prediction` forecasts a resource's metrics, runs the scaling
//! decision on the primary metric, and applies the resource's policy. The
//! resulting recommendation is returned, not executed; `apply_recommendation`
//! hands it to the executor. `run` drives both for every resource on a timer
//! and also fires calendar schedules.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use warpgrid_forecast::Forecaster;
use warpgrid_state::{
    CancelSignal, ConfigurationSource, EventStore, MetricPrediction, PredictionSettings,
    ResourceDirectory, ResourceInfo, ScalingAction, ScalingConfiguration, ScalingRecommendation,
    default_metrics_for_kind,
};

use crate::decision::{ScalingAnalysis, decide};
use crate::error::{AutoscaleError, AutoscaleResult};
use crate::executor::{Executor, epoch_secs};
use crate::policy::{PolicyContext, apply_policy};
use crate::schedule::due_schedules;

/// Trigger recorded for recommendations produced by a calendar schedule.
pub const TRIGGER_SCHEDULE: &str = "schedule";

/// Outcome of one evaluation of one resource.
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub recommendation: ScalingRecommendation,
    /// Whether the executor reported success (no-ops count as success).
    pub applied: bool,
}

/// The predictive autoscaling engine.
pub struct PredictiveAutoscaler {
    directory: Arc<dyn ResourceDirectory>,
    configs: Arc<dyn ConfigurationSource>,
    events: Arc<dyn EventStore>,
    forecaster: Forecaster,
    executor: Executor,
    sequence: AtomicU64,
}

impl PredictiveAutoscaler {
    pub fn new(
        directory: Arc<dyn ResourceDirectory>,
        configs: Arc<dyn ConfigurationSource>,
        events: Arc<dyn EventStore>,
        forecaster: Forecaster,
        executor: Executor,
    ) -> Self {
        Self {
            directory,
            configs,
            events,
            forecaster,
            executor,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn forecaster(&self) -> &Forecaster {
        &self.forecaster
    }

    /// Forecast `metric_names` for a resource using its configured model.
    pub async fn predict_metrics(
        &self,
        resource_id: &str,
        metric_names: &[String],
        horizon_hours: u32,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<Vec<MetricPrediction>> {
        let settings = match self.configs.get_configuration(resource_id).await {
            Ok(Some(config)) => config.prediction_settings,
            Ok(None) => PredictionSettings::default(),
            Err(e) => {
                warn!(resource = %resource_id, error = %e, "configuration lookup failed, using default model");
                PredictionSettings::default()
            }
        };
        Ok(self
            .forecaster
            .predict(resource_id, metric_names, horizon_hours, &settings, cancel)
            .await?)
    }

    /// Produce a recommendation for `resource_id` targeting `target_time`.
    pub async fn generate_prediction(
        &self,
        resource_id: &str,
        target_time: u64,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<ScalingRecommendation> {
        self.generate_prediction_at(resource_id, target_time, epoch_secs(), cancel)
            .await
    }

    /// [`generate_prediction`](Self::generate_prediction) as of `now`.
    pub async fn generate_prediction_at(
        &self,
        resource_id: &str,
        target_time: u64,
        now: u64,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<ScalingRecommendation> {
        let resource = self.resource(resource_id).await?;
        let config = self.configuration(&resource).await?;

        let mut metrics = config.metrics.all();
        if metrics.is_empty() {
            let (primary, secondary) = default_metrics_for_kind(&resource.kind);
            metrics = primary.into_iter().chain(secondary).collect();
        }
        let horizon = horizon_hours(target_time, now);

        let predictions = self
            .forecaster
            .predict_at(
                resource_id,
                &metrics,
                horizon,
                &config.prediction_settings,
                now,
                cancel,
            )
            .await?;

        let raw = decide(&predictions, resource.current_instances, &config.thresholds)?;
        debug!(
            resource = %resource_id,
            action = %raw.action,
            recommended = raw.recommended_instances,
            "raw scaling decision"
        );

        let since = now.saturating_sub(PolicyContext::lookback_secs(&config));
        let recent_events = self
            .events
            .query(resource_id, since, now)
            .await
            .map_err(AutoscaleError::Collaborator)?;
        let ctx = PolicyContext {
            config: &config,
            recent_events: &recent_events,
            now,
        };
        let analysis = apply_policy(raw, resource.current_instances, &ctx);

        let rec = self.recommendation(&resource, analysis, target_time, now, predictions);
        info!(
            resource = %resource_id,
            recommendation = %rec.id,
            action = %rec.action,
            from = rec.current_instances,
            to = rec.recommended_instances,
            confidence = rec.confidence_score,
            "scaling recommendation generated"
        );
        Ok(rec)
    }

    /// Execute a recommendation. See [`Executor::apply`].
    pub async fn apply_recommendation(
        &self,
        rec: &mut ScalingRecommendation,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<bool> {
        self.executor.apply(rec, cancel).await
    }

    /// Fire the resource's schedules that fall due in `(from, to]`.
    ///
    /// Each due schedule becomes a recommendation pinning capacity at its
    /// target (clamped to the configured range) and is executed with the
    /// `schedule` trigger.
    pub async fn apply_schedules(
        &self,
        resource_id: &str,
        from: u64,
        to: u64,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<Vec<EvaluationOutcome>> {
        let Some(config) = self
            .configs
            .get_configuration(resource_id)
            .await
            .map_err(AutoscaleError::Collaborator)?
        else {
            return Ok(Vec::new());
        };
        if !config.is_enabled {
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        for schedule in due_schedules(&config.schedules, from, to) {
            let resource = self.resource(resource_id).await?;
            let min = config.constraints.minimum_instances;
            let target = schedule
                .target_instances
                .clamp(min, config.constraints.maximum_instances.max(min));
            let current = resource.current_instances;
            let action = if target > current {
                ScalingAction::ScaleUp
            } else if target < current {
                ScalingAction::ScaleDown
            } else {
                ScalingAction::None
            };
            let analysis = ScalingAnalysis {
                action,
                recommended_instances: target,
                predicted_load: 0.0,
                confidence: 1.0,
                reasoning: format!(
                    "Schedule '{}' ({}) pins capacity at {target} instances; currently {current}.",
                    schedule.name, schedule.cron
                ),
            };
            let mut rec = self.recommendation(&resource, analysis, to, to, Vec::new());
            let applied = self
                .executor
                .apply_with_trigger(&mut rec, TRIGGER_SCHEDULE, cancel)
                .await?;
            info!(
                resource = %resource_id,
                schedule = %schedule.name,
                to = target,
                applied,
                "schedule fired"
            );
            outcomes.push(EvaluationOutcome {
                recommendation: rec,
                applied,
            });
        }
        Ok(outcomes)
    }

    /// Generate and apply a one-hour-ahead recommendation for every resource.
    ///
    /// A failure for one resource is logged and does not stop the others.
    pub async fn evaluate_all(&self, cancel: &CancelSignal) -> AutoscaleResult<Vec<EvaluationOutcome>> {
        let resources = self
            .directory
            .list_resources()
            .await
            .map_err(AutoscaleError::Collaborator)?;
        let mut outcomes = Vec::new();

        for resource in &resources {
            if cancel.is_cancelled() {
                return Err(AutoscaleError::Cancelled(resource.id.clone()));
            }
            let now = epoch_secs();
            let mut rec = match self
                .generate_prediction_at(&resource.id, now + 3600, now, cancel)
                .await
            {
                Ok(rec) => rec,
                Err(e) => {
                    warn!(resource = %resource.id, error = %e, "prediction failed");
                    continue;
                }
            };
            match self.executor.apply(&mut rec, cancel).await {
                Ok(applied) => outcomes.push(EvaluationOutcome {
                    recommendation: rec,
                    applied,
                }),
                Err(e @ (AutoscaleError::Cancelled(_) | AutoscaleError::OutcomeUnknown(_))) => {
                    return Err(e);
                }
                Err(e) => warn!(resource = %resource.id, error = %e, "apply failed"),
            }
        }

        Ok(outcomes)
    }

    /// Run the autoscaler loop until `shutdown` flips to true.
    ///
    /// Each tick evaluates every resource and fires schedules that fell due
    /// since the previous tick.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "autoscaler started");
        let cancel = CancelSignal::from_receiver(shutdown.clone());
        let mut last_tick = epoch_secs();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let now = epoch_secs();
                    self.tick(last_tick, now, &cancel).await;
                    last_tick = now;
                }
                _ = shutdown.changed() => {
                    info!("autoscaler shutting down");
                    break;
                }
            }
        }
    }

    async fn tick(&self, from: u64, to: u64, cancel: &CancelSignal) {
        match self.evaluate_all(cancel).await {
            Ok(outcomes) => {
                let changed = outcomes
                    .iter()
                    .filter(|o| o.recommendation.action != ScalingAction::None)
                    .count();
                debug!(evaluated = outcomes.len(), changed, "autoscaler tick");
            }
            Err(e) => error!(error = %e, "autoscaler evaluation failed"),
        }

        let resources = match self.directory.list_resources().await {
            Ok(resources) => resources,
            Err(e) => {
                error!(error = %e, "cannot list resources for schedules");
                return;
            }
        };
        for resource in resources {
            if let Err(e) = self.apply_schedules(&resource.id, from, to, cancel).await {
                warn!(resource = %resource.id, error = %e, "schedule execution failed");
            }
        }
    }

    async fn resource(&self, resource_id: &str) -> AutoscaleResult<ResourceInfo> {
        self.directory
            .get_resource(resource_id)
            .await
            .map_err(AutoscaleError::Collaborator)?
            .ok_or_else(|| AutoscaleError::ResourceNotFound(resource_id.to_string()))
    }

    /// The stored configuration, or the baseline for the resource's kind.
    async fn configuration(&self, resource: &ResourceInfo) -> AutoscaleResult<ScalingConfiguration> {
        let stored = self
            .configs
            .get_configuration(&resource.id)
            .await
            .map_err(AutoscaleError::Collaborator)?;
        Ok(stored.unwrap_or_else(|| ScalingConfiguration::baseline(resource)))
    }

    fn recommendation(
        &self,
        resource: &ResourceInfo,
        analysis: ScalingAnalysis,
        prediction_time: u64,
        now: u64,
        metric_predictions: Vec<MetricPrediction>,
    ) -> ScalingRecommendation {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        ScalingRecommendation {
            id: format!("rec-{}-{now}-{seq}", resource.id),
            resource_id: resource.id.clone(),
            prediction_time,
            created_at: now,
            current_instances: resource.current_instances,
            recommended_instances: analysis.recommended_instances,
            action: analysis.action,
            predicted_load: analysis.predicted_load,
            confidence_score: analysis.confidence,
            reasoning: analysis.reasoning,
            metric_predictions,
            execution_time: None,
        }
    }
}

/// Whole hours from `now` to `target_time`, at least one.
pub fn horizon_hours(target_time: u64, now: u64) -> u32 {
    let secs = target_time.saturating_sub(now);
    (secs.div_ceil(3600).max(1)).min(u32::MAX as u64) as u32
}
