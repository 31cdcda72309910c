//! Recommendation executor.
//!
//! Applies a recommendation through the actuator registered for the
//! resource's kind and records every attempt in the event store. Calls for
//! the same resource are serialized; the lock is held from before the
//! actuator call until after the audit event is appended.
//!
//! There is no automatic retry. A capacity change that failed is reported
//! back to the caller, who decides whether to re-invoke.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, info, warn};

use warpgrid_state::{CancelSignal, EventStore, ResourceDirectory, ScalingAction, ScalingEvent, ScalingRecommendation};

use crate::actuator::ActuatorRegistry;
use crate::error::{AutoscaleError, AutoscaleResult};
use crate::lock::KeyedLock;

/// Default bound on a single actuator call.
pub const DEFAULT_ACTUATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Trigger recorded for recommendations produced by the forecaster.
pub const TRIGGER_PREDICTIVE: &str = "predictive";

/// Executes scaling recommendations.
pub struct Executor {
    directory: Arc<dyn ResourceDirectory>,
    events: Arc<dyn EventStore>,
    actuators: ActuatorRegistry,
    locks: KeyedLock,
    actuator_timeout: Duration,
}

impl Executor {
    pub fn new(
        directory: Arc<dyn ResourceDirectory>,
        events: Arc<dyn EventStore>,
        actuators: ActuatorRegistry,
    ) -> Self {
        Self {
            directory,
            events,
            actuators,
            locks: KeyedLock::new(),
            actuator_timeout: DEFAULT_ACTUATOR_TIMEOUT,
        }
    }

    pub fn with_actuator_timeout(mut self, timeout: Duration) -> Self {
        self.actuator_timeout = timeout;
        self
    }

    /// Apply a predictive recommendation.
    ///
    /// `Ok(true)` means applied (or nothing to do), `Ok(false)` means the
    /// attempt failed and a failure event was recorded.
    pub async fn apply(
        &self,
        rec: &mut ScalingRecommendation,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<bool> {
        self.apply_with_trigger(rec, TRIGGER_PREDICTIVE, cancel).await
    }

    /// Apply a recommendation, recording `trigger` on its audit event.
    pub async fn apply_with_trigger(
        &self,
        rec: &mut ScalingRecommendation,
        trigger: &str,
        cancel: &CancelSignal,
    ) -> AutoscaleResult<bool> {
        if rec.action == ScalingAction::None {
            debug!(resource = %rec.resource_id, recommendation = %rec.id, "nothing to apply");
            return Ok(true);
        }
        if rec.execution_time.is_some() {
            debug!(resource = %rec.resource_id, recommendation = %rec.id, "recommendation already applied");
            return Ok(true);
        }
        if cancel.is_cancelled() {
            return Err(AutoscaleError::Cancelled(rec.resource_id.clone()));
        }

        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AutoscaleError::Cancelled(rec.resource_id.clone())),
            guard = self.locks.lock(&rec.resource_id) => guard,
        };

        let resource = match self.directory.get_resource(&rec.resource_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                warn!(resource = %rec.resource_id, "cannot apply: resource not found");
                self.record(rec, trigger, Some("resource not found".to_string())).await;
                return Ok(false);
            }
            Err(e) => {
                warn!(resource = %rec.resource_id, error = %e, "cannot apply: resource lookup failed");
                self.record(rec, trigger, Some(format!("resource lookup failed: {e}"))).await;
                return Ok(false);
            }
        };

        let Some(actuator) = self.actuators.get(&resource.kind) else {
            warn!(resource = %rec.resource_id, kind = %resource.kind, "no actuator for resource kind");
            self.record(rec, trigger, Some(format!("unsupported resource kind: {}", resource.kind)))
                .await;
            return Ok(false);
        };

        if cancel.is_cancelled() {
            return Err(AutoscaleError::Cancelled(rec.resource_id.clone()));
        }

        info!(
            resource = %rec.resource_id,
            action = %rec.action,
            from = rec.current_instances,
            to = rec.recommended_instances,
            %trigger,
            "applying scaling recommendation"
        );

        let call = tokio::time::timeout(
            self.actuator_timeout,
            actuator.set_capacity(&resource, rec.recommended_instances),
        );
        let outcome = tokio::select! {
            biased;
            outcome = call => outcome,
            _ = cancel.cancelled() => {
                warn!(resource = %rec.resource_id, "cancelled while the actuator call was in flight");
                self.record(
                    rec,
                    trigger,
                    Some("outcome unknown: cancelled after the actuator call was issued".to_string()),
                )
                .await;
                return Err(AutoscaleError::OutcomeUnknown(rec.resource_id.clone()));
            }
        };

        let failure = match outcome {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some("actuator reported failure".to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!("timeout after {}s", self.actuator_timeout.as_secs())),
        };

        match failure {
            None => {
                rec.execution_time = Some(epoch_secs());
                self.record(rec, trigger, None).await;
                info!(
                    resource = %rec.resource_id,
                    instances = rec.recommended_instances,
                    "scaling applied"
                );
                Ok(true)
            }
            Some(message) => {
                warn!(resource = %rec.resource_id, error = %message, "scaling failed");
                self.record(rec, trigger, Some(message)).await;
                Ok(false)
            }
        }
    }

    /// Append the audit event for an attempt. A failed append is logged;
    /// it never changes the result of the attempt.
    async fn record(&self, rec: &ScalingRecommendation, trigger: &str, error_message: Option<String>) {
        let event = ScalingEvent {
            resource_id: rec.resource_id.clone(),
            action: rec.action,
            from_instances: rec.current_instances,
            to_instances: rec.recommended_instances,
            trigger: trigger.to_string(),
            success: error_message.is_none(),
            error_message,
            triggered_at: rec.created_at,
            timestamp: epoch_secs(),
        };
        if let Err(e) = self.events.append(&event).await {
            error!(
                resource = %rec.resource_id,
                success = event.success,
                error = %e,
                "failed to record scaling event"
            );
        }
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
