//! Capacity actuators, registered by resource kind.
//!
//! Adding a resource kind means registering another [`Actuator`]; the
//! executor never switches on kind strings.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use warpgrid_state::{
    BoxFuture, KIND_CONTAINER_CLUSTER, KIND_HOSTING_PLAN, KIND_VM_SCALE_SET, ResourceInfo,
    StateStore,
};

/// Changes the capacity of one kind of resource.
pub trait Actuator: Send + Sync {
    /// Set `resource` to `target_instances`. `Ok(false)` means the platform
    /// refused the change.
    fn set_capacity<'a>(
        &'a self,
        resource: &'a ResourceInfo,
        target_instances: u32,
    ) -> BoxFuture<'a, anyhow::Result<bool>>;
}

/// Actuators keyed by resource kind.
#[derive(Clone, Default)]
pub struct ActuatorRegistry {
    actuators: HashMap<String, Arc<dyn Actuator>>,
}

impl ActuatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a [`CapacityRecorder`] for every built-in kind.
    pub fn recording(store: StateStore) -> Self {
        let recorder: Arc<dyn Actuator> = Arc::new(CapacityRecorder::new(store));
        Self::new()
            .register(KIND_VM_SCALE_SET, recorder.clone())
            .register(KIND_HOSTING_PLAN, recorder.clone())
            .register(KIND_CONTAINER_CLUSTER, recorder)
    }

    pub fn register(mut self, kind: &str, actuator: Arc<dyn Actuator>) -> Self {
        self.actuators.insert(kind.to_string(), actuator);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Actuator>> {
        self.actuators.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.actuators.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

/// Records the new capacity in the state store's resource directory.
///
/// Stands in for a cloud control plane: the directory is the source of
/// truth for current capacity, so recording there is the actuation.
pub struct CapacityRecorder {
    store: StateStore,
}

impl CapacityRecorder {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }
}

impl Actuator for CapacityRecorder {
    fn set_capacity<'a>(
        &'a self,
        resource: &'a ResourceInfo,
        target_instances: u32,
    ) -> BoxFuture<'a, anyhow::Result<bool>> {
        Box::pin(async move {
            self.store.set_capacity(&resource.id, target_instances)?;
            info!(
                resource = %resource.id,
                kind = %resource.kind,
                from = resource.current_instances,
                to = target_instances,
                "capacity recorded"
            );
            Ok(true)
        })
    }
}
