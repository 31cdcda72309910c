//! StateStore — redb-backed persistence for the autoscaling engine.
//!
//! Provides typed operations over resources, telemetry, scaling events,
//! and scaling configurations. All values are JSON-serialized into redb's
//! `&[u8]` value columns. The store supports both on-disk and in-memory
//! backends (the latter for testing), and implements the storage-backed
//! collaborator traits from [`crate::sources`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::sources::*;
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        txn.open_table(TELEMETRY).map_err(map_err!(Table))?;
        txn.open_table(EVENTS).map_err(map_err!(Table))?;
        txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Resources ──────────────────────────────────────────────────

    /// Insert or update a resource record.
    pub fn put_resource(&self, resource: &ResourceInfo) -> StateResult<()> {
        let key = resource.table_key();
        let value = serde_json::to_vec(resource).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, kind = %resource.kind, "resource stored");
        Ok(())
    }

    /// Get a resource by ID.
    pub fn get_resource(&self, resource_id: &str) -> StateResult<Option<ResourceInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        match table.get(resource_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let resource: ResourceInfo =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(resource))
            }
            None => Ok(None),
        }
    }

    /// List all resources.
    pub fn list_resources(&self) -> StateResult<Vec<ResourceInfo>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let resource: ResourceInfo =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(resource);
        }
        Ok(results)
    }

    /// Record a new live capacity for a resource.
    pub fn set_capacity(&self, resource_id: &str, instances: u32) -> StateResult<()> {
        let mut resource = self
            .get_resource(resource_id)?
            .ok_or_else(|| StateError::NotFound(resource_id.to_string()))?;
        resource.current_instances = instances;
        self.put_resource(&resource)
    }

    /// Delete a resource by ID. Returns true if it existed.
    pub fn delete_resource(&self, resource_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RESOURCES).map_err(map_err!(Table))?;
            existed = table.remove(resource_id).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%resource_id, existed, "resource deleted");
        Ok(existed)
    }

    // ── Telemetry ──────────────────────────────────────────────────

    /// Insert telemetry points for one metric in a single transaction.
    ///
    /// A point with an already-stored timestamp replaces the old value.
    pub fn put_metric_points(
        &self,
        resource_id: &str,
        metric: &str,
        points: &[MetricDataPoint],
    ) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TELEMETRY).map_err(map_err!(Table))?;
            for point in points {
                let value = serde_json::to_vec(point).map_err(map_err!(Serialize))?;
                table
                    .insert((resource_id, metric, point.timestamp), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%resource_id, %metric, count = points.len(), "telemetry stored");
        Ok(points.len())
    }

    /// Telemetry points for one metric with `start <= timestamp <= end`, oldest first.
    pub fn list_metric_points(
        &self,
        resource_id: &str,
        metric: &str,
        start: u64,
        end: u64,
    ) -> StateResult<Vec<MetricDataPoint>> {
        if start > end {
            return Err(StateError::InvalidRange { start, end });
        }
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TELEMETRY).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range((resource_id, metric, start)..=(resource_id, metric, end))
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let point: MetricDataPoint =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(point);
        }
        Ok(results)
    }

    // ── Events ─────────────────────────────────────────────────────

    /// Append a scaling event. Returns its sequence number.
    ///
    /// Sequence numbers are store-wide and strictly increasing, so a
    /// resource's events read back in the order they were appended.
    pub fn append_event(&self, event: &ScalingEvent) -> StateResult<u64> {
        let value = serde_json::to_vec(event).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let seq;
        {
            let mut counters = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            seq = counters
                .get(EVENT_SEQUENCE)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value())
                .unwrap_or(0);
            counters
                .insert(EVENT_SEQUENCE, seq + 1)
                .map_err(map_err!(Write))?;

            let mut table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
            table
                .insert((event.resource_id.as_str(), seq), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            resource = %event.resource_id,
            seq,
            action = %event.action,
            success = event.success,
            "scaling event appended"
        );
        Ok(seq)
    }

    /// Events for a resource with `start <= timestamp <= end`, in append order.
    pub fn list_events(
        &self,
        resource_id: &str,
        start: u64,
        end: u64,
    ) -> StateResult<Vec<ScalingEvent>> {
        if start > end {
            return Err(StateError::InvalidRange { start, end });
        }
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EVENTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range((resource_id, 0u64)..=(resource_id, u64::MAX))
            .map_err(map_err!(Read))?
        {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let event: ScalingEvent =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if event.timestamp >= start && event.timestamp <= end {
                results.push(event);
            }
        }
        Ok(results)
    }

    // ── Configurations ─────────────────────────────────────────────

    /// Store a scaling configuration, replacing any previous one.
    pub fn put_configuration(&self, config: &ScalingConfiguration) -> StateResult<()> {
        let value = serde_json::to_vec(config).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
            table
                .insert(config.resource_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(resource = %config.resource_id, strategy = ?config.strategy, "configuration stored");
        Ok(())
    }

    /// Get the stored configuration for a resource.
    pub fn get_configuration(&self, resource_id: &str) -> StateResult<Option<ScalingConfiguration>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(CONFIGURATIONS).map_err(map_err!(Table))?;
        match table.get(resource_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let config: ScalingConfiguration =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(config))
            }
            None => Ok(None),
        }
    }
}

// ── Collaborator implementations ───────────────────────────────────

impl TelemetrySource for StateStore {
    fn get_metrics<'a>(
        &'a self,
        resource_id: &'a str,
        metric: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<Vec<MetricDataPoint>>> {
        Box::pin(async move { Ok(self.list_metric_points(resource_id, metric, start, end)?) })
    }
}

impl ResourceDirectory for StateStore {
    fn get_resource<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<ResourceInfo>>> {
        Box::pin(async move { Ok(StateStore::get_resource(self, resource_id)?) })
    }

    fn list_resources(&self) -> BoxFuture<'_, anyhow::Result<Vec<ResourceInfo>>> {
        Box::pin(async move { Ok(StateStore::list_resources(self)?) })
    }
}

impl EventStore for StateStore {
    fn append<'a>(&'a self, event: &'a ScalingEvent) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.append_event(event)?;
            Ok(())
        })
    }

    fn query<'a>(
        &'a self,
        resource_id: &'a str,
        start: u64,
        end: u64,
    ) -> BoxFuture<'a, anyhow::Result<Vec<ScalingEvent>>> {
        Box::pin(async move { Ok(self.list_events(resource_id, start, end)?) })
    }
}

impl ConfigurationSource for StateStore {
    fn get_configuration<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> BoxFuture<'a, anyhow::Result<Option<ScalingConfiguration>>> {
        Box::pin(async move { Ok(StateStore::get_configuration(self, resource_id)?) })
    }
}

/// Group points by metric name, e.g. for bulk ingestion from a file.
pub fn group_by_metric(
    rows: impl IntoIterator<Item = (String, MetricDataPoint)>,
) -> BTreeMap<String, Vec<MetricDataPoint>> {
    let mut grouped: BTreeMap<String, Vec<MetricDataPoint>> = BTreeMap::new();
    for (metric, point) in rows {
        grouped.entry(metric).or_default().push(point);
    }
    grouped
}
