//! redb table definitions for the autoscaling state store.
//!
//! Values are `&[u8]` (JSON-serialized domain types), except `COUNTERS`
//! which holds plain integers. Per-resource series use tuple keys, which
//! redb orders element by element, so a resource's range never reaches
//! into another resource whose id shares a prefix.

use redb::TableDefinition;

/// Resource directory keyed by `{resource_id}`.
pub const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");

/// Telemetry points keyed by `(resource_id, metric, timestamp)`.
pub const TELEMETRY: TableDefinition<(&str, &str, u64), &[u8]> = TableDefinition::new("telemetry");

/// Scaling events keyed by `(resource_id, sequence)`.
pub const EVENTS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("events");

/// Scaling configurations keyed by `{resource_id}`.
pub const CONFIGURATIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("configurations");

/// Monotonic counters keyed by name.
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter holding the next event sequence number.
pub const EVENT_SEQUENCE: &str = "event_sequence";
