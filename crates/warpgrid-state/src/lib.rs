//! warpgrid-state — data model and embedded state for predictive autoscaling.
//!
//! Holds the domain types shared by every component (telemetry points,
//! forecasts, recommendations, scaling events, scaling configurations),
//! the collaborator traits the engine consumes, the cancellation signal,
//! and a [redb](https://docs.rs/redb)-backed store that implements the
//! storage-side collaborators.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{resource}:{metric}:{timestamp}`, `{resource}:{seq}`)
//! keep related records contiguous so range scans stay cheap.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod cancel;
pub mod error;
pub mod sources;
pub mod store;
pub mod tables;
pub mod types;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{StateError, StateResult};
pub use sources::*;
pub use store::StateStore;
pub use types::*;
