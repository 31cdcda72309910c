//! warpgrid-autoscale — predictive, policy-guarded instance scaling.
//!
//! Forecasts each resource's load, decides whether capacity should change,
//! applies the resource's scaling policy, and executes the result through
//! an actuator registered for the resource's kind.
//!
//! # Pipeline
//!
//! ```text
//! Forecaster ──► decide() ──► apply_policy() ──► ScalingRecommendation
//!   (per metric)   (pure)      (cooldown, steps,        │
//!                              windows, min/max)        ▼
//!                                              Executor::apply()
//!                                                ├── KeyedLock (per resource)
//!                                                ├── ActuatorRegistry (by kind)
//!                                                └── EventStore (audit trail)
//! ```
//!
//! Decisions look at the first horizon step of the primary CPU metric:
//! an upper bound past `emergency_threshold + 5` is an emergency, past
//! `scale_up_threshold + 10` a scale-up toward `scale_up_threshold`; an
//! average below `scale_down_threshold` scales down toward
//! `scale_down_threshold + 20`.

pub mod actuator;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod lock;
pub mod policy;
pub mod scaler;
pub mod schedule;

pub use actuator::{Actuator, ActuatorRegistry, CapacityRecorder};
pub use config::EngineConfig;
pub use decision::{DecisionError, ScalingAnalysis, decide};
pub use error::{AutoscaleError, AutoscaleResult};
pub use executor::Executor;
pub use lock::KeyedLock;
pub use policy::{PolicyContext, apply_policy};
pub use scaler::{EvaluationOutcome, PredictiveAutoscaler};
pub use schedule::due_schedules;
