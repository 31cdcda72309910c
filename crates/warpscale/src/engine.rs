//! Wires the state store, forecaster, executor, and analyzers together.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use tracing::debug;

use warpgrid_autoscale::{ActuatorRegistry, EngineConfig, Executor, PredictiveAutoscaler};
use warpgrid_forecast::Forecaster;
use warpgrid_insights::{
    BacktestAccuracy, ConfigurationOptimizer, PatternMiner, PerformanceAnalyzer, StaticCost,
    ThresholdUtilization,
};
use warpgrid_state::StateStore;

pub const STORE_FILE: &str = "warpscale.redb";

/// Opened store plus the engine configuration.
pub struct Context {
    pub store: StateStore,
    pub config: EngineConfig,
}

impl Context {
    pub fn open(data_dir: &Path, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = EngineConfig::load(config_path)?;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        let path = data_dir.join(STORE_FILE);
        let store = StateStore::open(&path)
            .with_context(|| format!("failed to open state store {}", path.display()))?;
        debug!(path = %path.display(), "state store opened");
        Ok(Self { store, config })
    }

    pub fn forecaster(&self) -> Forecaster {
        Forecaster::new(Arc::new(self.store.clone()))
            .with_lookback_days(self.config.lookback_days())
            .with_fetch_timeout(self.config.fetch_timeout())
    }

    /// Autoscaler whose actuator records new capacity in the store.
    pub fn autoscaler(&self) -> PredictiveAutoscaler {
        let store = Arc::new(self.store.clone());
        let executor = Executor::new(
            store.clone(),
            store.clone(),
            ActuatorRegistry::recording(self.store.clone()),
        )
        .with_actuator_timeout(self.config.actuator_timeout());
        PredictiveAutoscaler::new(store.clone(), store.clone(), store, self.forecaster(), executor)
    }

    pub fn performance(&self) -> PerformanceAnalyzer {
        let store = Arc::new(self.store.clone());
        let mut analyzer = PerformanceAnalyzer::new(store.clone())
            .with_utilization(Arc::new(ThresholdUtilization::new(
                store.clone(),
                store.clone(),
                store.clone(),
            )))
            .with_accuracy(Arc::new(BacktestAccuracy::new(
                self.forecaster(),
                store.clone(),
                store.clone(),
                store,
            )));
        if let Some(cost) = self.config.cost() {
            analyzer = analyzer.with_cost(Arc::new(StaticCost::new(cost)));
        }
        analyzer
    }

    pub fn optimizer(&self) -> ConfigurationOptimizer {
        let store = Arc::new(self.store.clone());
        let miner = PatternMiner::new(store.clone()).with_lookback_days(self.config.lookback_days());
        ConfigurationOptimizer::new(store, Arc::new(miner))
            .with_max_instances(self.config.max_instances())
    }
}

pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
