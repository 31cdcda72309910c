//! Engine configuration parser (`warpscale.toml`).
//!
//! Every field is optional; accessors return the documented default.
//! Duration strings are validated when the file is parsed.
//!
//! ```toml
//! [forecast]
//! lookback_days = 30
//! fetch_timeout = "10s"
//!
//! [executor]
//! actuator_timeout = "2m"
//!
//! [limits.max_instances]
//! managed-container-cluster = 50
//!
//! [cost]
//! total_monthly_cost = 1200.0
//! potential_monthly_savings = 180.0
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use warpgrid_forecast::forecaster::{DEFAULT_FETCH_TIMEOUT, DEFAULT_LOOKBACK_DAYS};
use warpgrid_state::CostAnalysis;

use crate::executor::DEFAULT_ACTUATOR_TIMEOUT;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub forecast: Option<ForecastConfig>,
    pub executor: Option<ExecutorConfig>,
    pub limits: Option<LimitsConfig>,
    pub cost: Option<CostConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub lookback_days: Option<u32>,
    pub fetch_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub actuator_timeout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per-kind ceiling on `maximum_instances`.
    pub max_instances: Option<HashMap<String, u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostConfig {
    pub total_monthly_cost: Option<f64>,
    pub potential_monthly_savings: Option<f64>,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        let durations = [
            ("forecast.fetch_timeout", config.forecast.as_ref().and_then(|f| f.fetch_timeout.as_deref())),
            ("executor.actuator_timeout", config.executor.as_ref().and_then(|e| e.actuator_timeout.as_deref())),
        ];
        for (key, value) in durations {
            if let Some(value) = value
                && parse_duration(value).is_none()
            {
                anyhow::bail!("invalid duration for {key}: {value:?}");
            }
        }
        Ok(config)
    }

    /// Load `path` if given, else the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn lookback_days(&self) -> u32 {
        self.forecast
            .as_ref()
            .and_then(|f| f.lookback_days)
            .unwrap_or(DEFAULT_LOOKBACK_DAYS)
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.forecast
            .as_ref()
            .and_then(|f| f.fetch_timeout.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn actuator_timeout(&self) -> Duration {
        self.executor
            .as_ref()
            .and_then(|e| e.actuator_timeout.as_deref())
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_ACTUATOR_TIMEOUT)
    }

    /// Per-kind instance ceilings.
    pub fn max_instances(&self) -> HashMap<String, u32> {
        self.limits
            .as_ref()
            .and_then(|l| l.max_instances.clone())
            .unwrap_or_default()
    }

    /// Static cost figures, if configured.
    pub fn cost(&self) -> Option<CostAnalysis> {
        let cost = self.cost.as_ref()?;
        Some(CostAnalysis {
            total_monthly_cost: cost.total_monthly_cost.unwrap_or(0.0),
            potential_monthly_savings: cost.potential_monthly_savings.unwrap_or(0.0),
        })
    }
}

/// Parse a duration string like "500ms", "30s", "5m", "1h". Bare numbers are
/// seconds. Returns `None` for unparseable input or values that overflow.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (digits, unit_secs) = if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        (s, 1)
    };
    let value = digits.trim().parse::<u64>().ok()?;
    value.checked_mul(unit_secs).map(Duration::from_secs)
}
