//! Fixed cost figures, e.g. from the engine configuration's `[cost]` table.

use warpgrid_state::{BoxFuture, CostAnalysis, CostSignal};

/// Reports the same cost analysis for every scope.
#[derive(Debug, Clone, Copy)]
pub struct StaticCost {
    analysis: CostAnalysis,
}

impl StaticCost {
    pub fn new(analysis: CostAnalysis) -> Self {
        Self { analysis }
    }
}

impl CostSignal for StaticCost {
    fn analyze_cost<'a>(&'a self, _scope_id: &'a str) -> BoxFuture<'a, anyhow::Result<CostAnalysis>> {
        Box::pin(async move { Ok(self.analysis) })
    }
}
