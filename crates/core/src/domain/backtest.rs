use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Simulated performance of one pipeline run. A run with no qualifying
/// recommendations is the zero value of this struct, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Mean simulated cumulative return across qualifying recommendations.
    pub overall_performance: f64,
    /// Symbol -> simulated cumulative return over the simulation horizon.
    pub individual_performances: BTreeMap<String, f64>,
    /// Symbol -> annualized Sharpe-like ratio of the simulated daily returns.
    pub risk_adjusted_returns: BTreeMap<String, f64>,
    /// Fraction of qualifying recommendations with a positive cumulative return.
    pub success_rate: f64,
}

impl BacktestResult {
    pub fn is_empty(&self) -> bool {
        self.individual_performances.is_empty()
    }
}
