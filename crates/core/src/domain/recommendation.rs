use serde::{Deserialize, Serialize};

/// A single structured recommendation, parsed out of the generator's
/// free-text output. `risk_score` and `confidence` are clamped to [0, 1]
/// at parse time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub rationale: String,
    pub risk_score: f64,
    pub confidence: f64,
}
