pub mod error;
pub mod gemini;
pub mod parse;
pub mod prompt;

use crate::analysis::trend::TrendSignal;
use crate::domain::market::MarketSnapshot;
use std::collections::BTreeMap;

/// Everything the text generator gets to see for one run: the market
/// snapshot plus the derived analysis layers keyed by symbol.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub snapshot: MarketSnapshot,
    pub trends: BTreeMap<String, TrendSignal>,
    pub risks: BTreeMap<String, f64>,
    pub sentiment: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy)]
pub enum Provider {
    Gemini,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
        }
    }
}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    /// Produce the free-text recommendation block for this input. The
    /// output contract is the numbered-line format that
    /// `parse::parse_recommendations` consumes.
    async fn generate_recommendations(&self, input: &GenerateInput) -> anyhow::Result<String>;
}
