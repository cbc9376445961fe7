use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One asset in a market snapshot. Numeric fields stay optional; each
/// consumer picks its own per-field default (see `analysis::risk`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRow {
    /// Provider-side coin id (e.g. "bitcoin"), used for history lookups.
    pub coin_id: String,
    pub symbol: String,
    pub current_price: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub total_volume: Option<f64>,
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub rows: Vec<AssetRow>,
}

impl MarketSnapshot {
    /// Normalizes raw provider rows into a snapshot: symbols are
    /// uppercased, rows with empty symbols are dropped, duplicate symbols
    /// keep the first occurrence (providers order by market cap), negative
    /// volumes clamp to zero, and a rank of 0 is treated as absent.
    pub fn from_rows(fetched_at: DateTime<Utc>, rows: Vec<AssetRow>) -> Self {
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(rows.len());

        for mut row in rows {
            let symbol = row.symbol.trim().to_ascii_uppercase();
            if symbol.is_empty() || !seen.insert(symbol.clone()) {
                continue;
            }
            row.symbol = symbol;
            row.total_volume = row.total_volume.map(|v| v.max(0.0));
            row.market_cap_rank = row.market_cap_rank.filter(|r| *r >= 1);
            out.push(row);
        }

        Self {
            fetched_at,
            rows: out,
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.symbol.as_str()).collect()
    }
}
