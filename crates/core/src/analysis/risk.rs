use crate::domain::market::AssetRow;
use std::collections::BTreeMap;

/// Rank divisor is a fixed scale, not a batch percentile: rank 100+ saturates
/// the component at >= 1.0 before weighting.
const RANK_SCALE: f64 = 100.0;
const DEFAULT_MARKET_CAP_RANK: f64 = 100.0;

/// Relative weights of the three risk components. Expected to sum to 1.0;
/// the final score is clamped to [0, 1] either way.
#[derive(Debug, Clone, Copy)]
pub struct RiskWeights {
    pub volatility: f64,
    pub market_cap: f64,
    pub volume: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            volatility: 0.4,
            market_cap: 0.3,
            volume: 0.3,
        }
    }
}

impl RiskWeights {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("RISK_WEIGHT_VOLATILITY") {
            if let Ok(n) = s.parse::<f64>() {
                out.volatility = n;
            }
        }

        if let Ok(s) = std::env::var("RISK_WEIGHT_MARKET_CAP") {
            if let Ok(n) = s.parse::<f64>() {
                out.market_cap = n;
            }
        }

        if let Ok(s) = std::env::var("RISK_WEIGHT_VOLUME") {
            if let Ok(n) = s.parse::<f64>() {
                out.volume = n;
            }
        }

        out
    }
}

/// Score every row in the batch, returning symbol -> risk in [0, 1]
/// (higher = riskier).
///
/// Missing fields default toward caution: absent 24h change scores zero
/// volatility, absent rank scores as rank 100, absent volume scores as the
/// thinnest book in the batch. The volume component is batch-relative; a
/// batch whose max volume is zero carries no volume signal, so that
/// component is zeroed rather than divided through.
pub fn score(rows: &[AssetRow], weights: &RiskWeights) -> BTreeMap<String, f64> {
    let max_volume = rows
        .iter()
        .filter_map(|r| r.total_volume)
        .fold(0.0_f64, f64::max);

    let mut out = BTreeMap::new();
    for row in rows {
        let volatility = row.price_change_percentage_24h.unwrap_or(0.0).abs() / 100.0;

        let rank = row
            .market_cap_rank
            .map(f64::from)
            .unwrap_or(DEFAULT_MARKET_CAP_RANK);
        let market_cap = rank / RANK_SCALE;

        let volume = row.total_volume.unwrap_or(0.0);
        let volume_component = if max_volume > 0.0 {
            1.0 - volume / max_volume
        } else {
            0.0
        };

        let weighted = weights.volatility * volatility
            + weights.market_cap * market_cap
            + weights.volume * volume_component;

        out.insert(row.symbol.clone(), weighted.clamp(0.0, 1.0));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, change_24h: Option<f64>, rank: Option<u32>, volume: Option<f64>) -> AssetRow {
        AssetRow {
            coin_id: symbol.to_ascii_lowercase(),
            symbol: symbol.to_string(),
            current_price: Some(100.0),
            price_change_percentage_24h: change_24h,
            market_cap_rank: rank,
            total_volume: volume,
            market_cap: Some(1.0e9),
        }
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let rows = vec![
            row("BTC", Some(2.5), Some(1), Some(5.0e10)),
            row("ETH", Some(-4.0), Some(2), Some(2.0e10)),
            row("DOGE", Some(250.0), Some(90), Some(1.0e6)),
            row("DUST", None, None, None),
        ];

        for weights in [
            RiskWeights::default(),
            RiskWeights {
                volatility: 1.0,
                market_cap: 0.0,
                volume: 0.0,
            },
            RiskWeights {
                volatility: 0.2,
                market_cap: 0.5,
                volume: 0.3,
            },
        ] {
            for (_, score) in score(&rows, &weights) {
                assert!((0.0..=1.0).contains(&score), "score out of range: {score}");
            }
        }
    }

    #[test]
    fn max_volume_row_has_zero_volume_component() {
        let rows = vec![row("BTC", Some(10.0), Some(5), Some(1.0e9))];
        let scores = score(&rows, &RiskWeights::default());

        // volatility 0.1 * 0.4 + rank 0.05 * 0.3 + volume 0 * 0.3
        let expected = 0.4 * 0.1 + 0.3 * 0.05;
        let got = scores["BTC"];
        assert!((got - expected).abs() < 1e-12, "got {got}, expected {expected}");
    }

    #[test]
    fn missing_fields_use_cautious_defaults() {
        let rows = vec![
            row("FULL", Some(0.0), Some(1), Some(1.0e9)),
            row("BARE", None, None, None),
        ];
        let scores = score(&rows, &RiskWeights::default());

        // No volatility, rank defaults to 100, volume defaults to the
        // thinnest book: 0.4*0 + 0.3*1.0 + 0.3*1.0
        let got = scores["BARE"];
        assert!((got - 0.6).abs() < 1e-12, "got {got}");
    }

    #[test]
    fn extreme_volatility_is_clamped() {
        let rows = vec![row("PUMP", Some(400.0), Some(100), Some(1.0))];
        let scores = score(&rows, &RiskWeights::default());
        assert_eq!(scores["PUMP"], 1.0);
    }

    #[test]
    fn empty_batch_yields_empty_map() {
        let scores = score(&[], &RiskWeights::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn zero_volume_batch_has_no_volume_signal() {
        let rows = vec![
            row("A", Some(0.0), Some(50), Some(0.0)),
            row("B", Some(0.0), Some(50), None),
        ];
        let scores = score(&rows, &RiskWeights::default());

        // Only the rank component contributes: 0.3 * 0.5.
        for (_, s) in scores {
            assert!((s - 0.15).abs() < 1e-12);
        }
    }
}
