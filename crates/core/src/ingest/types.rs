use crate::domain::market::AssetRow;
use serde::{Deserialize, Serialize};

/// Row shape of the CoinGecko `/coins/markets` listing. Every numeric field
/// is nullable in the wild (delisted or freshly listed coins), so they all
/// stay optional here and the analysis layer picks per-field defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRow {
    pub id: String,
    pub symbol: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

impl MarketRow {
    pub fn into_asset_row(self) -> AssetRow {
        AssetRow {
            coin_id: self.id,
            symbol: self.symbol,
            current_price: self.current_price,
            price_change_percentage_24h: self.price_change_percentage_24h,
            market_cap_rank: self.market_cap_rank,
            total_volume: self.total_volume,
            market_cap: self.market_cap,
        }
    }
}

/// `/coins/{id}/market_chart` response. Each price point is a
/// `[timestamp_ms, price]` pair; only the prices are used downstream.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartResponse {
    pub prices: Vec<[f64; 2]>,
}

impl MarketChartResponse {
    pub fn closes(&self) -> Vec<f64> {
        self.prices.iter().map(|point| point[1]).collect()
    }
}

/// One executed trade from the Coinbase Exchange public trades feed.
/// Prices arrive as decimal strings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeTrade {
    pub price: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_market_row_with_null_fields() {
        let v = json!({
            "id": "bitcoin",
            "symbol": "btc",
            "current_price": 97000.5,
            "price_change_percentage_24h": null,
            "market_cap_rank": 1,
            "total_volume": null,
            "market_cap": 1.9e12
        });

        let row: MarketRow = serde_json::from_value(v).unwrap();
        assert_eq!(row.id, "bitcoin");
        assert_eq!(row.price_change_percentage_24h, None);
        assert_eq!(row.total_volume, None);

        let asset = row.into_asset_row();
        assert_eq!(asset.coin_id, "bitcoin");
        assert_eq!(asset.market_cap_rank, Some(1));
    }

    #[test]
    fn parses_market_row_with_missing_keys() {
        let v = json!({
            "id": "newcoin",
            "symbol": "new"
        });

        let row: MarketRow = serde_json::from_value(v).unwrap();
        assert_eq!(row.current_price, None);
        assert_eq!(row.market_cap, None);
    }

    #[test]
    fn market_chart_extracts_closes() {
        let v = json!({
            "prices": [[1700000000000.0, 100.0], [1700086400000.0, 101.5]],
            "market_caps": [],
            "total_volumes": []
        });

        let chart: MarketChartResponse = serde_json::from_value(v).unwrap();
        assert_eq!(chart.closes(), vec![100.0, 101.5]);
    }
}
