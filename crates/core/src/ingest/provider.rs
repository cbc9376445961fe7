use crate::config::Settings;
use crate::domain::market::MarketSnapshot;
use crate::ingest::types::{MarketChartResponse, MarketRow};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_PER_PAGE: usize = 100;
// Free-tier CoinGecko allows roughly 30 requests a minute.
const DEFAULT_REQ_DELAY_MS: u64 = 2100;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fetch the current top-of-market snapshot, ordered by market cap.
    async fn fetch_markets(&self) -> Result<MarketSnapshot>;

    /// Fetch `days` of daily closing prices for one coin, oldest first.
    async fn fetch_price_history(&self, coin_id: &str, days: u32) -> Result<Vec<f64>>;
}

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    per_page: usize,
    retries: u32,
    req_delay: Duration,
}

impl CoinGeckoClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .market_data_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_key = settings.market_data_api_key.clone();

        let timeout_secs = std::env::var("MARKET_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("MARKET_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let per_page = std::env::var("MARKET_DATA_PER_PAGE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PER_PAGE);

        let req_delay_ms = std::env::var("MARKET_DATA_REQ_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQ_DELAY_MS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build market data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            per_page,
            retries,
            req_delay: Duration::from_millis(req_delay_ms),
        })
    }

    pub fn with_per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn req_delay(&self) -> Duration {
        self.req_delay
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-cg-demo-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn fetch_markets_once(&self) -> Result<Vec<MarketRow>> {
        let res = self
            .http
            .get(self.url("/coins/markets"))
            .headers(self.headers()?)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", self.per_page.to_string()),
                ("page", "1".to_string()),
                ("sparkline", "false".to_string()),
            ])
            .send()
            .await
            .context("market listing request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market listing response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status}: {text}");
        }

        let rows = serde_json::from_str::<Vec<MarketRow>>(&text)
            .with_context(|| format!("failed to parse market listing response: {text}"))?;
        validate_rows(&rows)?;
        Ok(rows)
    }

    async fn fetch_price_history_once(&self, coin_id: &str, days: u32) -> Result<Vec<f64>> {
        let res = self
            .http
            .get(self.url(&format!("/coins/{coin_id}/market_chart")))
            .headers(self.headers()?)
            .query(&[
                ("vs_currency", "usd".to_string()),
                ("days", days.to_string()),
                ("interval", "daily".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("market chart request failed for {coin_id}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read market chart response")?;
        if !status.is_success() {
            anyhow::bail!("market data HTTP {status} for {coin_id}: {text}");
        }

        let chart = serde_json::from_str::<MarketChartResponse>(&text)
            .with_context(|| format!("failed to parse market chart response for {coin_id}"))?;
        Ok(chart.closes())
    }

    async fn with_retries<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(out) => return Ok(out),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(what, attempt, ?backoff, error = %err, "market data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for CoinGeckoClient {
    fn provider_name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_markets(&self) -> Result<MarketSnapshot> {
        let rows = self
            .with_retries("markets", || self.fetch_markets_once())
            .await?;
        let assets = rows.into_iter().map(MarketRow::into_asset_row).collect();
        Ok(MarketSnapshot::from_rows(chrono::Utc::now(), assets))
    }

    async fn fetch_price_history(&self, coin_id: &str, days: u32) -> Result<Vec<f64>> {
        self.with_retries("market_chart", || {
            self.fetch_price_history_once(coin_id, days)
        })
        .await
    }
}

/// Walk the snapshot and fetch the price history for every asset, pausing
/// between requests to stay under provider rate limits. Failed coins are
/// skipped with a warning; trend derivation simply won't cover them.
pub async fn fetch_price_histories(
    provider: &impl MarketDataProvider,
    snapshot: &MarketSnapshot,
    days: u32,
    req_delay: Duration,
) -> BTreeMap<String, Vec<f64>> {
    let mut out = BTreeMap::new();
    for (idx, row) in snapshot.rows.iter().enumerate() {
        if idx != 0 {
            tokio::time::sleep(req_delay).await;
        }

        match provider.fetch_price_history(&row.coin_id, days).await {
            Ok(prices) => {
                out.insert(row.symbol.clone(), prices);
            }
            Err(err) => {
                tracing::warn!(
                    coin_id = %row.coin_id,
                    symbol = %row.symbol,
                    error = %err,
                    "price history fetch failed; skipping asset"
                );
            }
        }
    }
    out
}

fn validate_rows(rows: &[MarketRow]) -> Result<()> {
    anyhow::ensure!(!rows.is_empty(), "market listing is empty");
    for row in rows {
        anyhow::ensure!(!row.id.trim().is_empty(), "coin id must be non-empty");
        anyhow::ensure!(
            !row.symbol.trim().is_empty(),
            "coin symbol must be non-empty (id={})",
            row.id
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_listing_shape() {
        let rows: Vec<MarketRow> = serde_json::from_value(json!([
            {"id": "bitcoin", "symbol": "btc", "market_cap_rank": 1},
            {"id": "ethereum", "symbol": "eth", "market_cap_rank": 2}
        ]))
        .unwrap();
        assert!(validate_rows(&rows).is_ok());
    }

    #[test]
    fn rejects_empty_listing_and_blank_ids() {
        assert!(validate_rows(&[]).is_err());

        let rows: Vec<MarketRow> =
            serde_json::from_value(json!([{"id": " ", "symbol": "btc"}])).unwrap();
        assert!(validate_rows(&rows).is_err());

        let rows: Vec<MarketRow> =
            serde_json::from_value(json!([{"id": "bitcoin", "symbol": ""}])).unwrap();
        assert!(validate_rows(&rows).is_err());
    }
}
