use crate::config::Settings;
use crate::ingest::types::ExchangeTrade;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.exchange.coinbase.com";
const DEFAULT_PRODUCT: &str = "BTC-USD";
const DEFAULT_SYMBOL: &str = "BTC";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
// Only the most recent trades carry a readable short-term signal.
const MAX_TRADES: usize = 100;

#[async_trait::async_trait]
pub trait SentimentSource: Send + Sync {
    /// Current market sentiment per symbol, each value in [-1, 1].
    async fn market_sentiment(&self) -> Result<BTreeMap<String, f64>>;
}

#[derive(Debug, Clone)]
pub struct CoinbaseSentimentClient {
    http: reqwest::Client,
    base_url: String,
    product: String,
    symbol: String,
}

impl CoinbaseSentimentClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .sentiment_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let product =
            std::env::var("SENTIMENT_PRODUCT").unwrap_or_else(|_| DEFAULT_PRODUCT.to_string());
        let symbol = product
            .split('-')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SYMBOL)
            .to_ascii_uppercase();

        let timeout_secs = std::env::var("SENTIMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build sentiment http client")?;

        Ok(Self {
            http,
            base_url,
            product,
            symbol,
        })
    }

    /// Pointer to a human-readable market news feed, included in the alert.
    pub fn market_news(&self) -> String {
        "Check https://www.coinbase.com/news for the latest crypto market news.".to_string()
    }

    async fn fetch_recent_trades(&self) -> Result<Vec<ExchangeTrade>> {
        let url = format!(
            "{}/products/{}/trades",
            self.base_url.trim_end_matches('/'),
            self.product
        );

        let res = self
            .http
            .get(url)
            // The exchange API rejects requests without a user agent.
            .header(reqwest::header::USER_AGENT, "coinsage/0.1")
            .send()
            .await
            .context("trades request failed")?;

        let status = res.status();
        let text = res.text().await.context("failed to read trades response")?;
        if !status.is_success() {
            anyhow::bail!("sentiment HTTP {status}: {text}");
        }

        serde_json::from_str::<Vec<ExchangeTrade>>(&text)
            .with_context(|| format!("failed to parse trades response: {text}"))
    }
}

#[async_trait::async_trait]
impl SentimentSource for CoinbaseSentimentClient {
    /// Tick-rule sentiment over the most recent trades. Any fetch or parse
    /// failure degrades to a neutral reading; sentiment is an input signal,
    /// never a reason to abort the run.
    async fn market_sentiment(&self) -> Result<BTreeMap<String, f64>> {
        let sentiment = match self.fetch_recent_trades().await {
            Ok(trades) => {
                let prices: Vec<f64> = trades
                    .iter()
                    .take(MAX_TRADES)
                    .filter_map(|t| t.price.parse::<f64>().ok())
                    .collect();
                tick_rule_sentiment(&prices)
            }
            Err(err) => {
                tracing::warn!(product = %self.product, error = %err, "sentiment fetch failed; using neutral");
                0.0
            }
        };

        let mut out = BTreeMap::new();
        out.insert(self.symbol.clone(), sentiment);
        Ok(out)
    }
}

/// Classify each trade price against the most recent one (+1 above, -1
/// below, 0 equal) and average, normalized to [-1, 1]. An empty or
/// perfectly flat tape reads neutral rather than dividing by zero.
pub fn tick_rule_sentiment(prices: &[f64]) -> f64 {
    let Some(&reference) = prices.first() else {
        return 0.0;
    };

    let ticks: Vec<f64> = prices.iter().map(|p| (p - reference).signum()).collect();
    let max_abs = ticks.iter().fold(0.0_f64, |acc, t| acc.max(t.abs()));
    if max_abs == 0.0 {
        return 0.0;
    }

    let mean = ticks.iter().sum::<f64>() / ticks.len() as f64;
    mean / max_abs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rising_tape_reads_negative_against_latest() {
        // Trades arrive newest first: older trades below the latest price
        // mean the market has been ticking up toward it.
        let prices = vec![100.0, 99.0, 98.5, 97.0];
        let sentiment = tick_rule_sentiment(&prices);
        assert!(sentiment < 0.0);
        assert!((-1.0..=1.0).contains(&sentiment));
    }

    #[test]
    fn older_trades_above_latest_read_positive() {
        let prices = vec![100.0, 101.0, 102.0, 103.0];
        let sentiment = tick_rule_sentiment(&prices);
        assert!(sentiment > 0.0);
        assert!((-1.0..=1.0).contains(&sentiment));
    }

    #[test]
    fn flat_or_empty_tape_is_neutral() {
        assert_eq!(tick_rule_sentiment(&[]), 0.0);
        assert_eq!(tick_rule_sentiment(&[42.0]), 0.0);
        assert_eq!(tick_rule_sentiment(&[42.0, 42.0, 42.0]), 0.0);
    }

    #[test]
    fn mixed_tape_stays_in_bounds() {
        let prices = vec![100.0, 101.0, 99.0, 100.0, 102.0, 98.0];
        let sentiment = tick_rule_sentiment(&prices);
        assert!((-1.0..=1.0).contains(&sentiment));
    }
}
