use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Lookback windows for the technical indicators, in observations of the
/// input series (daily closes in the worker).
#[derive(Debug, Clone, Copy)]
pub struct TrendWindows {
    pub sma: usize,
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for TrendWindows {
    fn default() -> Self {
        Self {
            sma: 20,
            rsi: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl TrendWindows {
    /// Minimum series length needed for every indicator to have a defined
    /// trailing value.
    pub fn min_observations(&self) -> usize {
        self.sma
            .max(self.rsi + 1)
            .max(self.macd_fast)
            .max(self.macd_slow)
            .max(self.macd_signal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Strong,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Momentum {
    Positive,
    Negative,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bullish => write!(f, "bullish"),
            Trend::Bearish => write!(f, "bearish"),
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strength::Strong => write!(f, "strong"),
            Strength::Weak => write!(f, "weak"),
        }
    }
}

impl fmt::Display for Momentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Momentum::Positive => write!(f, "positive"),
            Momentum::Negative => write!(f, "negative"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub trend: Trend,
    pub strength: Strength,
    pub momentum: Momentum,
    pub overbought: bool,
    pub oversold: bool,
}

/// Derive the categorical trend signal for one price series. Returns None
/// when the series is too short for the configured windows; callers skip
/// the symbol rather than guessing from partial history.
pub fn derive(prices: &[f64], windows: &TrendWindows) -> Option<TrendSignal> {
    if prices.len() < windows.min_observations() {
        return None;
    }

    let last_price = *prices.last()?;
    let sma = trailing_sma(prices, windows.sma)?;
    let rsi = wilder_rsi(prices, windows.rsi)?;
    let histogram = macd_histogram(
        prices,
        windows.macd_fast,
        windows.macd_slow,
        windows.macd_signal,
    )?;

    Some(label(last_price, sma, rsi, histogram))
}

/// Derive signals for every symbol with enough history, skipping (and
/// logging) the rest.
pub fn derive_all(
    histories: &BTreeMap<String, Vec<f64>>,
    windows: &TrendWindows,
) -> BTreeMap<String, TrendSignal> {
    let mut out = BTreeMap::new();
    for (symbol, prices) in histories {
        match derive(prices, windows) {
            Some(signal) => {
                out.insert(symbol.clone(), signal);
            }
            None => {
                tracing::warn!(
                    %symbol,
                    observations = prices.len(),
                    required = windows.min_observations(),
                    "insufficient price history; skipping trend derivation"
                );
            }
        }
    }
    out
}

fn label(last_price: f64, sma: f64, rsi: f64, macd_histogram: f64) -> TrendSignal {
    TrendSignal {
        trend: if last_price > sma {
            Trend::Bullish
        } else {
            Trend::Bearish
        },
        strength: if (rsi - 50.0).abs() > 20.0 {
            Strength::Strong
        } else {
            Strength::Weak
        },
        momentum: if macd_histogram > 0.0 {
            Momentum::Positive
        } else {
            Momentum::Negative
        },
        overbought: rsi > 70.0,
        oversold: rsi < 30.0,
    }
}

fn trailing_sma(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window {
        return None;
    }
    let tail = &prices[prices.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// RSI with Wilder smoothing: averages are seeded over the first `window`
/// deltas and then exponentially smoothed over the rest of the series.
/// A series with no losses reads 100; a completely flat tape reads the
/// neutral 50 instead of dividing zero by zero.
fn wilder_rsi(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window + 1 {
        return None;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=window {
        let delta = prices[i] - prices[i - 1];
        if delta >= 0.0 {
            gain_sum += delta;
        } else {
            loss_sum -= delta;
        }
    }

    let mut avg_gain = gain_sum / window as f64;
    let mut avg_loss = loss_sum / window as f64;
    let smoothing = (window - 1) as f64;
    for i in window + 1..prices.len() {
        let delta = prices[i] - prices[i - 1];
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * smoothing + gain) / window as f64;
        avg_loss = (avg_loss * smoothing + loss) / window as f64;
    }

    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Trailing MACD histogram: EMA(fast) - EMA(slow), minus its EMA(signal)
/// signal line.
fn macd_histogram(prices: &[f64], fast: usize, slow: usize, signal: usize) -> Option<f64> {
    if fast == 0 || slow == 0 || signal == 0 || prices.len() < slow {
        return None;
    }

    let ema_fast = ema_series(prices, fast);
    let ema_slow = ema_series(prices, slow);
    let macd_line: Vec<f64> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&macd_line, signal);

    Some(macd_line.last()? - signal_line.last()?)
}

fn ema_series(values: &[f64], window: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let alpha = 2.0 / (window as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = first;
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}
