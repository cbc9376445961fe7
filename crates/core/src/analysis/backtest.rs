use crate::domain::backtest::BacktestResult;
use crate::domain::recommendation::Recommendation;
use rand::Rng;
use rand_distr::{Distribution, Normal};

const TRADING_PERIODS_PER_YEAR: f64 = 252.0;

/// Daily drift at zero risk; scaled down as risk rises.
const BASE_DAILY_DRIFT: f64 = 0.001;
/// Daily volatility at full risk; scaled down as risk falls.
const BASE_DAILY_VOLATILITY: f64 = 0.02;

#[derive(Debug, Clone, Copy)]
pub struct BacktestConfig {
    /// Recommendations must exceed this confidence (strictly) to be simulated.
    pub confidence_threshold: f64,
    /// Number of daily return samples drawn per recommendation.
    pub periods: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            periods: 30,
        }
    }
}

impl BacktestConfig {
    pub fn from_env() -> Self {
        let mut out = Self::default();

        if let Ok(s) = std::env::var("BACKTEST_CONFIDENCE_THRESHOLD") {
            if let Ok(n) = s.parse::<f64>() {
                out.confidence_threshold = n;
            }
        }

        if let Ok(s) = std::env::var("BACKTEST_PERIODS") {
            if let Ok(n) = s.parse::<usize>() {
                out.periods = n;
            }
        }

        out
    }
}

/// Monte-Carlo style check of a recommendation batch: each qualifying
/// recommendation gets `periods` independent daily-return draws from a
/// normal distribution whose drift falls and volatility rises with the
/// recommendation's risk score. This is a lightweight stochastic
/// approximation, not a historical replay.
///
/// The generator is injected so runs can be made reproducible; no global
/// RNG state is touched.
pub fn simulate<R: Rng>(
    recommendations: &[Recommendation],
    config: &BacktestConfig,
    rng: &mut R,
) -> BacktestResult {
    let mut result = BacktestResult::default();

    let qualifying: Vec<&Recommendation> = recommendations
        .iter()
        .filter(|rec| rec.confidence > config.confidence_threshold)
        .collect();
    if qualifying.is_empty() {
        return result;
    }

    for rec in qualifying {
        let drift = BASE_DAILY_DRIFT * (1.0 - rec.risk_score);
        let volatility = BASE_DAILY_VOLATILITY * rec.risk_score;
        let daily = sample_daily_returns(drift, volatility, config.periods, rng);

        let cumulative = daily.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        result
            .individual_performances
            .insert(rec.symbol.clone(), cumulative);
        result
            .risk_adjusted_returns
            .insert(rec.symbol.clone(), sharpe_ratio(&daily));
    }

    let n = result.individual_performances.len() as f64;
    result.overall_performance = result.individual_performances.values().sum::<f64>() / n;
    result.success_rate = result
        .individual_performances
        .values()
        .filter(|r| **r > 0.0)
        .count() as f64
        / n;

    result
}

/// A zero-volatility recommendation degenerates to its pure drift; the
/// distribution is skipped entirely so no zero-sigma sampling is attempted.
fn sample_daily_returns<R: Rng>(drift: f64, volatility: f64, periods: usize, rng: &mut R) -> Vec<f64> {
    if volatility <= 0.0 {
        return vec![drift; periods];
    }

    match Normal::new(drift, volatility) {
        Ok(dist) => (0..periods).map(|_| dist.sample(rng)).collect(),
        Err(_) => vec![drift; periods],
    }
}

/// Annualized mean-over-stdev of the sampled daily returns (population
/// stdev). Zero variance reads as 0 rather than dividing by zero.
fn sharpe_ratio(daily: &[f64]) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }

    let n = daily.len() as f64;
    let mean = daily.iter().sum::<f64>() / n;
    let variance = daily.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        return 0.0;
    }

    mean / stdev * TRADING_PERIODS_PER_YEAR.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rec(symbol: &str, risk_score: f64, confidence: f64) -> Recommendation {
        Recommendation {
            symbol: symbol.to_string(),
            rationale: "test".to_string(),
            risk_score,
            confidence,
        }
    }

    #[test]
    fn no_qualifying_recommendations_yield_zeroed_result() {
        let recs = vec![rec("BTC", 0.3, 0.5), rec("ETH", 0.2, 0.7)];
        let mut rng = StdRng::seed_from_u64(1);
        let result = simulate(&recs, &BacktestConfig::default(), &mut rng);

        assert!(result.is_empty());
        assert_eq!(result.overall_performance, 0.0);
        assert_eq!(result.success_rate, 0.0);
        assert!(result.risk_adjusted_returns.is_empty());
    }

    #[test]
    fn threshold_is_strictly_greater_than() {
        // Confidence exactly at the threshold does not qualify.
        let recs = vec![rec("BTC", 0.3, 0.7)];
        let mut rng = StdRng::seed_from_u64(1);
        let result = simulate(&recs, &BacktestConfig::default(), &mut rng);
        assert!(result.is_empty());
    }

    #[test]
    fn zero_risk_degenerates_to_pure_drift() {
        let recs = vec![rec("USDX", 0.0, 0.9)];
        let config = BacktestConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let result = simulate(&recs, &config, &mut rng);

        let expected = 1.001_f64.powi(config.periods as i32) - 1.0;
        let got = result.individual_performances["USDX"];
        assert!((got - expected).abs() < 1e-12, "got {got}, expected {expected}");

        // Zero variance: the Sharpe guard returns 0 instead of dividing by zero.
        assert_eq!(result.risk_adjusted_returns["USDX"], 0.0);
        assert_eq!(result.success_rate, 1.0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let recs = vec![rec("BTC", 0.4, 0.9), rec("ETH", 0.6, 0.8)];
        let config = BacktestConfig::default();

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = simulate(&recs, &config, &mut rng_a);
        let b = simulate(&recs, &config, &mut rng_b);

        assert_eq!(a.individual_performances, b.individual_performances);
        assert_eq!(a.risk_adjusted_returns, b.risk_adjusted_returns);
        assert_eq!(a.overall_performance, b.overall_performance);
        assert_eq!(a.success_rate, b.success_rate);
    }

    #[test]
    fn success_rate_counts_positive_cumulative_returns() {
        let recs: Vec<Recommendation> = (0..10)
            .map(|i| rec(&format!("C{i}"), 0.8, 0.9))
            .collect();
        let mut rng = StdRng::seed_from_u64(3);
        let result = simulate(&recs, &BacktestConfig::default(), &mut rng);

        assert!((0.0..=1.0).contains(&result.success_rate));
        let positives = result
            .individual_performances
            .values()
            .filter(|r| **r > 0.0)
            .count();
        let expected = positives as f64 / result.individual_performances.len() as f64;
        assert_eq!(result.success_rate, expected);
    }

    #[test]
    fn overall_performance_is_mean_of_individuals() {
        let recs = vec![rec("BTC", 0.5, 0.9), rec("ETH", 0.2, 0.8), rec("SOL", 0.9, 0.95)];
        let mut rng = StdRng::seed_from_u64(11);
        let result = simulate(&recs, &BacktestConfig::default(), &mut rng);

        let mean = result.individual_performances.values().sum::<f64>()
            / result.individual_performances.len() as f64;
        assert!((result.overall_performance - mean).abs() < 1e-12);
    }
}
