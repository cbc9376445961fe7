use crate::domain::backtest::BacktestResult;
use crate::domain::recommendation::Recommendation;
use std::fmt::Write as _;

/// Render the run summary sent to the alert sink: the recommendations,
/// the simulated performance check, and optionally a news pointer.
pub fn format_alert(
    recommendations: &[Recommendation],
    results: &BacktestResult,
    market_news: &str,
) -> String {
    let mut out = String::from("🚀 Crypto Investment Recommendations:\n\n");

    if recommendations.is_empty() {
        out.push_str("No recommendations were produced for this run.\n");
    }
    for rec in recommendations {
        let _ = writeln!(out, "💎 {}: {}", rec.symbol, rec.rationale);
        let _ = writeln!(out, "Risk Score: {:.2}", rec.risk_score);
        let _ = writeln!(out, "Confidence: {}\n", percent(rec.confidence));
    }

    out.push_str("\n📊 Backtest Results:\n");
    let _ = writeln!(
        out,
        "Overall Performance: {}",
        percent(results.overall_performance)
    );
    let _ = writeln!(out, "Success Rate: {}", percent(results.success_rate));

    if !market_news.is_empty() {
        let _ = writeln!(out, "\n📰 Market News:\n{market_news}");
    }

    out.push_str("\n⚠️ This is not financial advice. Always DYOR (Do Your Own Research).");
    out
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(symbol: &str) -> Recommendation {
        Recommendation {
            symbol: symbol.to_string(),
            rationale: "Strong fundamentals".to_string(),
            risk_score: 0.3,
            confidence: 0.85,
        }
    }

    #[test]
    fn formats_recommendations_and_summary() {
        let mut results = BacktestResult::default();
        results.overall_performance = 0.0512;
        results.success_rate = 0.75;

        let text = format_alert(&[rec("BTC"), rec("ETH")], &results, "");
        assert!(text.contains("💎 BTC: Strong fundamentals"));
        assert!(text.contains("💎 ETH"));
        assert!(text.contains("Risk Score: 0.30"));
        assert!(text.contains("Confidence: 85.00%"));
        assert!(text.contains("Overall Performance: 5.12%"));
        assert!(text.contains("Success Rate: 75.00%"));
        assert!(text.contains("DYOR"));
    }

    #[test]
    fn empty_run_still_produces_a_readable_alert() {
        let text = format_alert(&[], &BacktestResult::default(), "");
        assert!(text.contains("No recommendations were produced"));
        assert!(text.contains("Overall Performance: 0.00%"));
    }

    #[test]
    fn includes_news_when_present() {
        let text = format_alert(&[], &BacktestResult::default(), "Markets rallied.");
        assert!(text.contains("📰 Market News:\nMarkets rallied."));

        let text = format_alert(&[], &BacktestResult::default(), "");
        assert!(!text.contains("📰"));
    }
}
