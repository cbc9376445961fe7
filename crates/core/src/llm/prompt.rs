use crate::llm::GenerateInput;
use std::fmt::Write as _;

/// The line format the parser expects back from the model. Kept in one
/// place so prompt and parser can't drift apart silently.
pub const OUTPUT_FORMAT: &str = "N. SYMBOL: rationale | Risk: R% | Confidence: C%";

pub fn system_prompt() -> String {
    [
        "You are a cryptocurrency investment advisor.",
        "Respond ONLY with a numbered list of recommendations, one per line, nothing else.",
        "Each line MUST follow this exact format:",
        OUTPUT_FORMAT,
        "Rules:",
        "- Use only symbols present in the provided market data.",
        "- Risk must echo the provided risk assessment, as a percentage (0-100%).",
        "- Confidence must be a percentage between 0% and 100%.",
        "- Keep each rationale to one short sentence with no '|' or ':' characters.",
        "- Do not add headers, commentary, or markdown.",
    ]
    .join("\n")
}

pub fn user_prompt(input: &GenerateInput) -> String {
    let mut out = String::new();

    out.push_str(
        "Based on the following market data and analysis, recommend the top cryptocurrencies to invest in.\n",
    );

    out.push_str("\nMarket Data:\n");
    for row in &input.snapshot.rows {
        let price = row
            .current_price
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "n/a".to_string());
        let change = row
            .price_change_percentage_24h
            .map(|c| format!("{c:.2}%"))
            .unwrap_or_else(|| "n/a".to_string());
        let rank = row
            .market_cap_rank
            .map(|r| r.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "- {}: price ${price}, 24h change {change}, market cap rank {rank}",
            row.symbol
        );
    }

    out.push_str("\nTechnical Trends:\n");
    for (symbol, signal) in &input.trends {
        let mut flags = String::new();
        if signal.overbought {
            flags.push_str(", overbought");
        }
        if signal.oversold {
            flags.push_str(", oversold");
        }
        let _ = writeln!(
            out,
            "- {symbol}: {} ({}), momentum {}{flags}",
            signal.trend, signal.strength, signal.momentum
        );
    }

    out.push_str("\nRisk Assessment (0 = safest, 1 = riskiest):\n");
    for (symbol, risk) in &input.risks {
        let _ = writeln!(out, "- {symbol}: {risk:.2}");
    }

    out.push_str("\nMarket Sentiment (-1 = bearish, 1 = bullish):\n");
    for (symbol, sentiment) in &input.sentiment {
        let _ = writeln!(out, "- {symbol}: {sentiment:.2}");
    }

    out.push_str("\nProvide the recommendations now, one per line, in the required format.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::trend::{Momentum, Strength, Trend, TrendSignal};
    use crate::domain::market::{AssetRow, MarketSnapshot};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn input() -> GenerateInput {
        let rows = vec![AssetRow {
            coin_id: "bitcoin".to_string(),
            symbol: "BTC".to_string(),
            current_price: Some(97000.0),
            price_change_percentage_24h: Some(1.25),
            market_cap_rank: Some(1),
            total_volume: Some(5.0e10),
            market_cap: Some(1.9e12),
        }];
        let snapshot = MarketSnapshot::from_rows(
            chrono::Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            rows,
        );

        let mut trends = BTreeMap::new();
        trends.insert(
            "BTC".to_string(),
            TrendSignal {
                trend: Trend::Bullish,
                strength: Strength::Strong,
                momentum: Momentum::Positive,
                overbought: true,
                oversold: false,
            },
        );

        let mut risks = BTreeMap::new();
        risks.insert("BTC".to_string(), 0.35);

        let mut sentiment = BTreeMap::new();
        sentiment.insert("BTC".to_string(), 0.5);

        GenerateInput {
            snapshot,
            trends,
            risks,
            sentiment,
        }
    }

    #[test]
    fn system_prompt_pins_the_output_format() {
        let prompt = system_prompt();
        assert!(prompt.contains(OUTPUT_FORMAT));
    }

    #[test]
    fn user_prompt_renders_every_section() {
        let prompt = user_prompt(&input());
        assert!(prompt.contains("Market Data:"));
        assert!(prompt.contains("Technical Trends:"));
        assert!(prompt.contains("Risk Assessment"));
        assert!(prompt.contains("Market Sentiment"));
        assert!(prompt.contains("- BTC: bullish (strong), momentum positive, overbought"));
        assert!(prompt.contains("- BTC: 0.35"));
    }
}
