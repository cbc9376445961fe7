use crate::domain::recommendation::Recommendation;

/// Parse the generator's free-text output into structured recommendations.
///
/// Candidate lines look like `1. BTC: Strong momentum | Risk: 30% |
/// Confidence: 85%`. Anything else (blank lines, prose, headers) is
/// commentary by contract and skipped silently; lines that look like
/// candidates but fail a parse step are skipped with a warning. Partial
/// output is expected and fine; order is preserved for what survives.
pub fn parse_recommendations(text: &str) -> Vec<Recommendation> {
    let mut out = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }

        match parse_line(trimmed) {
            Some(rec) => out.push(rec),
            None => {
                tracing::warn!(line_no = idx + 1, line = trimmed, "skipping malformed recommendation line");
            }
        }
    }

    out
}

fn parse_line(line: &str) -> Option<Recommendation> {
    let mut segments = line.split('|');
    let head = segments.next()?;
    let risk_segment = segments.next()?;
    let confidence_segment = segments.next()?;

    let (symbol, rationale) = parse_head(head)?;
    let risk_score = parse_percent(risk_segment)?;
    let confidence = parse_percent(confidence_segment)?;

    Some(Recommendation {
        symbol,
        rationale,
        risk_score,
        confidence,
    })
}

/// `"1. BTC: Strong fundamentals "` -> `("BTC", "Strong fundamentals")`.
fn parse_head(head: &str) -> Option<(String, String)> {
    let (symbol_part, rationale) = head.split_once(':')?;
    let symbol = symbol_part.split_once('.')?.1.trim();
    if symbol.is_empty() {
        return None;
    }

    let rationale = rationale.trim();
    if rationale.is_empty() {
        return None;
    }

    Some((symbol.to_ascii_uppercase(), rationale.to_string()))
}

/// `" Risk: 30% "` -> `0.30`. Values are clamped to [0, 1]: a model that
/// writes "150%" gets capped rather than dropped.
fn parse_percent(segment: &str) -> Option<f64> {
    let value = segment.split_once(':')?.1.trim();
    let value = value.trim_end_matches('%').trim();
    let parsed = value.parse::<f64>().ok()? / 100.0;
    Some(parsed.clamp(0.0, 1.0))
}
