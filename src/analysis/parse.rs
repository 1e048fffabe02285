use serde_json::Value;
use tracing::debug;

use super::{dto::Analysis, AnalysisError};

const FENCE: &str = "```";
const SCORE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=10.0;

/// Returns the body of a markdown code block, or the trimmed text when there is none.
///
/// The info string after the opening fence (`json`, `JSON`, ...) is dropped.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(open) = text.find(FENCE) else {
        return text;
    };
    let after = text[open + FENCE.len()..].trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let inner = match after.rfind(FENCE) {
        Some(close) => &after[..close],
        None => after,
    };
    inner.trim()
}

fn malformed(raw: &str, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::Malformed {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

/// Parses and validates model output. The text is untrusted.
pub fn parse_analysis(raw: &str) -> Result<Analysis, AnalysisError> {
    let trimmed = raw.trim();
    let value: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(first) => serde_json::from_str(strip_code_fences(trimmed))
            .map_err(|_| malformed(raw, format!("invalid JSON: {first}")))?,
    };

    let analysis: Analysis = serde_json::from_value(value)
        .map_err(|e| malformed(raw, format!("unexpected shape: {e}")))?;

    check_score(raw, "score", analysis.score)?;
    for (name, score) in analysis.category_scores.iter() {
        check_score(raw, name, score)?;
    }

    let weighted = analysis.category_scores.weighted();
    if (weighted - analysis.score).abs() > 0.5 {
        debug!(reported = analysis.score, weighted, "model score differs from weighted categories");
    }

    Ok(analysis)
}

fn check_score(raw: &str, name: &str, score: f64) -> Result<(), AnalysisError> {
    if score.is_finite() && SCORE_RANGE.contains(&score) {
        Ok(())
    } else {
        Err(malformed(raw, format!("{name} out of range: {score}")))
    }
}
