use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    analysis::{Analysis, CategoryScores},
    outfits::repo_types::Outfit,
};

/// One scored upload as the history endpoints return it.
///
/// Legacy entries carry the uuid of their image as `id`; signed-in entries
/// carry the outfit row id rendered as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub image_path: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_scores: Option<CategoryScores>,
    #[serde(default)]
    pub feedback: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl HistoryEntry {
    pub fn from_analysis(
        id: String,
        date: OffsetDateTime,
        image_path: String,
        analysis: &Analysis,
    ) -> Self {
        let stored = StoredFeedback::from_analysis(analysis);
        Self {
            id,
            date,
            image_path,
            score: analysis.score,
            category_scores: stored.category_scores,
            feedback: stored.feedback,
            recommendations: stored.recommendations,
        }
    }

    /// Reads one entry of the legacy history file.
    ///
    /// Older writers did not validate model output, so only `id` is required.
    /// Fields that do not decode fall back to empty values.
    pub fn from_legacy(value: &Value) -> Option<Self> {
        if let Ok(entry) = serde_json::from_value::<Self>(value.clone()) {
            return Some(entry);
        }

        let id = match value.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let date = value
            .get("date")
            .and_then(Value::as_str)
            .and_then(|d| OffsetDateTime::parse(d, &Rfc3339).ok())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let category_scores = value
            .get("categoryScores")
            .and_then(|v| serde_json::from_value::<CategoryScores>(v.clone()).ok());
        let recommendations = value
            .get("recommendations")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|r| r.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            date,
            image_path: value
                .get("imagePath")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            score: value.get("score").and_then(Value::as_f64).unwrap_or(0.0),
            category_scores,
            feedback: value.get("feedback").cloned().unwrap_or(Value::Null),
            recommendations,
        })
    }

    pub fn from_outfit(outfit: &Outfit) -> Self {
        let stored = StoredFeedback::decode(&outfit.feedback);
        Self {
            id: outfit.id.to_string(),
            date: outfit.created_at,
            image_path: outfit.image_path.clone(),
            score: outfit.score,
            category_scores: stored.category_scores,
            feedback: stored.feedback,
            recommendations: stored.recommendations,
        }
    }
}

/// Layout of `outfit_uploads.feedback`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoredFeedback {
    #[serde(default)]
    pub category_scores: Option<CategoryScores>,
    #[serde(default)]
    pub feedback: Value,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl StoredFeedback {
    pub fn from_analysis(analysis: &Analysis) -> Self {
        Self {
            category_scores: Some(analysis.category_scores),
            feedback: serde_json::to_value(&analysis.feedback).unwrap_or_default(),
            recommendations: analysis.recommendations.clone(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).context("serialize stored feedback")
    }

    /// Rows written by older clients hold bare feedback, JSON or plain text.
    pub fn decode(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            feedback: serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
            ..Self::default()
        })
    }
}
