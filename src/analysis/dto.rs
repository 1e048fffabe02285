use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const STYLE_WEIGHT: f64 = 0.30;
pub const COLOR_WEIGHT: f64 = 0.25;
pub const FIT_WEIGHT: f64 = 0.25;
pub const ACCESSORIES_WEIGHT: f64 = 0.10;
pub const OCCASION_WEIGHT: f64 = 0.10;

/// Per-category scores, each in [0, 10].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    pub style: f64,
    pub color_coordination: f64,
    pub fit: f64,
    pub accessories: f64,
    pub occasion_appropriateness: f64,
}

impl CategoryScores {
    /// Weighted overall score the model is asked to report.
    pub fn weighted(&self) -> f64 {
        self.style * STYLE_WEIGHT
            + self.color_coordination * COLOR_WEIGHT
            + self.fit * FIT_WEIGHT
            + self.accessories * ACCESSORIES_WEIGHT
            + self.occasion_appropriateness * OCCASION_WEIGHT
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        [
            ("style", self.style),
            ("colorCoordination", self.color_coordination),
            ("fit", self.fit),
            ("accessories", self.accessories),
            ("occasionAppropriateness", self.occasion_appropriateness),
        ]
        .into_iter()
    }
}

/// Validated critique returned by the external model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub score: f64,
    pub category_scores: CategoryScores,
    /// Free-text feedback keyed by category name.
    pub feedback: BTreeMap<String, String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}
