use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::AnalysisError;
use crate::config::AnalysisConfig;

pub const OUTFIT_PROMPT: &str = r#"
Analyze this outfit image and provide a detailed fashion assessment.

SCORING CRITERIA:
- Style: Evaluate trend alignment, outfit coherence, and personal expression (0-10)
- Color Coordination: Assess color harmony, contrast, and seasonal appropriateness (0-10)
- Fit: Evaluate how well the clothes fit the person's body type (0-10)
- Accessories: Rate the selection and coordination of accessories (0-10)
- Occasion Appropriateness: Determine if the outfit is suitable for its likely context (0-10)

CALCULATE THE OVERALL SCORE:
- Calculate a weighted average of the above scores (Style 30%, Color 25%, Fit 25%, Accessories 10%, Occasion 10%)
- Be critical and objective in your assessment
- Use the full 1-10 range; do not default to 7
- Scores of 9-10 are for truly exceptional outfits; poor outfits may score 1-4

DETAILED FEEDBACK:
Provide specific, constructive feedback for each category and clear recommendations for improvement.

FORMAT YOUR RESPONSE AS CLEAN JSON WITHOUT ANY MARKDOWN FORMATTING, CODE BLOCKS, OR EXTRA TEXT.
USE THIS EXACT STRUCTURE:
{
  "score": number,
  "categoryScores": {
    "style": number,
    "colorCoordination": number,
    "fit": number,
    "accessories": number,
    "occasionAppropriateness": number
  },
  "feedback": {
    "style": "string",
    "colorCoordination": "string",
    "fit": "string",
    "accessories": "string",
    "occasionAppropriateness": "string"
  },
  "recommendations": ["string", "string", "string"]
}
"#;

/// Client for a vision-capable generative model.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Sends the prompt with one inline image and returns the model's text.
    async fn generate(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, AnalysisError>;
}

/// Google Gemini `generateContent` over REST.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    /// `None` when no API key is configured.
    pub fn from_config(cfg: &AnalysisConfig) -> Option<Self> {
        let api_key = cfg.api_key.clone()?;
        info!(model = %cfg.model, "analysis gateway configured");
        Some(Self {
            http: reqwest::Client::new(),
            api_key,
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 2],
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    pub(crate) fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

#[async_trait]
impl AnalysisClient for GeminiClient {
    #[instrument(skip_all)]
    async fn generate(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, AnalysisError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: prompt },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type,
                            data: Base64::encode_string(image),
                        },
                    },
                ],
            }],
        };

        let res = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Unavailable(e.without_url().to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(AnalysisError::Unavailable(format!(
                "model returned {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|e| AnalysisError::Unavailable(format!("unreadable model response: {e}")))?;

        let text = parsed
            .text()
            .ok_or_else(|| AnalysisError::Unavailable("model returned no text".into()))?;
        debug!(model = %self.model, chars = text.len(), "model responded");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_inline_data_shape() {
        let body = GenerateRequest {
            contents: [Content {
                parts: [
                    Part::Text { text: "hi" },
                    Part::Image {
                        inline_data: InlineData {
                            mime_type: "image/png",
                            data: Base64::encode_string(b"abc"),
                        },
                    },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["mime_type"], "image/png");
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "YWJj");
    }

    #[test]
    fn response_text_joins_parts_of_first_candidate() {
        let res: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}},
                               {"content":{"parts":[{"text":"ignored"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(res.text().as_deref(), Some("{\"a\":1}"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"promptFeedback":{}}"#).unwrap();
        assert!(empty.text().is_none());
    }

    #[test]
    fn unconfigured_without_api_key() {
        let cfg = AnalysisConfig {
            api_key: None,
            model: "m".into(),
            base_url: "http://localhost".into(),
        };
        assert!(GeminiClient::from_config(&cfg).is_none());
    }
}
