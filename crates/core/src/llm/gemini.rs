use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{prompt, GenerateInput, Provider, TextGenerator};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = std::env::var("GEMINI_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }

    async fn generate_content(
        &self,
        req: GenerateContentRequest,
    ) -> anyhow::Result<(serde_json::Value, GenerateContentResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(&req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw_response_json = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}"),
                raw_output: Some(text),
                raw_response_json,
            }
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn make_request(&self, input: &GenerateInput, max_output_tokens: u32) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Some(ContentBlock::text(prompt::system_prompt())),
            contents: vec![ContentBlock {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt::user_prompt(input),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens,
                temperature: 0.7,
            },
        }
    }

    fn response_text(res: &GenerateContentResponse) -> Result<String, LlmDiagnosticsError> {
        let mut out = String::new();
        for candidate in &res.candidates {
            let Some(content) = &candidate.content else {
                continue;
            };
            for part in &content.parts {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&part.text);
            }
            // Only the first candidate carries the answer.
            break;
        }

        if out.trim().is_empty() {
            return Err(LlmDiagnosticsError {
                provider: Provider::Gemini,
                stage: "empty_response",
                detail: "response contained no candidate text".to_string(),
                raw_output: None,
                raw_response_json: None,
            });
        }

        Ok(out)
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate_recommendations(&self, input: &GenerateInput) -> anyhow::Result<String> {
        let (mut raw_json, mut res) = self
            .generate_content(self.make_request(input, self.max_output_tokens))
            .await?;

        // If the model ran out of output budget, retry once with a higher ceiling.
        if res.hit_token_ceiling() {
            let bumped = self.max_output_tokens.saturating_mul(2).max(2048);
            tracing::warn!(
                from = self.max_output_tokens,
                to = bumped,
                "Gemini finishReason=MAX_TOKENS; retrying once with higher max_output_tokens"
            );
            let (rj, r) = self
                .generate_content(self.make_request(input, bumped))
                .await?;
            raw_json = rj;
            res = r;
        }

        Self::response_text(&res).map_err(|mut err| {
            err.raw_response_json = Some(raw_json);
            err.into()
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ContentBlock>,
    contents: Vec<ContentBlock>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl ContentBlock {
    fn text(text: String) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    fn hit_token_ceiling(&self) -> bool {
        self.candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
            .is_some_and(|reason| reason == "MAX_TOKENS")
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ContentBlock>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_text_from_first_candidate() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {
                    "content": {
                        "role": "model",
                        "parts": [
                            {"text": "1. BTC: Solid | Risk: 30% | Confidence: 85%"},
                            {"text": "2. ETH: Growing | Risk: 40% | Confidence: 75%"}
                        ]
                    },
                    "finishReason": "STOP"
                },
                {
                    "content": {"role": "model", "parts": [{"text": "ignored"}]}
                }
            ]
        }))
        .unwrap();

        let text = GeminiClient::response_text(&res).unwrap();
        assert!(text.contains("1. BTC"));
        assert!(text.contains("2. ETH"));
        assert!(!text.contains("ignored"));
    }

    #[test]
    fn empty_candidates_are_a_diagnostics_error() {
        let res: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        let err = GeminiClient::response_text(&res).unwrap_err();
        assert_eq!(err.stage, "empty_response");
    }

    #[test]
    fn detects_token_ceiling() {
        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        assert!(res.hit_token_ceiling());

        let res: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "STOP"}]
        }))
        .unwrap();
        assert!(!res.hit_token_ceiling());
    }
}
