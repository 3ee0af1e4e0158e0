//! Gemini `generateContent` provider

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini chat provider
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_base = api_base.unwrap_or_else(|| GEMINI_API_BASE.to_string());
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: default_model.unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };
        format!(
            "{}/models/{}:generateContent",
            self.api_base,
            model.trim_start_matches("models/")
        )
    }

    /// System messages become `systemInstruction`; assistant turns use the
    /// `model` role.
    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let system: Vec<&str> = params
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let contents: Vec<serde_json::Value> = params
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({ "role": role, "parts": [{ "text": &m.content }] })
            })
            .collect();

        let mut generation = json!({
            "temperature": params.temperature,
            "maxOutputTokens": params.max_tokens,
        });
        if params.json_mode {
            generation["responseMimeType"] = json!("application/json");
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if !system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
        }
        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let candidate = json["candidates"]
            .get(0)
            .ok_or(ProviderError::InvalidResponse)?;

        let text: String = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let finish_reason = candidate["finishReason"]
            .as_str()
            .unwrap_or("STOP")
            .to_ascii_lowercase();

        let meta = &json["usageMetadata"];
        let count = |key: &str| meta[key].as_u64().unwrap_or(0) as u32;
        let usage = Usage {
            prompt_tokens: count("promptTokenCount"),
            completion_tokens: count("candidatesTokenCount"),
            total_tokens: count("totalTokenCount"),
        };

        Ok(ChatResponse {
            content: if text.is_empty() { None } else { Some(text) },
            finish_reason,
            usage,
        })
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        let url = self.endpoint(&params.model);
        trace!("generateContent request to {}", url);
        let body = self.build_request(&params);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let json: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let error = json["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Api(error));
        }

        let response = self.parse_response(json)?;
        debug!(
            "gemini response: {} chars, finish={}",
            response.text_or_empty().len(),
            response.finish_reason
        );
        Ok(response)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
