//! Natural-language filter extraction.
//!
//! Maps a free-text request ("best phones under 15000 with good camera") to
//! `RawFilters` by asking an OpenAI-compatible chat model to call a
//! `search_phones` function. The output is never validated here beyond
//! JSON parsing; normalization decides what is usable.

use std::future::Future;
use std::time::Duration;

use phonefinder_model::RawFilters;
use serde_json::{json, Value};
use thiserror::Error;

const TOOL_NAME: &str = "search_phones";

const SYSTEM_PROMPT: &str = "Extract structured search parameters for phone queries. \
                             Correct the brand name if user made a typo.";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Extractor request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Extractor returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("No API key configured for the extractor")]
    MissingApiKey,
}

/// Trait for filter extractors.
pub trait FilterExtractor {
    fn extract(&self, text: &str) -> impl Future<Output = Result<RawFilters, ExtractError>> + Send;
}

/// Extractor endpoint configuration.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Base URL of the OpenAI-compatible API
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Function-calling extractor against a chat completions endpoint.
pub struct OpenAiExtractor {
    config: ExtractorConfig,
    client: reqwest::Client,
}

impl OpenAiExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ExtractError> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl FilterExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str) -> Result<RawFilters, ExtractError> {
        let body = request_body(&self.config.model, text);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_base))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractError::Status { status, body });
        }

        let json: Value = response.json().await?;
        let filters = parse_tool_call(&json);

        tracing::debug!(filters = ?filters, "Extracted search filters");

        Ok(filters)
    }
}

/// Build the chat completions request for one user message.
pub fn request_body(model: &str, message: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": message },
        ],
        "tools": [search_phones_tool()],
        "tool_choice": "auto",
    })
}

fn search_phones_tool() -> Value {
    let number = |description: &str| json!({ "type": "number", "description": description });
    let string = |description: &str| json!({ "type": "string", "description": description });

    json!({
        "type": "function",
        "function": {
            "name": TOOL_NAME,
            "description": "Extracts search parameters from a natural language query.",
            "parameters": {
                "type": "object",
                "properties": {
                    "name": string("Phone model name (e.g., 'Redmi A4 5G', 'Galaxy S23')."),
                    "price_min": number("Minimum phone price."),
                    "price_max": number("Maximum phone price."),
                    "ram": number("Exact RAM in GB (e.g., 6, 8)."),
                    "ram_min": number("Minimum RAM in GB."),
                    "ram_max": number("Maximum RAM in GB."),
                    "storage": number("Exact storage in GB (e.g., 128, 256)."),
                    "storage_min": number("Minimum storage in GB."),
                    "storage_max": number("Maximum storage in GB."),
                    "brand": string("Phone brand (e.g., 'Xiaomi', 'Samsung')."),
                    "rating_min": number("Minimum rating (e.g., 4, 4.5)."),
                    "isInStock": { "type": "boolean", "description": "Whether the phone is in stock." },
                    "popularity_min": number("Minimum purchase count (e.g., 1000 for 1K+)."),
                    "reviews_min": number("Minimum number of reviews."),
                    "search_term": string("General search term to match against the full name of the phone."),
                    "has_feature": string("Specific feature the phone should have (e.g., '5G', 'fast charging', '120Hz')."),
                    "camera_quality": string("Camera specification (e.g., '50MP', 'dual camera')."),
                },
                "required": [],
            },
        },
    })
}

/// Read `search_phones` arguments from a chat completions response.
///
/// Missing tool calls and unparseable arguments yield empty filters.
pub fn parse_tool_call(response: &Value) -> RawFilters {
    let tool_calls = response
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("tool_calls"))
        .and_then(|calls| calls.as_array());

    let Some(tool_calls) = tool_calls else {
        tracing::debug!("Extractor response has no tool calls");
        return RawFilters::default();
    };

    let arguments = tool_calls
        .iter()
        .filter_map(|call| call.get("function"))
        .find(|function| function.get("name").and_then(|n| n.as_str()) == Some(TOOL_NAME))
        .and_then(|function| function.get("arguments"))
        .and_then(|arguments| arguments.as_str());

    match arguments.map(serde_json::from_str::<Value>) {
        Some(Ok(value)) => RawFilters::from_value(value),
        Some(Err(err)) => {
            tracing::warn!(error = %err, "Dropping unparseable extractor arguments");
            RawFilters::default()
        }
        None => RawFilters::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_arguments(arguments: &str) -> Value {
        json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": { "name": "search_phones", "arguments": arguments }
                    }]
                }
            }]
        })
    }

    #[test]
    fn test_parses_tool_arguments() {
        let response =
            response_with_arguments(r#"{"price_max": 15000, "camera_quality": "good camera"}"#);
        let filters = parse_tool_call(&response);
        assert_eq!(filters.price_max, Some(json!(15000)));
        assert_eq!(filters.camera_quality, Some(json!("good camera")));
    }

    #[test]
    fn test_bad_arguments_yield_empty_filters() {
        assert!(parse_tool_call(&response_with_arguments("{not json")).is_empty());
    }

    #[test]
    fn test_plain_reply_yields_empty_filters() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Hello!" } }]
        });
        assert!(parse_tool_call(&response).is_empty());
    }

    #[test]
    fn test_request_body_declares_tool() {
        let body = request_body("gpt-4o-mini", "phones under 20000");
        assert_eq!(body["tools"][0]["function"]["name"], json!("search_phones"));
        assert_eq!(body["messages"][1]["content"], json!("phones under 20000"));
    }

    #[test]
    fn test_missing_api_key() {
        assert!(matches!(
            OpenAiExtractor::new(ExtractorConfig::default()),
            Err(ExtractError::MissingApiKey)
        ));
    }
}
