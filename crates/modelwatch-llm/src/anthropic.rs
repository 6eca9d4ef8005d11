//! Anthropic Claude API client.

use std::time::{Duration, Instant};

use modelwatch_core::{MessageRole, ModelEndpoint, ModelError, TestModelRequest};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{LlmMetrics, LlmResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

/// Client for Anthropic's Messages API.
pub struct AnthropicClient {
    client: Client,
    url: String,
    model: String,
    api_key: String,
}

impl AnthropicClient {
    /// Creates a client for the given endpoint record.
    ///
    /// An `api_base` overrides the public API URL (for proxies and gateways).
    pub fn new(endpoint: &ModelEndpoint) -> Self {
        let url = match endpoint.api_base.as_deref().filter(|b| !b.is_empty()) {
            Some(base) => format!("{}/v1/messages", base.trim_end_matches('/').trim_end_matches("/v1")),
            None => ANTHROPIC_API_URL.to_string(),
        };
        Self {
            client: Client::new(),
            url,
            model: endpoint.target_model().to_string(),
            api_key: endpoint.api_key.clone(),
        }
    }

    /// Sends one non-streaming request, bounded by the request's timeout.
    pub async fn complete(&self, request: &TestModelRequest) -> Result<LlmResponse, ModelError> {
        let start = Instant::now();

        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: vec![AnthropicMessage {
                role: match request.completion_role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: &request.completion_content,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(Duration::from_secs(request.timeout))
            .json(&body)
            .send()
            .await
            .map_err(|e| match e.is_timeout() {
                true => ModelError::Timeout(request.timeout),
                false => ModelError::LlmError(e.to_string()),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::LlmError(format!(
                "Anthropic API error {}: {}",
                status, body
            )));
        }

        let resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ModelError::ParseError(e.to_string()))?;

        let content = resp.content.into_iter().map(|c| c.text).collect::<Vec<_>>().join("");
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!("Anthropic: {}ms", elapsed_ms);

        Ok(LlmResponse {
            content,
            metrics: LlmMetrics {
                input_tokens: resp.usage.input_tokens.unwrap_or(0),
                output_tokens: resp.usage.output_tokens.unwrap_or(0),
                elapsed_ms,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelwatch_core::ModelType;

    fn endpoint(api_base: Option<&str>) -> ModelEndpoint {
        ModelEndpoint {
            model_id: "claude".into(),
            model_name: "Claude".into(),
            model_type: ModelType::Anthropic,
            provider_model: "claude-haiku-4-5".into(),
            api_base: api_base.map(String::from),
            api_key: "key".into(),
            is_studio_default: false,
        }
    }

    #[test]
    fn url_defaults_to_public_api() {
        assert_eq!(AnthropicClient::new(&endpoint(None)).url, ANTHROPIC_API_URL);
        assert_eq!(AnthropicClient::new(&endpoint(Some(""))).url, ANTHROPIC_API_URL);
    }

    #[test]
    fn api_base_overrides_url() {
        let client = AnthropicClient::new(&endpoint(Some("https://gateway.local/v1/")));
        assert_eq!(client.url, "https://gateway.local/v1/messages");
    }

    #[test]
    fn request_body_shape() {
        let body = AnthropicRequest {
            model: "claude-haiku-4-5",
            max_tokens: 20,
            temperature: 0.1,
            messages: vec![AnthropicMessage { role: "user", content: "ping" }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["max_tokens"], 20);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "ping");
    }
}
