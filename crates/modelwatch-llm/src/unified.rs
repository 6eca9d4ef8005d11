//! Unified client that routes to the appropriate provider based on model type.

use modelwatch_core::{failure_response, ModelEndpoint, ModelError, ModelType, TestModelRequest};
use tracing::warn;

use crate::anthropic::AnthropicClient;
use crate::client::LlmClient;
use crate::LlmResponse;

/// Provider family determined from the endpoint's model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderType {
    OpenAI,
    Anthropic,
}

impl From<ModelType> for ProviderType {
    fn from(model_type: ModelType) -> Self {
        match model_type {
            ModelType::Anthropic => ProviderType::Anthropic,
            ModelType::Openai
            | ModelType::OpenaiCompatible
            | ModelType::AzureOpenai
            | ModelType::Caii => ProviderType::OpenAI,
        }
    }
}

/// Client that routes requests to OpenAI-style or Anthropic APIs.
pub struct UnifiedLlmClient {
    endpoint: ModelEndpoint,
    provider: ProviderType,
}

impl UnifiedLlmClient {
    /// Creates a client for a registered endpoint.
    pub fn for_endpoint(endpoint: &ModelEndpoint) -> Self {
        Self {
            endpoint: endpoint.clone(),
            provider: endpoint.model_type.into(),
        }
    }

    /// Returns true if this client is configured for Anthropic.
    pub fn is_anthropic(&self) -> bool {
        matches!(self.provider, ProviderType::Anthropic)
    }

    /// Sends one completion request and returns the complete response.
    pub async fn complete(&self, request: &TestModelRequest) -> Result<LlmResponse, ModelError> {
        match self.provider {
            ProviderType::OpenAI => LlmClient::new(&self.endpoint).complete(request).await,
            ProviderType::Anthropic => AnthropicClient::new(&self.endpoint).complete(request).await,
        }
    }

    /// Runs the model test operation.
    ///
    /// Returns the completion text, or the reason prefixed with the
    /// `"Model Test Failed"` marker. Never fails.
    pub async fn test(&self, request: &TestModelRequest) -> String {
        match self.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                warn!("Model test for {} failed: {}", self.endpoint.model_id, e);
                failure_response(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelwatch_core::{is_failure_response, MessageRole};

    fn endpoint(model_type: ModelType, api_base: &str) -> ModelEndpoint {
        ModelEndpoint {
            model_id: "m1".into(),
            model_name: "alias".into(),
            model_type,
            provider_model: "some-model".into(),
            api_base: Some(api_base.into()),
            api_key: "key".into(),
            is_studio_default: false,
        }
    }

    #[test]
    fn routes_by_model_type() {
        assert!(UnifiedLlmClient::for_endpoint(&endpoint(ModelType::Anthropic, "")).is_anthropic());
        for ty in [ModelType::Openai, ModelType::OpenaiCompatible, ModelType::AzureOpenai, ModelType::Caii] {
            assert!(!UnifiedLlmClient::for_endpoint(&endpoint(ty, "")).is_anthropic());
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_marker_text() {
        let client = UnifiedLlmClient::for_endpoint(&endpoint(ModelType::Caii, "http://127.0.0.1:1/v1"));
        let request = TestModelRequest {
            model_id: "m1".into(),
            completion_role: MessageRole::User,
            completion_content: "ping".into(),
            temperature: 0.1,
            max_tokens: 20,
            timeout: 2,
        };
        let text = client.test(&request).await;
        assert!(is_failure_response(&text), "unexpected response: {text}");
    }
}
