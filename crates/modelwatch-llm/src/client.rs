//! OpenAI-compatible completion client.
//!
//! Works with the OpenAI API, Azure OpenAI deployments, and any compatible
//! endpoint (vLLM, Ollama's /v1, Cloudera AI Inference).

use std::time::{Duration, Instant};

use async_openai::{
    config::{AzureConfig, OpenAIConfig},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use modelwatch_core::{MessageRole, ModelEndpoint, ModelError, ModelType, TestModelRequest};
use tracing::{debug, info};

/// API version used for Azure OpenAI deployments.
const AZURE_API_VERSION: &str = "2024-10-21";

/// Token usage and timing metrics from an LLM call.
#[derive(Debug, Clone, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Complete response from an LLM call.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub metrics: LlmMetrics,
}

/// Converts any error into a ModelError::LlmError.
pub(crate) fn llm_err(e: impl ToString) -> ModelError {
    ModelError::LlmError(e.to_string())
}

/// Builds the single-message list for a test request.
fn build_messages(request: &TestModelRequest) -> Result<Vec<ChatCompletionRequestMessage>, ModelError> {
    let content = request.completion_content.as_str();
    let message = match request.completion_role {
        MessageRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(llm_err)?,
        ),
        MessageRole::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(content)
                .build()
                .map_err(llm_err)?,
        ),
    };
    Ok(vec![message])
}

/// Extracts content and metrics from a completion response.
///
/// A choice without content (e.g. a token budget spent on reasoning) yields
/// an empty string rather than an error: the endpoint did answer.
fn extract_response(response: CreateChatCompletionResponse, elapsed_ms: u64) -> Result<LlmResponse, ModelError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::LlmError("No choices in response".into()))?;
    let content = choice.message.content.unwrap_or_default();

    let (input_tokens, output_tokens) = response
        .usage
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    info!(
        "LLM: {}ms, tokens: {}/{} (in/out)",
        elapsed_ms, input_tokens, output_tokens
    );

    Ok(LlmResponse {
        content,
        metrics: LlmMetrics { input_tokens, output_tokens, elapsed_ms },
    })
}

enum Backend {
    OpenAi(Client<OpenAIConfig>),
    Azure(Client<AzureConfig>),
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    backend: Backend,
    model: String,
}

impl LlmClient {
    /// Creates a client for the given endpoint record.
    ///
    /// Azure endpoints use `provider_model` as the deployment id.
    pub fn new(endpoint: &ModelEndpoint) -> Self {
        let backend = match endpoint.model_type {
            ModelType::AzureOpenai => {
                let config = AzureConfig::new()
                    .with_api_base(endpoint.api_base.clone().unwrap_or_default())
                    .with_api_key(endpoint.api_key.clone())
                    .with_deployment_id(endpoint.target_model())
                    .with_api_version(AZURE_API_VERSION);
                Backend::Azure(Client::with_config(config))
            }
            _ => {
                let mut config = OpenAIConfig::new().with_api_key(endpoint.api_key.clone());
                if let Some(base) = endpoint.api_base.as_deref().filter(|b| !b.is_empty()) {
                    config = config.with_api_base(base);
                }
                Backend::OpenAi(Client::with_config(config))
            }
        };

        Self {
            backend,
            model: endpoint.target_model().to_string(),
        }
    }

    /// Sends one completion request, bounded by the request's timeout.
    pub async fn complete(&self, request: &TestModelRequest) -> Result<LlmResponse, ModelError> {
        let start = Instant::now();
        let chat_request = self.build_request(request)?;
        debug!("Sending test completion to {} ({} tokens max)", self.model, request.max_tokens);

        let call = async {
            match &self.backend {
                Backend::OpenAi(client) => client.chat().create(chat_request).await,
                Backend::Azure(client) => client.chat().create(chat_request).await,
            }
        };

        let response = tokio::time::timeout(Duration::from_secs(request.timeout), call)
            .await
            .map_err(|_| ModelError::Timeout(request.timeout))?
            .map_err(llm_err)?;

        extract_response(response, start.elapsed().as_millis() as u64)
    }

    #[allow(deprecated)]
    fn build_request(&self, request: &TestModelRequest) -> Result<CreateChatCompletionRequest, ModelError> {
        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(build_messages(request)?)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(llm_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelwatch_core::ModelEndpointId;

    fn endpoint(model_type: ModelType, api_base: Option<&str>) -> ModelEndpoint {
        ModelEndpoint {
            model_id: "m1".into(),
            model_name: "alias".into(),
            model_type,
            provider_model: "gpt-4o-mini".into(),
            api_base: api_base.map(String::from),
            api_key: "sk-test".into(),
            is_studio_default: false,
        }
    }

    fn request(timeout: u64) -> TestModelRequest {
        TestModelRequest {
            model_id: ModelEndpointId::from("m1"),
            completion_role: MessageRole::User,
            completion_content: "ping".into(),
            temperature: 0.1,
            max_tokens: 20,
            timeout,
        }
    }

    #[test]
    #[allow(deprecated)]
    fn request_carries_test_parameters() {
        let client = LlmClient::new(&endpoint(ModelType::Openai, None));
        let built = client.build_request(&request(2)).unwrap();
        assert_eq!(built.model, "gpt-4o-mini");
        assert_eq!(built.temperature, Some(0.1));
        assert_eq!(built.max_tokens, Some(20));
        assert_eq!(built.messages.len(), 1);
        assert!(matches!(built.messages[0], ChatCompletionRequestMessage::User(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let client = LlmClient::new(&endpoint(ModelType::OpenaiCompatible, Some("http://127.0.0.1:1/v1")));
        let result = client.complete(&request(2)).await;
        assert!(result.is_err());
    }
}
