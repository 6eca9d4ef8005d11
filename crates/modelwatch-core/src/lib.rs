//! Core domain types and error definitions for modelwatch.
//!
//! This crate provides the fundamental types shared across the modelwatch crates:
//!
//! - [`ModelError`] — Error type for registry and provider operations
//! - [`ModelEndpointId`] and [`ModelEndpoint`] — Registered model endpoints
//! - [`ModelType`] — Supported provider kinds
//! - [`ProbeStatus`] — Health classification of an endpoint
//! - [`TestModelRequest`] — A single synthetic completion request
//!
//! # Example
//!
//! ```rust
//! use modelwatch_core::{is_failure_response, MessageRole, ModelEndpointId, TestModelRequest};
//!
//! let request = TestModelRequest {
//!     model_id: ModelEndpointId::from("gpt-4o"),
//!     completion_role: MessageRole::User,
//!     completion_content: "Hello!".to_string(),
//!     temperature: 0.1,
//!     max_tokens: 20,
//!     timeout: 2,
//! };
//!
//! assert!(is_failure_response("Model Test Failed: timeout"));
//! assert!(!is_failure_response("Hi there"));
//! # let _ = request;
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix the remote test operation puts on every failed completion.
///
/// This is the only failure discriminant on the wire; changing it breaks
/// every caller that classifies responses.
pub const MODEL_TEST_FAILED_MARKER: &str = "Model Test Failed";

/// Returns true if a test response carries the failure marker.
pub fn is_failure_response(text: &str) -> bool {
    text.starts_with(MODEL_TEST_FAILED_MARKER)
}

/// Formats a failure reason the way the remote test operation reports it.
pub fn failure_response(reason: impl fmt::Display) -> String {
    format!("{MODEL_TEST_FAILED_MARKER}: {reason}")
}

/// Errors that can occur during registry or provider operations.
#[derive(Error, Debug)]
pub enum ModelError {
    /// LLM API request failed.
    #[error("LLM request failed: {0}")]
    LlmError(String),

    /// The request did not complete within its timeout.
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// No endpoint is registered under the given id.
    #[error("Model not found: {0}")]
    NotFound(String),

    /// Endpoint record failed validation.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Failed to parse a provider response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Registry storage failed.
    #[error("Registry error: {0}")]
    Registry(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::ParseError(err.to_string())
    }
}

/// Opaque identifier of a registered model endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelEndpointId(String);

impl ModelEndpointId {
    /// Wraps an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier for a new registration.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelEndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelEndpointId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ModelEndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Health classification of a model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// A probe sequence is running.
    Pending,
    /// The endpoint answered a completion request.
    Success,
    /// Every attempt of the last sequence failed.
    Failure,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeStatus::Pending => "pending",
            ProbeStatus::Success => "success",
            ProbeStatus::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Provider kind behind a model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelType {
    Openai,
    OpenaiCompatible,
    AzureOpenai,
    /// Cloudera AI Inference, served over an OpenAI-compatible API.
    Caii,
    Anthropic,
}

impl ModelType {
    /// Returns the wire name (e.g. `OPENAI_COMPATIBLE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Openai => "OPENAI",
            ModelType::OpenaiCompatible => "OPENAI_COMPATIBLE",
            ModelType::AzureOpenai => "AZURE_OPENAI",
            ModelType::Caii => "CAII",
            ModelType::Anthropic => "ANTHROPIC",
        }
    }

    /// Whether registration must supply an `api_base`.
    pub fn requires_api_base(&self) -> bool {
        matches!(
            self,
            ModelType::OpenaiCompatible | ModelType::AzureOpenai | ModelType::Caii
        )
    }

    /// Whether registration must supply a `provider_model`.
    pub fn requires_provider_model(&self) -> bool {
        matches!(self, ModelType::AzureOpenai | ModelType::Caii)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPENAI" => Ok(ModelType::Openai),
            "OPENAI_COMPATIBLE" => Ok(ModelType::OpenaiCompatible),
            "AZURE_OPENAI" => Ok(ModelType::AzureOpenai),
            "CAII" => Ok(ModelType::Caii),
            "ANTHROPIC" => Ok(ModelType::Anthropic),
            other => Err(ModelError::InvalidModel(format!("unknown model type '{other}'"))),
        }
    }
}

/// A registered model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEndpoint {
    /// Registry identifier.
    pub model_id: ModelEndpointId,
    /// Human-readable alias.
    pub model_name: String,
    pub model_type: ModelType,
    /// Model name on the provider side (e.g. "gpt-4o", an Azure deployment).
    #[serde(default)]
    pub provider_model: String,
    /// Optional API base URL for self-hosted or alternative endpoints.
    #[serde(default)]
    pub api_base: Option<String>,
    /// Provider credential. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub is_studio_default: bool,
}

impl ModelEndpoint {
    /// The model name sent to the provider, falling back to the alias.
    pub fn target_model(&self) -> &str {
        if self.provider_model.is_empty() {
            &self.model_name
        } else {
            &self.provider_model
        }
    }
}

/// Role of the single message in a test request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => f.write_str("user"),
            MessageRole::Assistant => f.write_str("assistant"),
        }
    }
}

/// One synthetic completion request sent to a model endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestModelRequest {
    pub model_id: ModelEndpointId,
    pub completion_role: MessageRole,
    pub completion_content: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_classification() {
        assert!(is_failure_response("Model Test Failed: timeout"));
        assert!(is_failure_response("Model Test Failed"));
        assert!(!is_failure_response(""));
        assert!(!is_failure_response("model test failed: lowercase is fine"));
        assert!(!is_failure_response(" Model Test Failed"));
    }

    #[test]
    fn failure_response_carries_marker() {
        let text = failure_response("connection refused");
        assert_eq!(text, "Model Test Failed: connection refused");
        assert!(is_failure_response(&text));
    }

    #[test]
    fn model_type_wire_names() {
        for ty in [
            ModelType::Openai,
            ModelType::OpenaiCompatible,
            ModelType::AzureOpenai,
            ModelType::Caii,
            ModelType::Anthropic,
        ] {
            assert_eq!(ty.as_str().parse::<ModelType>().unwrap(), ty);
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
        }
        assert!("GEMINI".parse::<ModelType>().is_err());
    }

    #[test]
    fn model_type_requirements() {
        assert!(!ModelType::Openai.requires_api_base());
        assert!(ModelType::OpenaiCompatible.requires_api_base());
        assert!(!ModelType::OpenaiCompatible.requires_provider_model());
        assert!(ModelType::AzureOpenai.requires_provider_model());
        assert!(ModelType::Caii.requires_api_base());
        assert!(!ModelType::Anthropic.requires_provider_model());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let endpoint = ModelEndpoint {
            model_id: "m1".into(),
            model_name: "gpt".into(),
            model_type: ModelType::Openai,
            provider_model: "gpt-4o".into(),
            api_base: None,
            api_key: "sk-secret".into(),
            is_studio_default: true,
        };
        let json = serde_json::to_string(&endpoint).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("\"model_type\":\"OPENAI\""));
    }

    #[test]
    fn target_model_falls_back_to_alias() {
        let mut endpoint = ModelEndpoint {
            model_id: "m1".into(),
            model_name: "llama3".into(),
            model_type: ModelType::OpenaiCompatible,
            provider_model: String::new(),
            api_base: Some("http://localhost:11434/v1".into()),
            api_key: "ollama".into(),
            is_studio_default: false,
        };
        assert_eq!(endpoint.target_model(), "llama3");
        endpoint.provider_model = "llama3:8b".into();
        assert_eq!(endpoint.target_model(), "llama3:8b");
    }

    #[test]
    fn probe_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ProbeStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(ProbeStatus::Failure.to_string(), "failure");
    }
}
