//! Data transfer objects for HTTP message serialization.

use modelwatch_core::{ModelEndpoint, ModelEndpointId, ModelType, ProbeStatus};
use serde::{Deserialize, Serialize};

// === Registry Types ===

/// Request to register a new model endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AddModelRequest {
    pub model_name: String,
    pub model_type: ModelType,
    #[serde(default)]
    pub provider_model: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: String,
    /// Make this the studio default model.
    #[serde(default)]
    pub set_as_default: bool,
}

/// Response from registering a model.
#[derive(Debug, Serialize)]
pub struct AddModelResponse {
    pub success: bool,
    pub model_id: ModelEndpointId,
}

/// Request to edit a model. Missing or empty fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateModelRequest {
    /// Must match the stored type if present.
    #[serde(default)]
    pub model_type: Option<ModelType>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub provider_model: Option<String>,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A registered model together with its probe status.
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    #[serde(flatten)]
    pub model: ModelEndpoint,
    pub status: Option<ProbeStatus>,
}

/// Generic success acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// === Probe Types ===

/// Request body for a manual model test.
#[derive(Debug, Default, Deserialize)]
pub struct TestModelBody {
    /// Prompt to send; the probe prompt is used when absent.
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of a manual model test.
#[derive(Debug, Serialize)]
pub struct TestModelResponse {
    /// False when the response carries the failure marker.
    pub success: bool,
    /// Literal response text from the model.
    pub response: String,
}

/// Acknowledgement that a probe sequence was started.
#[derive(Debug, Serialize)]
pub struct ProbeStartedResponse {
    pub model_id: ModelEndpointId,
    pub status: ProbeStatus,
}
