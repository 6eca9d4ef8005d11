//! # Modelwatch — Health probing for LLM model endpoints
//!
//! Modelwatch keeps a registry of model endpoints and classifies each one as
//! `pending`, `success`, or `failure` by sending it small synthetic
//! completion requests in the background.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use modelwatch::prelude::*;
//! use std::sync::Arc;
//!
//! let prober = Arc::new(HealthProber::new(
//!     tester,
//!     Arc::new(InMemoryStatusStore::new()),
//!     ProbePolicy::default(),
//! ));
//!
//! prober.probe(&model_id);
//! assert_eq!(prober.status(&model_id), Some(ProbeStatus::Pending));
//! ```
//!
//! ## Crate Structure
//!
//! | Crate | Description |
//! |-------|-------------|
//! | [`modelwatch_config`] | Probe policy, server config, seed catalog |
//! | [`modelwatch_core`] | Endpoint records, probe status, failure marker |
//! | [`modelwatch_llm`] | Provider clients (OpenAI, Azure, Anthropic) |
//! | [`modelwatch_probe`] | Health prober and status store |
//!
//! ## Model Types
//!
//! - `OPENAI` — OpenAI API
//! - `OPENAI_COMPATIBLE` — Any OpenAI-compatible server at `api_base`
//! - `AZURE_OPENAI` — Azure deployment named by `provider_model`
//! - `CAII` — Hosted inference endpoint at `api_base`
//! - `ANTHROPIC` — Anthropic Messages API

// Re-export config types
pub use modelwatch_config::{AppConfig, ConfigError, ModelCatalog, ProbePolicy, ServerConfig, DEFAULT_TEST_PROMPT};

// Re-export core types
pub use modelwatch_core::{
    failure_response, is_failure_response, MessageRole, ModelEndpoint, ModelEndpointId, ModelError, ModelType,
    ProbeStatus, TestModelRequest, MODEL_TEST_FAILED_MARKER,
};

// Re-export prober
pub use modelwatch_probe::{AttemptError, HealthProber, InMemoryStatusStore, ModelTester, StatusStore};

// Re-export LLM clients
pub use modelwatch_llm::{LlmMetrics, LlmResponse, UnifiedLlmClient};

// Provider-specific clients (hidden by default, use UnifiedLlmClient instead)
#[doc(hidden)]
pub use modelwatch_llm::{AnthropicClient, LlmClient};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use modelwatch::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::{ModelEndpoint, ModelEndpointId, ModelError, ModelType, ProbeStatus, TestModelRequest};

    // Config types
    pub use crate::ProbePolicy;

    // Prober
    pub use crate::{HealthProber, InMemoryStatusStore, ModelTester, StatusStore};

    // LLM
    pub use crate::UnifiedLlmClient;
}
