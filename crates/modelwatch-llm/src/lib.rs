//! Provider clients for the model test operation.
//!
//! This crate sends the short synthetic completion used to check an endpoint:
//!
//! - [`UnifiedLlmClient`] — Recommended: routes by [`ModelType`](modelwatch_core::ModelType)
//! - [`LlmClient`] — OpenAI, Azure OpenAI, and OpenAI-compatible endpoints
//! - [`AnthropicClient`] — Claude models via the Anthropic Messages API
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use modelwatch_llm::UnifiedLlmClient;
//!
//! let client = UnifiedLlmClient::for_endpoint(&endpoint);
//! let text = client.test(&request).await;
//! if modelwatch_core::is_failure_response(&text) {
//!     eprintln!("{text}");
//! }
//! ```

mod anthropic;
mod client;
mod unified;

pub use anthropic::AnthropicClient;
pub use client::{LlmClient, LlmMetrics, LlmResponse};
pub use unified::UnifiedLlmClient;
