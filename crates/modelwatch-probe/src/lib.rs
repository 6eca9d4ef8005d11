//! Health probing for registered model endpoints.
//!
//! This crate classifies endpoints as pending, healthy, or failing:
//!
//! - [`HealthProber`] — Runs bounded probe sequences and one-off tests
//! - [`ModelTester`] — The remote "test model" operation the prober calls
//! - [`StatusStore`] / [`InMemoryStatusStore`] — Where probe status lives
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use modelwatch_probe::{HealthProber, InMemoryStatusStore};
//!
//! let prober = Arc::new(HealthProber::new(
//!     tester,
//!     Arc::new(InMemoryStatusStore::new()),
//!     ProbePolicy::default(),
//! ));
//!
//! // Fire-and-forget: status reads `pending` immediately
//! prober.probe(&model_id);
//!
//! // One attempt, response text returned to the caller
//! let text = prober.test_once(&model_id, "What is 2+2?").await?;
//! ```
//!
//! # Probe Sequence
//!
//! 1. Status is set to `pending`
//! 2. Up to `max_attempts` requests are sent (default 5)
//! 3. An attempt fails on a transport error, on exceeding its timeout, or on
//!    a response starting with `"Model Test Failed"`
//! 4. Failed attempts are followed by a fixed `retry_delay_ms` wait (default
//!    3000), except the last one
//! 5. The first passing attempt ends the sequence with `success`; exhausting
//!    all attempts ends it with `failure`
//!
//! Every `probe` starts a new generation for its endpoint. A sequence that
//! finishes after a newer one started does not write its result.

mod prober;
mod store;

use async_trait::async_trait;
use modelwatch_core::{ModelError, TestModelRequest};

pub use prober::{AttemptError, HealthProber};
pub use store::{InMemoryStatusStore, StatusStore};

/// Sends one synthetic completion request to a model endpoint.
///
/// `Ok` carries the raw response text, which may itself carry the failure
/// marker. `Err` means the request could not complete at all.
#[async_trait]
pub trait ModelTester: Send + Sync {
    async fn test_model(&self, request: &TestModelRequest) -> Result<String, ModelError>;
}
