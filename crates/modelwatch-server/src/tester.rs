//! Model test operation backed by the endpoint registry.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use modelwatch_core::{ModelError, TestModelRequest};
use modelwatch_llm::UnifiedLlmClient;
use modelwatch_probe::ModelTester;

use crate::db;

/// Resolves the endpoint from the registry and sends the request to its provider.
pub struct RegistryTester {
    db: Arc<Mutex<rusqlite::Connection>>,
}

impl RegistryTester {
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ModelTester for RegistryTester {
    async fn test_model(&self, request: &TestModelRequest) -> Result<String, ModelError> {
        let endpoint = {
            let conn = self
                .db
                .lock()
                .map_err(|e| ModelError::Registry(format!("database lock error: {e}")))?;
            db::get_model(&conn, &request.model_id)
                .map_err(|e| ModelError::Registry(format!("{e:#}")))?
                .ok_or_else(|| ModelError::NotFound(request.model_id.to_string()))?
        };

        Ok(UnifiedLlmClient::for_endpoint(&endpoint).test(request).await)
    }
}
