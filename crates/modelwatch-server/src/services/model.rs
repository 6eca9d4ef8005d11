//! Model registry service: validation, CRUD, and probe triggers.
//!
//! Every registration and edit starts a background probe; every listing
//! probes models that have no status yet; deletion clears the status.

use std::collections::HashMap;

use modelwatch_core::{is_failure_response, ModelEndpoint, ModelEndpointId, ProbeStatus};
use tracing::info;

use crate::db;
use crate::dto::{AddModelRequest, ModelInfo, TestModelResponse, UpdateModelRequest};
use crate::error::AppError;
use crate::ServerState;

/// Checks the fields a provider needs before a record is stored.
pub fn validate(model: &ModelEndpoint) -> Result<(), AppError> {
    let missing = |field: &str| {
        AppError::BadRequest(format!(
            "Please fill in all required fields: {} is required for {} models.",
            field, model.model_type
        ))
    };

    if model.model_name.trim().is_empty() {
        return Err(missing("model_name"));
    }
    if model.api_key.trim().is_empty() {
        return Err(missing("api_key"));
    }
    let has_api_base = model.api_base.as_deref().is_some_and(|b| !b.trim().is_empty());
    if model.model_type.requires_api_base() && !has_api_base {
        return Err(missing("api_base"));
    }
    if model.model_type.requires_provider_model() && model.provider_model.trim().is_empty() {
        return Err(missing("provider_model"));
    }
    Ok(())
}

/// Applies an edit to a stored record. Empty or missing fields keep their value.
pub fn apply_update(mut model: ModelEndpoint, req: UpdateModelRequest) -> Result<ModelEndpoint, AppError> {
    if req.model_type.is_some_and(|t| t != model.model_type) {
        return Err(AppError::BadRequest("Cannot change type when editing models.".into()));
    }

    fn non_empty(value: Option<String>) -> Option<String> {
        value.filter(|v| !v.trim().is_empty())
    }

    if let Some(name) = non_empty(req.model_name) {
        model.model_name = name;
    }
    if let Some(provider_model) = non_empty(req.provider_model) {
        model.provider_model = provider_model;
    }
    if let Some(api_base) = non_empty(req.api_base) {
        model.api_base = Some(api_base);
    }
    if let Some(api_key) = non_empty(req.api_key) {
        model.api_key = api_key;
    }

    validate(&model)?;
    Ok(model)
}

/// Lists models with their status, probing any not seen before.
pub fn list(state: &ServerState) -> Result<Vec<ModelInfo>, AppError> {
    let models = {
        let conn = state.db_lock()?;
        db::list_models(&conn)?
    };

    state.prober.observe(models.iter().map(|m| &m.model_id));

    Ok(models
        .into_iter()
        .map(|model| {
            let status = state.prober.status(&model.model_id);
            ModelInfo { model, status }
        })
        .collect())
}

/// Gets a model by ID.
pub fn get(state: &ServerState, id: &ModelEndpointId) -> Result<ModelEndpoint, AppError> {
    let conn = state.db_lock()?;
    db::get_model(&conn, id)?.ok_or_else(|| AppError::NotFound(format!("Model not found: {id}")))
}

/// Registers a new model and starts probing it.
///
/// The first model in an empty registry becomes the default.
pub fn register(state: &ServerState, req: AddModelRequest) -> Result<ModelEndpointId, AppError> {
    let model = ModelEndpoint {
        model_id: ModelEndpointId::generate(),
        model_name: req.model_name.trim().to_string(),
        model_type: req.model_type,
        provider_model: req.provider_model.trim().to_string(),
        api_base: req.api_base.filter(|b| !b.trim().is_empty()),
        api_key: req.api_key,
        is_studio_default: false,
    };
    validate(&model)?;

    {
        let conn = state.db_lock()?;
        let first = db::count_models(&conn)? == 0;
        db::insert_model(&conn, &model)?;
        if first || req.set_as_default {
            db::set_default_model(&conn, &model.model_id)?;
        }
    }

    state.prober.probe(&model.model_id);
    Ok(model.model_id)
}

/// Edits a model and starts probing it again.
pub fn update(state: &ServerState, id: &ModelEndpointId, req: UpdateModelRequest) -> Result<ModelEndpoint, AppError> {
    let updated = {
        let conn = state.db_lock()?;
        let stored = db::get_model(&conn, id)?
            .ok_or_else(|| AppError::NotFound(format!("Model not found: {id}")))?;
        let updated = apply_update(stored, req)?;
        db::update_model(&conn, &updated)?;
        updated
    };

    state.prober.probe(id);
    Ok(updated)
}

/// Deletes a model and clears its status.
pub fn remove(state: &ServerState, id: &ModelEndpointId) -> Result<(), AppError> {
    let deleted = {
        let conn = state.db_lock()?;
        db::delete_model(&conn, id)?
    };
    if !deleted {
        return Err(AppError::NotFound(format!("Model not found: {id}")));
    }
    state.prober.forget(id);
    Ok(())
}

/// Makes a model the studio default.
pub fn set_default(state: &ServerState, id: &ModelEndpointId) -> Result<(), AppError> {
    let conn = state.db_lock()?;
    match db::set_default_model(&conn, id)? {
        true => Ok(()),
        false => Err(AppError::NotFound(format!("Model not found: {id}"))),
    }
}

/// Gets the studio default model.
pub fn get_default(state: &ServerState) -> Result<ModelEndpoint, AppError> {
    let conn = state.db_lock()?;
    db::get_default_model(&conn)?
        .ok_or_else(|| AppError::NotFound("No default model is set".into()))
}

/// Starts a background probe for an existing model.
pub fn probe(state: &ServerState, id: &ModelEndpointId) -> Result<ProbeStatus, AppError> {
    get(state, id)?;
    state.prober.probe(id);
    info!("Probe requested for {}", id);
    Ok(ProbeStatus::Pending)
}

/// Sends one test request and reports the literal response.
pub async fn test(state: &ServerState, id: &ModelEndpointId, message: Option<String>) -> Result<TestModelResponse, AppError> {
    get(state, id)?;
    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.prober.policy().test_prompt.clone());

    let response = state.prober.test_once(id, &message).await?;
    Ok(TestModelResponse {
        success: !is_failure_response(&response),
        response,
    })
}

/// Current status of every probed model.
pub fn statuses(state: &ServerState) -> HashMap<ModelEndpointId, ProbeStatus> {
    state.prober.snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelwatch_core::ModelType;

    fn model(model_type: ModelType) -> ModelEndpoint {
        ModelEndpoint {
            model_id: "m1".into(),
            model_name: "alias".into(),
            model_type,
            provider_model: String::new(),
            api_base: None,
            api_key: "key".into(),
            is_studio_default: false,
        }
    }

    fn rejects(model: &ModelEndpoint, field: &str) -> bool {
        matches!(validate(model), Err(AppError::BadRequest(msg)) if msg.contains(field))
    }

    #[test]
    fn name_and_key_are_always_required() {
        let mut m = model(ModelType::Openai);
        assert!(validate(&m).is_ok());

        m.model_name = "  ".into();
        assert!(rejects(&m, "model_name"));

        let mut m = model(ModelType::Anthropic);
        m.api_key.clear();
        assert!(rejects(&m, "api_key"));
    }

    #[test]
    fn api_base_required_for_hosted_types() {
        for ty in [ModelType::OpenaiCompatible, ModelType::AzureOpenai, ModelType::Caii] {
            let mut m = model(ty);
            m.provider_model = "deployment".into();
            assert!(rejects(&m, "api_base"), "{ty} should need api_base");
            m.api_base = Some("https://host/v1".into());
            assert!(validate(&m).is_ok());
        }
    }

    #[test]
    fn provider_model_required_for_azure_and_caii() {
        let mut m = model(ModelType::AzureOpenai);
        m.api_base = Some("https://azure".into());
        assert!(rejects(&m, "provider_model"));

        let mut m = model(ModelType::OpenaiCompatible);
        m.api_base = Some("http://localhost:8000/v1".into());
        assert!(validate(&m).is_ok());
    }

    #[test]
    fn update_rejects_type_change() {
        let req = UpdateModelRequest {
            model_type: Some(ModelType::Anthropic),
            ..Default::default()
        };
        let err = apply_update(model(ModelType::Openai), req).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg == "Cannot change type when editing models."));
    }

    #[test]
    fn update_keeps_fields_left_empty() {
        let req = UpdateModelRequest {
            model_type: Some(ModelType::Openai),
            model_name: Some("renamed".into()),
            api_key: Some(String::new()),
            ..Default::default()
        };
        let updated = apply_update(model(ModelType::Openai), req).unwrap();
        assert_eq!(updated.model_name, "renamed");
        assert_eq!(updated.api_key, "key");
        assert_eq!(updated.api_base, None);
    }
}
