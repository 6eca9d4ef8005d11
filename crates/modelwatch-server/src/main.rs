//! HTTP server entry point and Axum router setup.
//!
//! Loads configuration, opens the model registry, wires the health prober to
//! the registry-backed model tester, and serves the registry and probe routes.

mod db;
mod dto;
mod error;
mod handlers;
mod services;
mod tester;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::routing::{get, post};
use axum::Router;
use modelwatch_config::{AppConfig, ModelCatalog, ProbePolicy};
use modelwatch_probe::{HealthProber, InMemoryStatusStore, ModelTester};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::tester::RegistryTester;

/// Shared server state accessible from all handlers.
pub struct ServerState {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub prober: Arc<HealthProber>,
}

impl ServerState {
    /// Builds state around an open registry and the tester the prober should use.
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>, tester: Arc<dyn ModelTester>, policy: ProbePolicy) -> Self {
        let prober = HealthProber::new(tester, Arc::new(InMemoryStatusStore::new()), policy);
        Self {
            db,
            prober: Arc::new(prober),
        }
    }

    /// Acquires the database lock, converting poison errors to AppError.
    pub fn db_lock(&self) -> Result<MutexGuard<'_, rusqlite::Connection>, error::AppError> {
        self.db.lock().map_err(|e| {
            tracing::error!("DB lock poisoned: {}", e);
            error::AppError::Internal("database lock error".into())
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = load_config()?;
    let state = Arc::new(init_server_state(&config)?);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                version = ?req.version(),
            )
        })
        .on_response(|res: &Response<Body>, latency: Duration, _span: &tracing::Span| {
            info!(
                latency = %format!("{} ms", latency.as_millis()),
                status = %res.status().as_u16(),
                "finished processing request"
            );
        });

    let app = Router::new()
        .merge(model_routes().layer(trace_layer))
        .route("/health", get(handlers::health))
        .layer(cors)
        .with_state(state);

    let addr = config.server.bind_addr.as_str();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Registry and probe routes.
fn model_routes() -> Router<Arc<ServerState>> {
    Router::new()
        .route("/models", get(handlers::model::list).post(handlers::model::add))
        .route("/models/default", get(handlers::model::get_default))
        .route("/models/status", get(handlers::model::statuses))
        .route(
            "/models/{id}",
            get(handlers::model::get)
                .put(handlers::model::update)
                .delete(handlers::model::remove),
        )
        .route("/models/{id}/default", post(handlers::model::set_default))
        .route("/models/{id}/probe", post(handlers::model::probe))
        .route("/models/{id}/test", post(handlers::model::test))
}

/// Reads the optional JSON config file and applies environment overrides.
fn load_config() -> Result<AppConfig> {
    let config = match std::env::var("MODELWATCH_CONFIG") {
        Ok(path) => {
            info!("Loading config from {}", path);
            AppConfig::from_file(&path).with_context(|| format!("failed to load config '{path}'"))?
        }
        Err(_) => AppConfig::default(),
    };
    Ok(config.apply_overrides(|key| std::env::var(key).ok()))
}

/// Opens and seeds the registry, then builds the prober and starts probing known models.
fn init_server_state(config: &AppConfig) -> Result<ServerState> {
    let conn = db::init_db(&config.server.database_url)?;

    let models_dir = Path::new(&config.server.models_dir);
    if models_dir.is_dir() {
        match ModelCatalog::load_from_dir(models_dir) {
            Ok(catalog) => {
                db::seed_models(&conn, &catalog)?;
            }
            Err(e) => warn!("Failed to load model seeds: {}", e),
        }
    }

    let models = db::list_models(&conn)?;
    info!("Loaded {} registered models", models.len());
    for m in &models {
        info!("  - {} ({}, {})", m.model_name, m.model_id, m.model_type);
    }

    let db = Arc::new(Mutex::new(conn));
    let tester = Arc::new(RegistryTester::new(db.clone()));
    let state = ServerState::new(db, tester, config.probe.clone());

    state.prober.observe(models.iter().map(|m| &m.model_id));
    Ok(state)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use modelwatch_core::{ModelEndpointId, ModelError, ProbeStatus, TestModelRequest};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    /// Echoes the prompt; prompts containing "fail" get the failure marker.
    struct EchoTester;

    #[async_trait]
    impl ModelTester for EchoTester {
        async fn test_model(&self, request: &TestModelRequest) -> Result<String, ModelError> {
            match request.completion_content.contains("fail") {
                true => Ok("Model Test Failed: forced".into()),
                false => Ok(format!("echo: {}", request.completion_content)),
            }
        }
    }

    fn test_app() -> (Router, Arc<ServerState>) {
        let conn = db::init_memory_db().unwrap();
        let state = Arc::new(ServerState::new(
            Arc::new(Mutex::new(conn)),
            Arc::new(EchoTester),
            ProbePolicy::default(),
        ));
        let app = model_routes()
            .route("/health", get(handlers::health))
            .with_state(state.clone());
        (app, state)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, body: Value) -> String {
        let (status, value) = send(app, "POST", "/models", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{value}");
        value["model_id"].as_str().unwrap().to_string()
    }

    fn openai(name: &str) -> Value {
        json!({
            "model_name": name,
            "model_type": "OPENAI",
            "provider_model": "gpt-4o-mini",
            "api_key": "sk-test"
        })
    }

    async fn settle(state: &ServerState, id: &str) -> Option<ProbeStatus> {
        let id = ModelEndpointId::from(id);
        for _ in 0..1000 {
            match state.prober.status(&id) {
                Some(ProbeStatus::Pending) => tokio::time::sleep(Duration::from_millis(100)).await,
                other => return other,
            }
        }
        state.prober.status(&id)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (app, _) = test_app();
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn register_probes_and_hides_api_key() {
        let (app, state) = test_app();
        let id = register(&app, openai("gpt")).await;

        assert_eq!(settle(&state, &id).await, Some(ProbeStatus::Success));

        let (status, model) = send(&app, "GET", &format!("/models/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(model["model_name"], "gpt");
        assert!(model.get("api_key").is_none());

        let (_, statuses) = send(&app, "GET", "/models/status", None).await;
        assert_eq!(statuses[id.as_str()], "success");
    }

    #[tokio::test]
    async fn first_model_becomes_default() {
        let (app, _) = test_app();
        let first = register(&app, openai("first")).await;
        let second = register(&app, openai("second")).await;

        let (_, default) = send(&app, "GET", "/models/default", None).await;
        assert_eq!(default["model_id"], first.as_str());

        let (status, _) = send(&app, "POST", &format!("/models/{second}/default"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, default) = send(&app, "GET", "/models/default", None).await;
        assert_eq!(default["model_id"], second.as_str());
    }

    #[tokio::test]
    async fn invalid_registration_is_rejected() {
        let (app, _) = test_app();
        let (status, body) = send(
            &app,
            "POST",
            "/models",
            Some(json!({
                "model_name": "local",
                "model_type": "CAII",
                "provider_model": "llama",
                "api_key": "k"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("api_base"));

        let (_, models) = send(&app, "GET", "/models", None).await;
        assert_eq!(models.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn edit_cannot_change_type() {
        let (app, _) = test_app();
        let id = register(&app, openai("gpt")).await;

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/models/{id}"),
            Some(json!({ "model_type": "ANTHROPIC", "model_name": "claude" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Cannot change type when editing models.");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/models/{id}"),
            Some(json!({ "model_type": "OPENAI", "model_name": "renamed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["model_name"], "renamed");
        assert_eq!(body["provider_model"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn manual_test_returns_literal_response() {
        let (app, state) = test_app();
        let id = register(&app, openai("gpt")).await;
        let uri = format!("/models/{id}/test");

        let (status, body) = send(&app, "POST", &uri, Some(json!({ "message": "hello" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "echo: hello");
        assert_eq!(state.prober.status(&id.as_str().into()), Some(ProbeStatus::Success));

        let (_, body) = send(&app, "POST", &uri, Some(json!({ "message": "please fail" }))).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["response"], "Model Test Failed: forced");

        let (_, body) = send(&app, "POST", &uri, None).await;
        assert_eq!(body["response"], "echo: Hello, this is a test message. Please respond.");
    }

    #[tokio::test(start_paused = true)]
    async fn delete_clears_status() {
        let (app, state) = test_app();
        let id = register(&app, openai("gpt")).await;
        assert_eq!(settle(&state, &id).await, Some(ProbeStatus::Success));

        let (status, _) = send(&app, "DELETE", &format!("/models/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.prober.status(&id.as_str().into()), None);

        let (status, _) = send(&app, "GET", &format!("/models/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, "DELETE", &format!("/models/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_probes_unseen_models() {
        let (app, state) = test_app();
        {
            let conn = state.db_lock().unwrap();
            let mut catalog = ModelCatalog::new();
            catalog
                .extend_from_json(
                    r#"{ "model_id": "seeded", "model_name": "Seeded", "model_type": "OPENAI", "api_key": "k" }"#,
                )
                .unwrap();
            db::seed_models(&conn, &catalog).unwrap();
        }
        assert_eq!(state.prober.status(&"seeded".into()), None);

        let (status, models) = send(&app, "GET", "/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(models[0]["model_id"], "seeded");
        assert_eq!(models[0]["status"], "pending");
        assert_eq!(models[0]["is_studio_default"], true);

        assert_eq!(settle(&state, "seeded").await, Some(ProbeStatus::Success));
    }

    #[tokio::test]
    async fn probe_unknown_model_is_not_found() {
        let (app, _) = test_app();
        let (status, body) = send(&app, "POST", "/models/missing/probe", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_route_accepts_and_reports_pending() {
        let (app, state) = test_app();
        let id = register(&app, openai("gpt")).await;
        settle(&state, &id).await;

        let (status, body) = send(&app, "POST", &format!("/models/{id}/probe"), None).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        assert_eq!(settle(&state, &id).await, Some(ProbeStatus::Success));
    }
}
