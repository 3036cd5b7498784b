//! HTTP gateway for ChatRelay.
//!
//! Exposes the chat endpoints under `/api` plus a `/health` probe.
//! Collaborators (provider, memory, vector store) are built once at
//! startup and shared through the dispatcher.
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::{Router, http::HeaderValue, http::Method, response::Json, routing::get};
use chatrelay_chat::{ChatDispatcher, DispatcherSettings};
use chatrelay_config::AppConfig;
use chatrelay_memory::{SimpleVectorStore, build_chat_memory};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub dispatcher: ChatDispatcher,
}

impl GatewayState {
    pub fn new(config: AppConfig, dispatcher: ChatDispatcher) -> Self {
        Self { config, dispatcher }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::api_router())
        .with_state(state)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for GET requests from the configured origins. With no origins
/// configured, no cross-origin access is granted.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let cors = CorsLayer::new().allow_methods([Method::GET]);
    if origins.is_empty() {
        cors
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}

/// Build the dispatcher and its collaborators from configuration.
pub fn build_dispatcher(config: &AppConfig) -> Result<ChatDispatcher, Box<dyn std::error::Error>> {
    let router = chatrelay_providers::router::build_from_config(config)?;
    let provider = router
        .default()
        .ok_or("No default provider configured; set an API key")?;

    let settings = DispatcherSettings::from_config(config)?;
    let memory = build_chat_memory(&config.memory);

    let store_path = config.vector_store_path();
    let store = SimpleVectorStore::load(provider.clone(), &config.rag.embedding_model, &store_path)?;

    info!(
        provider = provider.name(),
        model = %settings.model,
        memory = memory.name(),
        store = %store_path.display(),
        "Dispatcher ready"
    );

    Ok(ChatDispatcher::new(provider, settings)
        .with_memory(memory)
        .with_vector_store(Arc::new(store)))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let dispatcher = build_dispatcher(&config)?;
    let app = build_router(Arc::new(GatewayState::new(config, dispatcher)));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
