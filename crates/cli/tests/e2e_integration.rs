//! End-to-end integration tests for ChatRelay.
//!
//! These tests drive the full HTTP router with the real memory window and
//! vector store, and a scripted model in place of the upstream API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio::sync::{Notify, mpsc};
use tower::ServiceExt;

use chatrelay_chat::{ChatDispatcher, DispatcherSettings};
use chatrelay_config::AppConfig;
use chatrelay_core::error::ProviderError;
use chatrelay_core::message::{Message, Role};
use chatrelay_core::provider::{
    ChunkReceiver, EmbeddingRequest, EmbeddingResponse, Provider, ProviderRequest,
    ProviderResponse, StreamChunk,
};
use chatrelay_core::vector_store::{Document, VectorStore};
use chatrelay_gateway::{GatewayState, build_router};
use chatrelay_memory::{SimpleVectorStore, WindowChatMemory};

// ── Mock Provider ────────────────────────────────────────────────────────

/// How the scripted model streams.
#[derive(Clone)]
enum Script {
    /// Emit these fragments, then finish.
    Fragments(Vec<&'static str>),
    /// Emit one fragment, then fail.
    FailAfter(&'static str),
    /// Emit fragments until the receiver goes away, then notify.
    Endless(Arc<Notify>),
}

/// A scripted model that records every request it receives.
///
/// Embeddings count occurrences of a few marker words.
struct ScriptedModel {
    script: Script,
    requests: Mutex<Vec<ProviderRequest>>,
}

const VOCAB: [&str; 4] = ["rust", "borrow", "coffee", "tea"];

impl ScriptedModel {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn fragments(fragments: &[&'static str]) -> Arc<Self> {
        Self::new(Script::Fragments(fragments.to_vec()))
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedModel {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let text = match &self.script {
            Script::Fragments(parts) => parts.concat(),
            _ => String::new(),
        };
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let (tx, rx) = mpsc::channel(4);
        let script = self.script.clone();

        tokio::spawn(async move {
            match script {
                Script::Fragments(parts) => {
                    for part in parts {
                        let _ = tx.send(Ok(StreamChunk::text(part))).await;
                    }
                    let _ = tx.send(Ok(StreamChunk::finished(None))).await;
                }
                Script::FailAfter(part) => {
                    let _ = tx.send(Ok(StreamChunk::text(part))).await;
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted("connection reset".into())))
                        .await;
                }
                Script::Endless(stopped) => {
                    while tx.send(Ok(StreamChunk::text("tick "))).await.is_ok() {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    stopped.notify_one();
                }
            }
        });

        Ok(rx)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let embeddings = request
            .inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect()
            })
            .collect();
        Ok(EmbeddingResponse {
            embeddings,
            model: request.model,
            usage: None,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn app_with_docs(model: Arc<ScriptedModel>, docs: &[&str]) -> Router {
    let store = SimpleVectorStore::new(model.clone(), "kw");
    store
        .add(docs.iter().map(|d| Document::new(*d)).collect())
        .await
        .unwrap();

    let dispatcher = ChatDispatcher::new(model, DispatcherSettings::default())
        .with_memory(Arc::new(WindowChatMemory::default()))
        .with_vector_store(Arc::new(store));
    build_router(Arc::new(GatewayState::new(AppConfig::default(), dispatcher)))
}

async fn app(model: Arc<ScriptedModel>) -> Router {
    app_with_docs(model, &[]).await
}

async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_blocking_and_streamed_answers_match() {
    let model = ScriptedModel::fragments(&["Ownership ", "moves ", "values."]);
    let app = app(model.clone()).await;

    let (status, blocking) = get_text(app.clone(), "/api/chat?input=Explain%20ownership").await;
    assert_eq!(status, StatusCode::OK);
    let (status, streamed) = get_text(app, "/api/chat/stream?input=Explain%20ownership").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(blocking, "Ownership moves values.");
    assert_eq!(blocking, streamed);
    for request in model.requests() {
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].content, "Explain ownership");
    }
}

#[tokio::test]
async fn e2e_conversation_memory_across_requests() {
    let model = ScriptedModel::fragments(&["Hello ", "Ana"]);
    let app = app(model.clone()).await;

    get_text(app.clone(), "/api/chat/stream?input=Hi%2C%20I%27m%20Ana&conversation_id=c1").await;
    get_text(app.clone(), "/api/chat/stream?input=What%27s%20my%20name%3F&conversation_id=c1").await;
    get_text(app, "/api/chat/stream?input=Who%20am%20I%3F&conversation_id=other").await;

    let requests = model.requests();
    let second: Vec<(Role, String)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role.clone(), m.content.clone()))
        .collect();
    assert_eq!(
        second,
        vec![
            (Role::User, "Hi, I'm Ana".to_string()),
            (Role::Assistant, "Hello Ana".to_string()),
            (Role::User, "What's my name?".to_string()),
        ]
    );

    // A different conversation starts fresh
    assert_eq!(requests[2].messages.len(), 1);
}

#[tokio::test]
async fn e2e_rag_grounds_prompt_in_top_documents() {
    let model = ScriptedModel::fragments(&["Use ", "references."]);
    let docs = [
        "Rust's borrow checker enforces borrow rules.",
        "Rust compiles to native code.",
        "Tea is steeped, not brewed.",
        "Coffee is brewed from roasted beans.",
    ];
    let app = app_with_docs(model.clone(), &docs).await;

    let (status, body) = get_text(app, "/api/rag/chat/stream?input=How%20does%20rust%20borrow%3F").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Use references.");

    let requests = model.requests();
    assert_eq!(requests.len(), 1);
    let prompt = &requests[0].messages[0].content;
    assert!(prompt.starts_with("上下文信息"));
    assert!(prompt.contains("Rust's borrow checker enforces borrow rules.\nRust compiles to native code."));
    assert!(prompt.ends_with("How does rust borrow?"));
}

#[tokio::test]
async fn e2e_rag_with_empty_store_still_answers() {
    let model = ScriptedModel::fragments(&["抱歉，我无法回答这个问题"]);
    let app = app(model.clone()).await;

    let (status, body) = get_text(app, "/api/rag/chat/stream?input=anything").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "抱歉，我无法回答这个问题");
    assert_eq!(model.requests().len(), 1);
}

#[tokio::test]
async fn e2e_missing_input_never_calls_model() {
    let model = ScriptedModel::fragments(&["unused"]);
    let app = app(model.clone()).await;

    for uri in ["/api/chat?input=", "/api/chat/stream", "/api/rag/chat/stream?input=%20%20"] {
        let (status, body) = get_text(app.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["kind"], "validation");
    }
    assert!(model.requests().is_empty());
}

#[tokio::test]
async fn e2e_mid_stream_failure_truncates_body() {
    let model = ScriptedModel::new(Script::FailAfter("partial"));
    let app = app(model).await;

    let req = Request::builder()
        .uri("/api/chat/stream?input=hi")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap();
    assert_eq!(first.into_data().unwrap(), "partial");
    assert!(body.frame().await.unwrap().is_err());
}

#[tokio::test]
async fn e2e_client_disconnect_stops_upstream() {
    let stopped = Arc::new(Notify::new());
    let model = ScriptedModel::new(Script::Endless(stopped.clone()));
    let app = app(model).await;

    let req = Request::builder()
        .uri("/api/chat/stream?input=count%20forever")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(req).await.unwrap();

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap();
    assert_eq!(first.into_data().unwrap(), "tick ");
    drop(body);

    tokio::time::timeout(Duration::from_secs(5), stopped.notified())
        .await
        .expect("upstream producer kept running after the client went away");
}

#[tokio::test]
async fn e2e_health_check() {
    let (status, body) = get_text(app(ScriptedModel::fragments(&[])).await, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
