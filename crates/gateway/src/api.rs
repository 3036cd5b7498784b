//! Chat endpoints.
//!
//! - `GET /api/chat?input=…[&conversation_id=…]`: blocking completion
//! - `GET /api/chat/stream?input=…[&conversation_id=…]`: streamed completion
//! - `GET /api/rag/chat/stream?input=…`: retrieval-augmented stream

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chatrelay_chat::ChatStream;
use chatrelay_core::error::Error;
use chatrelay_core::message::ConversationId;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::SharedState;

/// Content type of streamed responses.
pub const STREAM_CONTENT_TYPE: &str = "text/html;charset=utf8";

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/chat", get(chat_handler))
        .route("/chat/stream", get(chat_stream_handler))
        .route("/rag/chat/stream", get(rag_chat_stream_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatParams {
    input: Option<String>,
    conversation_id: Option<String>,
}

impl ChatParams {
    fn input(&self) -> Result<&str, ApiError> {
        match self.input.as_deref() {
            Some(input) if !input.trim().is_empty() => Ok(input),
            _ => Err(ApiError(Error::Validation(
                "query parameter `input` is required".into(),
            ))),
        }
    }

    /// A blank id is the same as no id.
    fn conversation_id(&self) -> Option<ConversationId> {
        self.conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(ConversationId::from)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Maps dispatcher errors onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::Retrieval(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Memory(_) | Error::Config { .. } | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Query(params): Query<ChatParams>,
) -> Result<Response, ApiError> {
    let input = params.input()?;
    let conversation_id = params.conversation_id();
    info!(input_len = input.len(), memory = conversation_id.is_some(), "api/chat request");

    let answer = state.dispatcher.chat(input, conversation_id.as_ref()).await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        answer,
    )
        .into_response())
}

async fn chat_stream_handler(
    State(state): State<SharedState>,
    Query(params): Query<ChatParams>,
) -> Result<Response, ApiError> {
    let input = params.input()?;
    let conversation_id = params.conversation_id();
    info!(input_len = input.len(), memory = conversation_id.is_some(), "api/chat/stream request");

    let stream = state
        .dispatcher
        .stream_chat(input, conversation_id.as_ref())
        .await?;
    Ok(stream_response(stream))
}

async fn rag_chat_stream_handler(
    State(state): State<SharedState>,
    Query(params): Query<ChatParams>,
) -> Result<Response, ApiError> {
    let input = params.input()?;
    info!(input_len = input.len(), "api/rag/chat/stream request");

    let stream = state.dispatcher.rag_stream_chat(input).await?;
    Ok(stream_response(stream))
}

/// Chunked body fed by the stream. An error item aborts the body, so the
/// client sees a truncated response after the fragments already sent.
fn stream_response(stream: ChatStream) -> Response {
    let stream = stream.inspect(|item| {
        if let Err(e) = item {
            warn!(error = %e, "Aborting streamed response");
        }
    });
    (
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response()
}
