//! Streamed responses.
//!
//! A relay task sits between the provider's chunk channel and the
//! [`ChatStream`] handed to the caller. It forwards text fragments in
//! arrival order through a bounded channel, so a slow reader slows the
//! upstream read instead of buffering without limit. Dropping the
//! `ChatStream` closes the channel; the relay notices, stops, and drops the
//! provider receiver, which in turn releases the upstream connection.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chatrelay_core::error::{Error, ProviderError};
use chatrelay_core::memory::ChatMemory;
use chatrelay_core::message::{ConversationId, Message};
use chatrelay_core::provider::ChunkReceiver;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// An in-order, finite stream of response fragments.
///
/// Yields `Err` at most once, as its last item, when the upstream fails
/// after the stream has started.
pub struct ChatStream {
    inner: ReceiverStream<Result<String, Error>>,
}

impl ChatStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<String, Error>>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }
}

impl Stream for ChatStream {
    type Item = Result<String, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Where the assembled answer goes once the model signals completion.
pub(crate) struct AnswerSink {
    pub memory: Arc<dyn ChatMemory>,
    pub conversation_id: ConversationId,
}

/// Spawn the relay task and return the caller's end of it.
pub(crate) fn relay(upstream: ChunkReceiver, buffer: usize, sink: Option<AnswerSink>) -> ChatStream {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(run_relay(upstream, tx, sink));
    ChatStream::new(rx)
}

async fn run_relay(
    mut upstream: ChunkReceiver,
    tx: mpsc::Sender<Result<String, Error>>,
    sink: Option<AnswerSink>,
) {
    let mut answer = String::new();
    let mut fragments = 0usize;

    loop {
        let item = tokio::select! {
            _ = tx.closed() => {
                debug!(fragments, "Client went away, abandoning stream");
                return;
            }
            item = upstream.recv() => item,
        };

        match item {
            Some(Ok(chunk)) => {
                if let Some(text) = chunk.content.filter(|t| !t.is_empty()) {
                    answer.push_str(&text);
                    fragments += 1;
                    if tx.send(Ok(text)).await.is_err() {
                        debug!(fragments, "Client went away, abandoning stream");
                        return;
                    }
                }
                if chunk.done {
                    break;
                }
            }
            Some(Err(e)) => {
                warn!(error = %e, fragments, "Upstream stream failed");
                let _ = tx.send(Err(e.into())).await;
                return;
            }
            None => {
                warn!(fragments, "Upstream stream ended without completion");
                let _ = tx
                    .send(Err(ProviderError::StreamInterrupted(
                        "stream ended before completion".into(),
                    )
                    .into()))
                    .await;
                return;
            }
        }
    }

    if let Some(sink) = sink {
        // Stored before `tx` drops, so end-of-stream implies the turn is recorded
        let turn = Message::assistant(answer);
        if let Err(e) = sink.memory.add(&sink.conversation_id, vec![turn]).await {
            warn!(conversation_id = %sink.conversation_id, error = %e, "Failed to store assistant turn");
            let _ = tx.send(Err(e.into())).await;
            return;
        }
    }

    debug!(fragments, "Stream complete");
}
