//! Streaming query client.
//!
//! [`StreamingQueryClient::submit`] opens one SSE connection per query and
//! returns a [`QueryHandle`] exposing the live [`TranscriptEntry`].
//!
//! # Pipeline
//!
//! ```text
//!  transport ──bytes──▶ producer task ──StreamEvent──▶ consumer task ──▶ watch<TranscriptEntry>
//!                       (SSE decode + parse)   mpsc    (fold)                 │
//!                                                                      QueryHandle
//! ```
//!
//! The producer never touches the transcript. The consumer is the only
//! task that folds events, so the entry sees events strictly in arrival
//! order. Malformed payloads are logged and skipped.
//!
//! # Termination
//!
//! Every handle ends in exactly one of `complete` or `error`:
//!
//! | Cause | Result |
//! |-------|--------|
//! | `done` event | `complete`, connection closed |
//! | `error` event | `error` with the server's message |
//! | stream cannot be opened | `error`, `failed to open stream: ...` |
//! | connection drops / ends early | `error`, `connection closed unexpectedly` |
//! | [`QueryHandle::cancel`] | `error`, `cancelled by caller` (if still streaming) |
//!
//! No retries and no timeout happen here. Callers wanting a deadline cancel
//! the handle themselves.

use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use uuid::Uuid;

use olympus_core::endpoint::stream_url;
use olympus_core::events::{parse_event, StreamEvent};
use olympus_core::models::QueryRequest;
use olympus_core::sse::{SseDecoder, SseFrame, DEFAULT_MAX_LINE_BYTES};
use olympus_core::transcript::{TranscriptEntry, CONNECTION_CLOSED_MESSAGE};

use crate::config::{ApiConfig, TokenTransport};
use crate::state::TokenSource;
use crate::transport::{EventTransport, StreamTarget};

const EVENT_BUFFER: usize = 64;

/// Rejections raised by [`StreamingQueryClient::submit`] before any network
/// activity.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("query text must not be empty")]
    EmptyQuery,

    #[error("not signed in: no access token available (run `olympus auth login`)")]
    MissingToken,

    #[error("cannot build stream URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Opens query streams against one backend.
#[derive(Clone)]
pub struct StreamingQueryClient {
    base_url: String,
    stream_path: String,
    token_transport: TokenTransport,
    transport: Arc<dyn EventTransport>,
    tokens: Arc<dyn TokenSource>,
}

impl StreamingQueryClient {
    pub fn new(
        config: &ApiConfig,
        transport: Arc<dyn EventTransport>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            stream_path: config.stream_path.clone(),
            token_transport: config.token_transport,
            transport,
            tokens,
        }
    }

    /// Validate `request`, open its stream, and start folding events.
    ///
    /// The access token is read once, here. Must be called from within a
    /// tokio runtime.
    pub fn submit(&self, request: QueryRequest) -> Result<QueryHandle, SubmitError> {
        if !request.has_query_text() {
            return Err(SubmitError::EmptyQuery);
        }
        let token = self.tokens.access_token().ok_or(SubmitError::MissingToken)?;
        let target = self.target(&request, token)?;

        let id = Uuid::new_v4();
        tracing::info!(
            handle_id = %id,
            space_id = request.space_id.as_deref().unwrap_or("-"),
            persist = request.persist,
            "submitting query"
        );

        let (state, updates) = watch::channel(TranscriptEntry::new());
        let state = Arc::new(state);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let producer = tokio::spawn(produce(id, self.transport.clone(), target, events_tx));
        let producer = producer.abort_handle();
        let consumer = tokio::spawn(consume(id, events_rx, state.clone(), producer.clone()));

        Ok(QueryHandle {
            id,
            state,
            _updates: updates,
            producer,
            consumer: consumer.abort_handle(),
        })
    }

    fn target(&self, request: &QueryRequest, token: String) -> Result<StreamTarget, SubmitError> {
        let target = match self.token_transport {
            TokenTransport::Query => StreamTarget {
                url: stream_url(&self.base_url, &self.stream_path, request, Some(&token))?,
                bearer: None,
            },
            TokenTransport::Header => StreamTarget {
                url: stream_url(&self.base_url, &self.stream_path, request, None)?,
                bearer: Some(token),
            },
        };
        Ok(target)
    }
}

/// Live view of one submitted query.
///
/// Dropping the handle closes the connection.
pub struct QueryHandle {
    id: Uuid,
    state: Arc<watch::Sender<TranscriptEntry>>,
    // Keeps the channel open so snapshots are retained with no subscribers.
    _updates: watch::Receiver<TranscriptEntry>,
    producer: AbortHandle,
    consumer: AbortHandle,
}

impl QueryHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the transcript as of now.
    pub fn transcript(&self) -> TranscriptEntry {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every transcript change.
    pub fn subscribe(&self) -> watch::Receiver<TranscriptEntry> {
        self.state.subscribe()
    }

    pub fn is_finished(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Wait until the transcript reaches `complete` or `error`.
    pub async fn wait(&self) -> TranscriptEntry {
        let mut updates = self.state.subscribe();
        let result = updates.wait_for(|entry| entry.is_terminal()).await;
        match result {
            Ok(entry) => entry.clone(),
            Err(_) => self.transcript(),
        }
    }

    /// Close the connection and discard anything in flight.
    ///
    /// A still-streaming transcript moves to `error` ("cancelled by
    /// caller"). Returns false, changing nothing, if it was already terminal.
    pub fn cancel(&self) -> bool {
        self.producer.abort();
        self.consumer.abort();
        let cancelled = self.state.send_if_modified(|entry| entry.cancel());
        if cancelled {
            tracing::info!(handle_id = %self.id, "query cancelled");
        }
        cancelled
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.producer.abort();
        self.consumer.abort();
    }
}

/// What the producer hands the consumer.
#[derive(Debug)]
enum StreamMessage {
    Event(StreamEvent),
    /// The transport failed; carries the transcript error message.
    Failed(String),
}

/// Open the transport, decode SSE frames, parse events, forward in order.
async fn produce(
    id: Uuid,
    transport: Arc<dyn EventTransport>,
    target: StreamTarget,
    tx: mpsc::Sender<StreamMessage>,
) {
    let mut bytes = match transport.open(target).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(handle_id = %id, error = %e, "failed to open stream");
            let _ = tx
                .send(StreamMessage::Failed(format!("failed to open stream: {}", e)))
                .await;
            return;
        }
    };

    let mut decoder = SseDecoder::new();
    let mut dropped = 0;
    while let Some(chunk) = bytes.next().await {
        match chunk {
            Ok(chunk) => {
                let frames = decoder.feed(&chunk);
                if decoder.dropped_frames() > dropped {
                    dropped = decoder.dropped_frames();
                    tracing::warn!(
                        handle_id = %id,
                        limit_bytes = DEFAULT_MAX_LINE_BYTES,
                        dropped,
                        "dropping stream event with an overlong line"
                    );
                }
                for frame in frames {
                    if !forward(id, &tx, frame).await {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(handle_id = %id, error = %e, "stream transport error");
                let _ = tx
                    .send(StreamMessage::Failed(format!(
                        "{}: {}",
                        CONNECTION_CLOSED_MESSAGE, e
                    )))
                    .await;
                return;
            }
        }
    }

    if let Some(frame) = decoder.finish() {
        forward(id, &tx, frame).await;
    }
    tracing::debug!(handle_id = %id, "stream body ended");
}

/// Parse one frame and send it on. Returns false once the consumer is gone.
async fn forward(id: Uuid, tx: &mpsc::Sender<StreamMessage>, frame: SseFrame) -> bool {
    match parse_event(&frame.data) {
        Ok(event) => tx.send(StreamMessage::Event(event)).await.is_ok(),
        Err(e) => {
            tracing::warn!(
                handle_id = %id,
                error = %e,
                sse_event = frame.event.as_deref().unwrap_or("message"),
                "skipping malformed stream event"
            );
            true
        }
    }
}

/// Fold messages into the transcript until it turns terminal.
async fn consume(
    id: Uuid,
    mut rx: mpsc::Receiver<StreamMessage>,
    state: Arc<watch::Sender<TranscriptEntry>>,
    producer: AbortHandle,
) {
    while let Some(message) = rx.recv().await {
        match message {
            StreamMessage::Event(event) => {
                tracing::debug!(handle_id = %id, kind = event.kind(), "stream event");
                if let StreamEvent::Citations { .. } = &event {
                    if !state.borrow().citations.is_empty() {
                        tracing::debug!(handle_id = %id, "repeated citations event, keeping latest");
                    }
                }
                state.send_if_modified(|entry| entry.apply(event));
            }
            StreamMessage::Failed(message) => {
                state.send_if_modified(|entry| entry.fail(message));
            }
        }
        if state.borrow().is_terminal() {
            break;
        }
    }

    // Ended without a terminal event: the producer dropped its sender.
    state.send_if_modified(|entry| entry.close_unexpectedly());
    producer.abort();

    let entry = state.borrow();
    tracing::info!(
        handle_id = %id,
        status = entry.status.as_str(),
        chars = entry.answer_text.chars().count(),
        citations = entry.citations.len(),
        error = entry.error_message.as_deref().unwrap_or(""),
        "query stream finished"
    );
}
