//! Typed events carried by the query stream.
//!
//! Each SSE frame's data payload is one JSON object tagged by `type`:
//!
//! ```json
//! {"type": "token", "content": "The"}
//! {"type": "replace", "content": "The corrected answer"}
//! {"type": "citations", "sources": [...], "confidence_score": 0.9}
//! {"type": "done", "confidence_score": 0.95, "query_id": "q1"}
//! {"type": "error", "message": "upstream timeout"}
//! ```
//!
//! `done` and `error` are terminal: nothing follows them on a well-behaved
//! stream. Extra fields the client does not use (e.g. `context_used` on
//! `done`) are ignored.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Citation;

/// One event relayed by the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Append a text fragment to the in-progress answer.
    Token { content: String },

    /// Replace the whole in-progress answer.
    Replace { content: String },

    /// Source list for the answer, with an optional overall confidence.
    Citations {
        sources: Vec<Citation>,
        #[serde(default)]
        confidence_score: Option<f64>,
    },

    /// The stream completed successfully.
    Done {
        #[serde(default)]
        confidence_score: Option<f64>,
        #[serde(default)]
        query_id: Option<String>,
    },

    /// The server reported a failure. No further events follow.
    Error { message: String },
}

impl StreamEvent {
    /// Returns true for `done` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// The wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Token { .. } => "token",
            StreamEvent::Replace { .. } => "replace",
            StreamEvent::Citations { .. } => "citations",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Why a frame payload could not be turned into a [`StreamEvent`].
#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("event payload is empty")]
    Empty,

    #[error("event payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("event payload has no `type` field")]
    MissingType,

    #[error("unknown event type `{0}`")]
    UnknownType(String),

    #[error("malformed `{kind}` event: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

const KNOWN_TYPES: [&str; 5] = ["token", "replace", "citations", "done", "error"];

/// Parse one SSE data payload.
///
/// The payload is decoded in two steps so the error says whether the JSON
/// itself was broken, the tag was unknown, or a known event was missing a
/// field.
pub fn parse_event(data: &str) -> Result<StreamEvent, EventParseError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(EventParseError::Empty);
    }

    let value: serde_json::Value = serde_json::from_str(data).map_err(EventParseError::Json)?;

    let kind = value
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(EventParseError::MissingType)?
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(EventParseError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|source| EventParseError::Malformed { kind, source })
}
