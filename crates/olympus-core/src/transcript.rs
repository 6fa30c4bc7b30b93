//! Folding stream events into a displayable transcript.
//!
//! A [`TranscriptEntry`] starts in [`TranscriptStatus::Streaming`] and is
//! mutated by [`TranscriptEntry::apply`] strictly in event order. The first
//! terminal transition (`done`, `error`, an unexpected close, or caller
//! cancellation) freezes it: every later call is a no-op.
//!
//! ```rust
//! use olympus_core::events::StreamEvent;
//! use olympus_core::transcript::{TranscriptEntry, TranscriptStatus};
//!
//! let entry = TranscriptEntry::fold(vec![
//!     StreamEvent::Token { content: "The".into() },
//!     StreamEvent::Token { content: " answer".into() },
//!     StreamEvent::Done { confidence_score: Some(0.95), query_id: Some("q1".into()) },
//! ]);
//! assert_eq!(entry.answer_text, "The answer");
//! assert_eq!(entry.status, TranscriptStatus::Complete);
//! ```

use serde::{Deserialize, Serialize};

use crate::events::StreamEvent;
use crate::models::Citation;

/// Message recorded when the transport ends without a terminal event.
pub const CONNECTION_CLOSED_MESSAGE: &str = "connection closed unexpectedly";

/// Message recorded when the caller cancels a stream that is still running.
pub const CANCELLED_MESSAGE: &str = "cancelled by caller";

/// Lifecycle of a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptStatus {
    Streaming,
    Complete,
    Error,
}

impl TranscriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptStatus::Streaming => "streaming",
            TranscriptStatus::Complete => "complete",
            TranscriptStatus::Error => "error",
        }
    }
}

/// Client-side view of one query's streamed answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub answer_text: String,
    pub citations: Vec<Citation>,
    pub confidence_score: Option<f64>,
    pub status: TranscriptStatus,
    pub error_message: Option<String>,
    /// Id of the persisted record, when the server saved the query.
    pub query_id: Option<String>,
}

impl Default for TranscriptEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptEntry {
    pub fn new() -> Self {
        Self {
            answer_text: String::new(),
            citations: Vec::new(),
            confidence_score: None,
            status: TranscriptStatus::Streaming,
            error_message: None,
            query_id: None,
        }
    }

    /// Strict left-to-right reduction of `events` over a fresh entry.
    pub fn fold<I>(events: I) -> Self
    where
        I: IntoIterator<Item = StreamEvent>,
    {
        let mut entry = Self::new();
        for event in events {
            entry.apply(event);
        }
        entry
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TranscriptStatus::Streaming
    }

    /// Apply one event. Returns whether the entry changed.
    ///
    /// A repeated `citations` event overwrites the previous list and score.
    pub fn apply(&mut self, event: StreamEvent) -> bool {
        if self.is_terminal() {
            return false;
        }

        match event {
            StreamEvent::Token { content } => {
                if content.is_empty() {
                    return false;
                }
                self.answer_text.push_str(&content);
            }
            StreamEvent::Replace { content } => {
                if self.answer_text == content {
                    return false;
                }
                self.answer_text = content;
            }
            StreamEvent::Citations {
                sources,
                confidence_score,
            } => {
                self.citations = sources;
                if confidence_score.is_some() {
                    self.confidence_score = confidence_score;
                }
            }
            StreamEvent::Done {
                confidence_score,
                query_id,
            } => {
                if confidence_score.is_some() {
                    self.confidence_score = confidence_score;
                }
                self.query_id = query_id;
                self.status = TranscriptStatus::Complete;
            }
            StreamEvent::Error { message } => {
                self.status = TranscriptStatus::Error;
                self.error_message = Some(message);
            }
        }
        true
    }

    /// Move a still-streaming entry to `error` with `message`.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TranscriptStatus::Error;
        self.error_message = Some(message.into());
        true
    }

    /// The transport ended without `done` or `error`.
    pub fn close_unexpectedly(&mut self) -> bool {
        self.fail(CONNECTION_CLOSED_MESSAGE)
    }

    /// The caller cancelled the stream. No-op once terminal.
    pub fn cancel(&mut self) -> bool {
        self.fail(CANCELLED_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(s: &str) -> StreamEvent {
        StreamEvent::Token { content: s.into() }
    }

    fn citation(index: i64, doc: &str) -> Citation {
        Citation {
            index,
            text: format!("chunk from {}", doc),
            document_id: doc.into(),
            document_title: None,
            chunk_index: 0,
            similarity_score: 0.9,
            page_number: None,
            confidence_level: None,
            relevance_rank: None,
            start_char: None,
            end_char: None,
        }
    }

    #[test]
    fn test_new_entry_is_streaming() {
        let entry = TranscriptEntry::new();
        assert_eq!(entry.status, TranscriptStatus::Streaming);
        assert!(entry.answer_text.is_empty());
        assert!(entry.citations.is_empty());
        assert_eq!(entry.confidence_score, None);
        assert_eq!(entry.error_message, None);
    }

    #[test]
    fn test_tokens_concatenate_in_order() {
        let parts = ["Lo", "rem", " ip", "sum", ", ", "dolor"];
        let entry = TranscriptEntry::fold(parts.iter().map(|p| token(p)));
        assert_eq!(entry.answer_text, parts.concat());
        assert_eq!(entry.status, TranscriptStatus::Streaming);
    }

    #[test]
    fn test_replace_discards_prior_tokens() {
        let entry = TranscriptEntry::fold(vec![
            token("draft "),
            token("answer"),
            StreamEvent::Replace {
                content: "Final".into(),
            },
            token(" answer"),
        ]);
        assert_eq!(entry.answer_text, "Final answer");
    }

    #[test]
    fn test_scenario_complete_with_citations() {
        let entry = TranscriptEntry::fold(vec![
            token("The"),
            token(" answer"),
            StreamEvent::Citations {
                sources: vec![citation(0, "d1")],
                confidence_score: Some(0.9),
            },
            StreamEvent::Done {
                confidence_score: Some(0.95),
                query_id: Some("q1".into()),
            },
        ]);
        assert_eq!(entry.answer_text, "The answer");
        assert_eq!(entry.citations.len(), 1);
        assert_eq!(entry.confidence_score, Some(0.95));
        assert_eq!(entry.status, TranscriptStatus::Complete);
        assert_eq!(entry.query_id.as_deref(), Some("q1"));
    }

    #[test]
    fn test_scenario_error_after_partial() {
        let entry = TranscriptEntry::fold(vec![
            token("Partial"),
            StreamEvent::Error {
                message: "upstream timeout".into(),
            },
        ]);
        assert_eq!(entry.answer_text, "Partial");
        assert_eq!(entry.status, TranscriptStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some("upstream timeout"));
    }

    #[test]
    fn test_close_with_no_events() {
        let mut entry = TranscriptEntry::new();
        assert!(entry.close_unexpectedly());
        assert_eq!(entry.status, TranscriptStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some(CONNECTION_CLOSED_MESSAGE));
    }

    #[test]
    fn test_repeated_citations_overwrite() {
        let entry = TranscriptEntry::fold(vec![
            StreamEvent::Citations {
                sources: vec![citation(1, "d1"), citation(2, "d2")],
                confidence_score: Some(0.4),
            },
            StreamEvent::Citations {
                sources: vec![citation(1, "d3")],
                confidence_score: Some(0.7),
            },
        ]);
        assert_eq!(entry.citations.len(), 1);
        assert_eq!(entry.citations[0].document_id, "d3");
        assert_eq!(entry.confidence_score, Some(0.7));
    }

    #[test]
    fn test_done_without_score_keeps_citation_score() {
        let entry = TranscriptEntry::fold(vec![
            StreamEvent::Citations {
                sources: vec![citation(1, "d1")],
                confidence_score: Some(0.8),
            },
            StreamEvent::Done {
                confidence_score: None,
                query_id: None,
            },
        ]);
        assert_eq!(entry.confidence_score, Some(0.8));
        assert_eq!(entry.status, TranscriptStatus::Complete);
    }

    #[test]
    fn test_events_after_done_are_ignored() {
        let mut entry = TranscriptEntry::fold(vec![
            token("ok"),
            StreamEvent::Done {
                confidence_score: Some(0.5),
                query_id: None,
            },
        ]);
        let frozen = entry.clone();

        assert!(!entry.apply(token(" more")));
        assert!(!entry.apply(StreamEvent::Replace {
            content: "changed".into()
        }));
        assert!(!entry.apply(StreamEvent::Citations {
            sources: vec![citation(1, "d1")],
            confidence_score: Some(0.1),
        }));
        assert!(!entry.apply(StreamEvent::Error {
            message: "late".into()
        }));
        assert!(!entry.close_unexpectedly());
        assert!(!entry.cancel());
        assert_eq!(entry, frozen);
    }

    #[test]
    fn test_events_after_error_are_ignored() {
        let mut entry = TranscriptEntry::fold(vec![StreamEvent::Error {
            message: "boom".into(),
        }]);
        assert!(!entry.apply(StreamEvent::Done {
            confidence_score: Some(1.0),
            query_id: Some("q".into()),
        }));
        assert_eq!(entry.status, TranscriptStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some("boom"));
        assert_eq!(entry.query_id, None);
    }

    #[test]
    fn test_cancel_streaming_entry() {
        let mut entry = TranscriptEntry::fold(vec![token("half")]);
        assert!(entry.cancel());
        assert_eq!(entry.status, TranscriptStatus::Error);
        assert_eq!(entry.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(entry.answer_text, "half");
    }

    #[test]
    fn test_fold_is_deterministic() {
        let events = vec![
            token("a"),
            StreamEvent::Replace {
                content: "b".into(),
            },
            token("c"),
            StreamEvent::Citations {
                sources: vec![citation(1, "d1")],
                confidence_score: Some(0.3),
            },
            StreamEvent::Done {
                confidence_score: Some(0.6),
                query_id: None,
            },
            token("ignored"),
        ];
        let first = TranscriptEntry::fold(events.clone());
        let second = TranscriptEntry::fold(events);
        assert_eq!(first, second);
        assert_eq!(first.answer_text, "bc");
    }
}
