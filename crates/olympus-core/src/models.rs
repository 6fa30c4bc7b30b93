//! Core data models shared by the stream client and the history API.
//!
//! These types mirror the JSON shapes the Olympus backend emits. Field names
//! are snake_case on the wire, matching the Rust field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A natural-language query to submit to the streaming endpoint.
///
/// Constructed client-side and never persisted by the client itself; the
/// backend stores it only when `persist` is set (`save_to_db=true`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query_text: String,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub persist: bool,
}

impl QueryRequest {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            space_id: None,
            user_id: None,
            persist: false,
        }
    }

    pub fn with_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// True when the query text contains something other than whitespace.
    pub fn has_query_text(&self) -> bool {
        !self.query_text.trim().is_empty()
    }
}

/// Coarse confidence bucket attached to a citation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Classify a similarity score the same way the backend does:
    /// `>= 0.8` is high, `>= 0.5` is medium, anything else is low.
    pub fn from_similarity(score: f64) -> Self {
        if score >= 0.8 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

/// A reference to a source document chunk backing part of an answer.
///
/// Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// 1-based marker used in the answer text (e.g. `[1]`).
    pub index: i64,
    pub text: String,
    pub document_id: String,
    #[serde(default)]
    pub document_title: Option<String>,
    pub chunk_index: i64,
    pub similarity_score: f64,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub confidence_level: Option<ConfidenceLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_rank: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_char: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_char: Option<i64>,
}

impl Citation {
    /// The citation's confidence level, falling back to one derived from
    /// the similarity score when the server did not send one.
    pub fn effective_confidence(&self) -> ConfidenceLevel {
        self.confidence_level
            .unwrap_or_else(|| ConfidenceLevel::from_similarity(self.similarity_score))
    }
}

/// Processing state of a persisted query record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Processing => "processing",
            QueryStatus::Completed => "completed",
            QueryStatus::Failed => "failed",
        }
    }
}

/// Citation payload stored alongside a persisted query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordSources {
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub count: Option<i64>,
}

/// A previously persisted query, as returned by the history API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    #[serde(default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    pub query_text: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub sources: Option<RecordSources>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub status: Option<QueryStatus>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub processing_time_ms: Option<i64>,
    #[serde(default)]
    pub tokens_used: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl QueryRecord {
    /// Short label for listings: the title if present, else the query text
    /// truncated to `max_chars`.
    pub fn label(&self, max_chars: usize) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        let mut label: String = self.query_text.chars().take(max_chars).collect();
        if self.query_text.chars().count() > max_chars {
            label.push_str("...");
        }
        label
    }
}
