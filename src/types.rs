use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A scored passage returned by retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub content: String,
    pub source: String,
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// Snapshot of what the document index currently holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub chunk_count: usize,
    pub sources: Vec<String>,
}

/// Output of intent classification for a single query. Created fresh per
/// query, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDecision {
    pub intent: String,
    pub slots: HashMap<String, String>,
    pub is_out_of_scope: bool,
    pub missing_required_slots: Vec<String>,
    pub confidence: f32,
}

/// Final text produced for a query. `is_fallback` is true whenever no
/// generation call was made or the call failed, so callers can tell a
/// grounded answer from a canned one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseResult {
    pub text: String,
    pub is_fallback: bool,
}

impl ResponseResult {
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_fallback: true,
        }
    }

    pub fn grounded(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_fallback: false,
        }
    }
}

/// Everything the pipeline decided for one query, in caller-facing form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub intent: String,
    pub slots: HashMap<String, String>,
    pub is_out_of_scope: bool,
    pub response: String,
    pub confidence: f32,
    pub documents_used: Vec<String>,
    pub is_fallback: bool,
}
