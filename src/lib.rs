//! Document question-answering pipeline.
//!
//! A query flows through four stages: intent classification with slot
//! extraction, slot-based retrieval enhancement, document retrieval, and
//! intent-conditioned response generation. Every stage resolves its own
//! failures into a documented fallback, so [`QaEngine::answer`] always
//! returns a usable response.

pub mod config;
pub mod engine;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod schema;
pub mod trace;
pub mod types;

// Re-export primary types for convenience
pub use config::QaConfig;
pub use engine::QaEngine;
pub use schema::IntentSchema;
pub use types::{DocumentChunk, DocumentInfo, IntentDecision, QueryOutcome, ResponseResult};

// Re-export the collaborator seams
pub use llm::{ChatGenerator, ChatOptions, ChatReply, OpenRouterClient};
pub use retrieval::{DocumentRetriever, InMemoryDocumentIndex};
pub use trace::QaTraceLog;

// Re-export common types
pub use anyhow::{Error, Result};
pub use uuid::Uuid;
