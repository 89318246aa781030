//! Document retrieval boundary.
//!
//! The pipeline only ever sees [`DocumentRetriever`]: an index that accepts
//! raw document text and hands back ranked chunks for a query. The bundled
//! [`InMemoryDocumentIndex`] covers tests and development; vector-backed
//! engines plug in behind the same trait.

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{DocumentChunk, DocumentInfo};

pub mod memory;

// Re-export commonly used types
pub use memory::InMemoryDocumentIndex;

/// Ranked-passage lookup over whatever store backs the pipeline.
///
/// Ordering contract: `retrieve` returns chunks by decreasing relevance,
/// at most `top_k` of them. Failures are plain errors; the caller decides
/// whether an empty result is an acceptable substitute.
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Split `text` into chunks and append them to the index. Returns the
    /// index's new total chunk count.
    async fn index(&self, source: &str, text: &str) -> Result<usize>;

    /// Return up to `top_k` chunks relevant to `query`, best first.
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<DocumentChunk>>;

    /// Snapshot of chunk count and distinct source names.
    async fn info(&self) -> Result<DocumentInfo>;
}
