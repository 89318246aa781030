//! In-memory document index with lexical ranking.
//!
//! Documents are split into overlapping sentence windows at ingestion time
//! and scored at query time by query-term overlap. Deterministic and fast
//! enough for development and tests; no embeddings involved.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::types::{DocumentChunk, DocumentInfo};

use super::DocumentRetriever;

static WORD_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"[A-Za-z0-9]+").expect("word regex is valid"));

/// Append-only chunk store. Writes take the write lock per document, so a
/// concurrent `retrieve` never observes a partially indexed document.
pub struct InMemoryDocumentIndex {
    chunk_sentences: usize,
    chunk_overlap: usize,
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryDocumentIndex {
    pub fn new(chunk_sentences: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_sentences: chunk_sentences.max(1),
            chunk_overlap,
            chunks: RwLock::new(Vec::new()),
        }
    }

    /// Sliding window over sentences: `chunk_sentences` per chunk, stepping
    /// by `chunk_sentences - chunk_overlap` so consecutive chunks share
    /// boundary sentences.
    fn window_chunks(&self, sentences: &[String]) -> Vec<String> {
        if sentences.is_empty() {
            return Vec::new();
        }

        let window = self.chunk_sentences;
        let step = window.saturating_sub(self.chunk_overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < sentences.len() {
            let end = (start + window).min(sentences.len());
            chunks.push(sentences[start..end].join(" "));
            if end == sentences.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Default for InMemoryDocumentIndex {
    fn default() -> Self {
        Self::new(6, 1)
    }
}

#[async_trait]
impl DocumentRetriever for InMemoryDocumentIndex {
    async fn index(&self, source: &str, text: &str) -> Result<usize> {
        let sentences = split_sentences(text);
        let windows = self.window_chunks(&sentences);
        let indexed_at = chrono::Utc::now().to_rfc3339();

        let mut store = self.chunks.write();
        for (i, content) in windows.into_iter().enumerate() {
            let mut metadata = HashMap::new();
            metadata.insert("chunk_index".to_string(), i.to_string());
            metadata.insert("indexed_at".to_string(), indexed_at.clone());
            store.push(DocumentChunk {
                id: Uuid::new_v4(),
                content,
                source: source.to_string(),
                score: 0.0,
                metadata,
            });
        }

        tracing::debug!(source = %source, total_chunks = store.len(), "Indexed document");
        Ok(store.len())
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<DocumentChunk>> {
        let terms = query_terms(query);

        let store = self.chunks.read();
        let mut hits: Vec<DocumentChunk> = store
            .iter()
            .filter_map(|chunk| {
                let score = overlap_score(&chunk.content, &terms);
                if score > 0.0 {
                    let mut hit = chunk.clone();
                    hit.score = score;
                    Some(hit)
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn info(&self) -> Result<DocumentInfo> {
        let store = self.chunks.read();
        let mut sources: Vec<String> = Vec::new();
        for chunk in store.iter() {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }
        Ok(DocumentInfo {
            chunk_count: store.len(),
            sources,
        })
    }
}

/// Split text into sentences, keeping the terminator with its sentence.
/// A terminator only ends a sentence when followed by whitespace, so
/// decimals like "3.5" stay intact.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_break = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_break {
                let end = i + ch.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                start = end;
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Lowercased query words of at least three characters. Short function
/// words carry no retrieval signal and only inflate the denominator.
fn query_terms(query: &str) -> HashSet<String> {
    WORD_RE
        .find_iter(&query.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 2)
        .collect()
}

/// Fraction of query terms that appear in the chunk. Zero when the query
/// has no usable terms, so such queries match nothing.
fn overlap_score(content: &str, query_terms: &HashSet<String>) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let lower = content.to_lowercase();
    let matching = query_terms
        .iter()
        .filter(|term| lower.contains(term.as_str()))
        .count();
    matching as f32 / query_terms.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_keeps_terminators() {
        let sentences = split_sentences("First point. Second point! Third point?");
        assert_eq!(
            sentences,
            vec!["First point.", "Second point!", "Third point?"]
        );
    }

    #[test]
    fn test_split_sentences_ignores_decimals() {
        let sentences = split_sentences("The rate is 3.5 percent. It rose last year.");
        assert_eq!(
            sentences,
            vec!["The rate is 3.5 percent.", "It rose last year."]
        );
    }

    #[test]
    fn test_split_sentences_keeps_unterminated_tail() {
        let sentences = split_sentences("Complete sentence. Trailing fragment");
        assert_eq!(sentences, vec!["Complete sentence.", "Trailing fragment"]);
    }

    #[test]
    fn test_window_chunks_overlap() {
        let index = InMemoryDocumentIndex::new(2, 1);
        let sentences: Vec<String> = ["One.", "Two.", "Three."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let chunks = index.window_chunks(&sentences);
        assert_eq!(chunks, vec!["One. Two.", "Two. Three."]);
    }

    #[test]
    fn test_window_chunks_short_document_single_chunk() {
        let index = InMemoryDocumentIndex::default();
        let sentences: Vec<String> = ["Only.", "Two."].iter().map(|s| s.to_string()).collect();
        let chunks = index.window_chunks(&sentences);
        assert_eq!(chunks, vec!["Only. Two."]);
    }

    #[tokio::test]
    async fn test_index_returns_running_total() {
        let index = InMemoryDocumentIndex::new(2, 0);
        let first = index
            .index("a.txt", "One. Two. Three. Four.")
            .await
            .unwrap();
        assert_eq!(first, 2);
        let second = index.index("b.txt", "Five. Six.").await.unwrap();
        assert_eq!(second, 3);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_chunk_first() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index
            .index(
                "doc.txt",
                "Climate change affects weather patterns. \
                 Bananas grow in tropical regions. \
                 Rainfall and climate shifts drive migration.",
            )
            .await
            .unwrap();

        let hits = index.retrieve("climate rainfall", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].content.contains("Rainfall and climate"));
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_retrieve_respects_top_k() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index
            .index(
                "doc.txt",
                "Solar power is growing. Solar panels are cheap. Solar output varies.",
            )
            .await
            .unwrap();

        let hits = index.retrieve("solar", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_excludes_zero_score_chunks() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index
            .index("doc.txt", "Bananas are yellow. The sky is blue.")
            .await
            .unwrap();

        let hits = index.retrieve("quantum entanglement", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_with_only_short_words_matches_nothing() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index.index("doc.txt", "It is an ok day.").await.unwrap();

        let hits = index.retrieve("is it ok", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_info_reports_counts_and_distinct_sources() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index.index("a.txt", "First. Second.").await.unwrap();
        index.index("b.txt", "Third.").await.unwrap();
        index.index("a.txt", "Fourth.").await.unwrap();

        let info = index.info().await.unwrap();
        assert_eq!(info.chunk_count, 4);
        assert_eq!(info.sources, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_empty_index_info_and_retrieve() {
        let index = InMemoryDocumentIndex::default();
        let info = index.info().await.unwrap();
        assert_eq!(info.chunk_count, 0);
        assert!(info.sources.is_empty());
        assert!(index.retrieve("anything", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_metadata_records_position() {
        let index = InMemoryDocumentIndex::new(1, 0);
        index.index("doc.txt", "Alpha. Beta.").await.unwrap();

        let hits = index.retrieve("alpha", 10).await.unwrap();
        assert_eq!(hits[0].metadata.get("chunk_index").unwrap(), "0");
        assert!(hits[0].metadata.contains_key("indexed_at"));
    }
}
