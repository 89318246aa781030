//! Query-processing engine.
//!
//! Owns the wiring of classifier, retrieval enhancer, document retriever,
//! and response generator, and runs them in order for each query. The
//! collaborator seams (generation, retrieval) are trait objects, so tests
//! and alternative backends inject their own.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::config::QaConfig;
use crate::llm::{ChatGenerator, OpenRouterClient};
use crate::pipeline::{enhance_for_retrieval, IntentClassifier, ResponseGenerator};
use crate::retrieval::{DocumentRetriever, InMemoryDocumentIndex};
use crate::schema::IntentSchema;
use crate::trace::QaTraceLog;
use crate::types::{DocumentInfo, QueryOutcome};

pub struct QaEngine {
    classifier: IntentClassifier,
    responder: ResponseGenerator,
    retriever: Arc<dyn DocumentRetriever>,
    trace: Option<QaTraceLog>,
    top_k: usize,
}

impl QaEngine {
    /// Wire an engine from explicit collaborators. This is the injection
    /// point for tests and for callers bringing their own generation or
    /// retrieval backends.
    pub fn new(
        schema: Arc<IntentSchema>,
        generator: Arc<dyn ChatGenerator>,
        retriever: Arc<dyn DocumentRetriever>,
        config: &QaConfig,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(
                Arc::clone(&schema),
                Arc::clone(&generator),
                config.classification.clone(),
            ),
            responder: ResponseGenerator::new(schema, generator, config.generation.clone()),
            retriever,
            trace: None,
            top_k: config.retrieval.top_k,
        }
    }

    /// Build the default deployment: OpenRouter-backed generation, the
    /// bundled in-memory index, schema loaded from `config.schema_path`,
    /// QA log at `config.qa_log_path`.
    pub fn from_config(config: &QaConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow!("Invalid configuration: {e}"))?;

        let schema = Arc::new(IntentSchema::load(&config.schema_path));
        let generator: Arc<dyn ChatGenerator> = Arc::new(OpenRouterClient::new(
            &config.api.base_url,
            &config.api.api_key,
            config.api.connect_timeout_secs,
        )?);
        let retriever: Arc<dyn DocumentRetriever> = Arc::new(InMemoryDocumentIndex::new(
            config.retrieval.chunk_sentences,
            config.retrieval.chunk_overlap,
        ));

        Ok(Self::new(schema, generator, retriever, config)
            .with_trace_log(config.qa_log_path.clone()))
    }

    /// Record every answered query to a QA log at `path`.
    pub fn with_trace_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace = Some(QaTraceLog::new(path));
        self
    }

    /// Run the full pipeline for one query. Infallible by contract: every
    /// stage resolves its own failures into a fallback, so the caller
    /// always receives a well-formed outcome.
    pub async fn answer(&self, query: &str) -> QueryOutcome {
        tracing::info!(query = %query, "Processing query");

        let decision = self.classifier.classify(query).await;
        let retrieval_query = enhance_for_retrieval(query, &decision.slots);

        let mut chunks = Vec::new();
        if !decision.is_out_of_scope {
            match self.retriever.retrieve(&retrieval_query, self.top_k).await {
                Ok(found) => chunks = found,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Retrieval failed, answering without document context"
                    );
                }
            }
        }

        let result = self.responder.generate(query, &chunks, &decision).await;

        if let Some(trace) = &self.trace {
            if let Err(e) = trace.append(query, &result.text) {
                tracing::error!(error = %e, "Failed to write QA log entry");
            }
        }

        QueryOutcome {
            query: query.to_string(),
            intent: decision.intent,
            slots: decision.slots,
            is_out_of_scope: decision.is_out_of_scope,
            response: result.text,
            confidence: decision.confidence,
            documents_used: chunks.into_iter().map(|c| c.content).collect(),
            is_fallback: result.is_fallback,
        }
    }

    /// Add a document to the index. Returns the index's total chunk count
    /// after ingestion.
    pub async fn index_document(&self, source: &str, text: &str) -> Result<usize> {
        let total = self.retriever.index(source, text).await?;
        tracing::info!(source = %source, total_chunks = total, "Document indexed");
        Ok(total)
    }

    /// What the index currently holds.
    pub async fn document_info(&self) -> Result<DocumentInfo> {
        self.retriever.info().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatOptions, ChatReply};
    use crate::types::DocumentChunk;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use uuid::Uuid;

    struct ScriptedGenerator {
        replies: Mutex<VecDeque<ChatReply>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<ChatReply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
            }
        }
    }

    #[async_trait]
    impl ChatGenerator for ScriptedGenerator {
        async fn chat(&self, _: &str, _: &str, _: &ChatOptions) -> Result<ChatReply> {
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted reply left"))
        }
    }

    struct StubRetriever {
        chunks: Vec<DocumentChunk>,
    }

    #[async_trait]
    impl DocumentRetriever for StubRetriever {
        async fn index(&self, _: &str, _: &str) -> Result<usize> {
            Ok(self.chunks.len())
        }

        async fn retrieve(&self, _: &str, _: usize) -> Result<Vec<DocumentChunk>> {
            Ok(self.chunks.clone())
        }

        async fn info(&self) -> Result<DocumentInfo> {
            Ok(DocumentInfo {
                chunk_count: self.chunks.len(),
                sources: Vec::new(),
            })
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl DocumentRetriever for FailingRetriever {
        async fn index(&self, _: &str, _: &str) -> Result<usize> {
            Err(anyhow!("index offline"))
        }

        async fn retrieve(&self, _: &str, _: usize) -> Result<Vec<DocumentChunk>> {
            Err(anyhow!("index offline"))
        }

        async fn info(&self) -> Result<DocumentInfo> {
            Err(anyhow!("index offline"))
        }
    }

    fn chunk(content: &str) -> DocumentChunk {
        DocumentChunk {
            id: Uuid::new_v4(),
            content: content.to_string(),
            source: "test.txt".to_string(),
            score: 1.0,
            metadata: HashMap::new(),
        }
    }

    fn engine_with(
        replies: Vec<ChatReply>,
        retriever: Arc<dyn DocumentRetriever>,
    ) -> (QaEngine, Arc<IntentSchema>) {
        let schema = Arc::new(IntentSchema::builtin());
        let generator = Arc::new(ScriptedGenerator::new(replies));
        let engine = QaEngine::new(
            Arc::clone(&schema),
            generator,
            retriever,
            &QaConfig::default(),
        );
        (engine, schema)
    }

    fn out_of_scope_reply() -> ChatReply {
        ChatReply::Text(
            r#"{"intent": "out_of_scope", "slots": {}, "is_out_of_scope": true, "confidence": 0.9}"#
                .to_string(),
        )
    }

    fn climate_reply() -> ChatReply {
        ChatReply::Text(
            r#"{"intent": "document_query", "slots": {"topic": "climate"}, "is_out_of_scope": false, "confidence": 0.9}"#
                .to_string(),
        )
    }

    #[tokio::test]
    async fn test_out_of_scope_query_skips_retrieval() {
        // A retriever that would match proves retrieval was never consulted.
        let retriever = Arc::new(StubRetriever {
            chunks: vec![chunk("The weather chapter covers storms.")],
        });
        let (engine, schema) = engine_with(vec![out_of_scope_reply()], retriever);

        let outcome = engine.answer("What is the weather today?").await;

        assert_eq!(outcome.intent, "out_of_scope");
        assert!(outcome.is_out_of_scope);
        assert_eq!(outcome.response, schema.response_or("out_of_scope", ""));
        assert!(outcome.documents_used.is_empty());
        assert!(outcome.is_fallback);
    }

    #[tokio::test]
    async fn test_grounded_answer_end_to_end() {
        let retriever = Arc::new(StubRetriever {
            chunks: vec![chunk("Climate change is accelerating worldwide.")],
        });
        let answer = "Climate change is discussed as a growing global challenge.";
        let (engine, _) = engine_with(
            vec![climate_reply(), ChatReply::Text(answer.to_string())],
            retriever,
        );

        let outcome = engine.answer("What does the document say about climate?").await;

        assert_eq!(outcome.intent, "document_query");
        assert!(!outcome.is_fallback);
        assert_eq!(outcome.response, answer);
        assert_eq!(
            outcome.documents_used,
            vec!["Climate change is accelerating worldwide."]
        );
        assert_eq!(outcome.slots.get("topic").unwrap(), "climate");
    }

    #[tokio::test]
    async fn test_retrieval_failure_answers_without_context() {
        let (engine, _) = engine_with(vec![climate_reply()], Arc::new(FailingRetriever));

        let outcome = engine.answer("What does the document say about climate?").await;

        assert!(outcome.is_fallback);
        assert!(outcome.documents_used.is_empty());
        assert!(outcome.response.contains("'climate'"));
    }

    #[tokio::test]
    async fn test_qa_log_records_answers() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("qa_log.txt");

        let retriever = Arc::new(StubRetriever { chunks: Vec::new() });
        let (engine, schema) = engine_with(vec![out_of_scope_reply()], retriever);
        let engine = engine.with_trace_log(&log_path);

        engine.answer("What is the weather today?").await;

        let contents = std::fs::read_to_string(&log_path).unwrap();
        let expected = format!(
            "Question: What is the weather today?\nAnswer: {}\n{}\n",
            schema.response_or("out_of_scope", ""),
            "-".repeat(50)
        );
        assert_eq!(contents, expected);
    }

    #[tokio::test]
    async fn test_index_document_and_info() {
        let retriever = Arc::new(InMemoryDocumentIndex::new(1, 0));
        let (engine, _) = engine_with(Vec::new(), retriever);

        let first = engine
            .index_document("report.txt", "Alpha point. Beta point.")
            .await
            .unwrap();
        assert_eq!(first, 2);

        let second = engine
            .index_document("notes.txt", "Gamma point.")
            .await
            .unwrap();
        assert_eq!(second, 3);

        let info = engine.document_info().await.unwrap();
        assert_eq!(info.chunk_count, 3);
        assert_eq!(info.sources, vec!["report.txt", "notes.txt"]);
    }
}
