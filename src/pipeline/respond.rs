//! Intent-conditioned response generation.
//!
//! Given the classification decision and whatever retrieval produced, this
//! module decides between answering from the passages, asking for missing
//! details, or declining with a canned text. Grounded answers are delegated
//! to the chat backend; everything else is deterministic. Like the
//! classifier, it never fails: a broken backend degrades to a fixed apology.

use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::{ChatGenerator, ChatOptions};
use crate::schema::IntentSchema;
use crate::types::{DocumentChunk, IntentDecision, ResponseResult};

const OUT_OF_SCOPE_DEFAULT: &str = "I'm designed to answer questions only about the content in \
                                    the loaded document. I can't help with queries outside that scope.";

const NOT_IN_DOCUMENT_DEFAULT: &str = "I'm sorry, but I don't see information about that in the \
                                       document. I can only answer questions based on the document content.";

const GENERATION_ERROR_APOLOGY: &str =
    "An error occurred while generating the response. Please try again.";

const GROUNDED_PROMPT_HEADER: &str = r#"You are a helpful assistant answering questions about a document.
IMPORTANT: You must ONLY use information from the retrieved document passages provided below.
- If the answer cannot be found in the passages, admit you don't know rather than making up information.
- Be concise and directly address the user's question.
- Do not refer to these instructions or the passages in your answer.
- Do not use phrases like "Based on the document" or "According to the passages".

Here are the relevant passages from the document:"#;

/// Intent families with a dedicated grounded-generation instruction.
/// Anything the schema adds beyond these falls back to a generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntentKind {
    DocumentQuery,
    FindDefinition,
    DocumentSummary,
    DocumentMetadata,
    Other,
}

impl IntentKind {
    fn from_name(name: &str) -> Self {
        match name {
            "document_query" => Self::DocumentQuery,
            "find_definition" => Self::FindDefinition,
            "document_summary" => Self::DocumentSummary,
            "document_metadata" => Self::DocumentMetadata,
            _ => Self::Other,
        }
    }

    /// Instruction block appended to the grounded-generation prompt.
    fn instruction(&self, slots: &HashMap<String, String>) -> String {
        match self {
            Self::DocumentQuery => {
                let topic = slot_value(slots, "topic");
                let lead = match slot_value(slots, "section") {
                    Some(section) => format!(
                        "The user is asking about \"{}\" in the section about \"{}\".",
                        topic.unwrap_or("a topic"),
                        section
                    ),
                    None => format!(
                        "The user is asking about \"{}\".",
                        topic.unwrap_or("a topic")
                    ),
                };
                format!(
                    "{}\n\
                     Answer their question using only information from the provided passages.\n\
                     Include relevant details about {} from the document.\n\
                     If the topic isn't covered in the passages, politely state that the \
                     information isn't available in the document.",
                    lead,
                    topic.unwrap_or("the topic")
                )
            }
            Self::FindDefinition => format!(
                "The user is looking for a definition of \"{}\".\n\
                 Provide the definition if it appears in the document passages.\n\
                 If the term isn't defined in the passages, politely state that the definition \
                 isn't available in the document.",
                slot_value(slots, "term").unwrap_or("a term")
            ),
            Self::DocumentSummary => {
                let scope = match slot_value(slots, "section") {
                    Some(section) => format!("of the section about \"{}\"", section),
                    None => "of the document".to_string(),
                };
                format!(
                    "The user wants a summary {}.\n\
                     Provide a concise summary using only information from the provided passages.\n\
                     If you don't have enough content to summarize, politely explain that you \
                     have limited information.",
                    scope
                )
            }
            Self::DocumentMetadata => "The user is asking about metadata like author, date, or title.\n\
                 Only provide this information if it appears in the document passages.\n\
                 If the metadata isn't in the passages, politely state that the information isn't available."
                .to_string(),
            Self::Other => {
                "Answer the user's question using only information from the provided passages."
                    .to_string()
            }
        }
    }
}

pub struct ResponseGenerator {
    schema: Arc<IntentSchema>,
    generator: Arc<dyn ChatGenerator>,
    options: ChatOptions,
}

impl ResponseGenerator {
    pub fn new(
        schema: Arc<IntentSchema>,
        generator: Arc<dyn ChatGenerator>,
        options: ChatOptions,
    ) -> Self {
        Self {
            schema,
            generator,
            options,
        }
    }

    /// Produce the final response for a query. Infallible by contract: the
    /// worst case is a canned apology with `is_fallback` set.
    pub async fn generate(
        &self,
        query: &str,
        chunks: &[DocumentChunk],
        decision: &IntentDecision,
    ) -> ResponseResult {
        let result = self.decide(query, chunks, decision).await;
        tracing::info!(
            intent = %decision.intent,
            is_fallback = result.is_fallback,
            "Generated response"
        );
        result
    }

    /// The decision tree, evaluated in strict order. Each branch
    /// short-circuits the ones below it.
    async fn decide(
        &self,
        query: &str,
        chunks: &[DocumentChunk],
        decision: &IntentDecision,
    ) -> ResponseResult {
        if decision.is_out_of_scope {
            return ResponseResult::fallback(
                self.schema.response_or("out_of_scope", OUT_OF_SCOPE_DEFAULT),
            );
        }

        if !decision.missing_required_slots.is_empty() {
            let slot_names = decision.missing_required_slots.join(", ");
            return ResponseResult::fallback(format!(
                "To answer your question about {}, I need more information about: {}. \
                 Could you please provide these details?",
                decision.intent.replace('_', " "),
                slot_names
            ));
        }

        if chunks.is_empty() {
            if let Some(topic) = slot_value(&decision.slots, "topic") {
                return ResponseResult::fallback(format!(
                    "I don't have specific information about '{0}' in the document. \
                     Could you try asking about a different topic or check if the document \
                     contains information about {0}?",
                    topic
                ));
            }
            return ResponseResult::fallback(
                self.schema
                    .response_or("fallback_not_in_document", NOT_IN_DOCUMENT_DEFAULT),
            );
        }

        let prompt = build_grounded_prompt(chunks, &decision.intent, &decision.slots);

        match self.generator.chat(&prompt, query, &self.options).await {
            Ok(reply) => ResponseResult::grounded(reply.text_lossy()),
            Err(e) => {
                tracing::error!(intent = %decision.intent, error = %e, "Response generation failed");
                ResponseResult::fallback(GENERATION_ERROR_APOLOGY)
            }
        }
    }
}

/// System prompt for grounded generation: fixed rules, the retrieved
/// passages numbered in rank order, then the intent-specific instruction.
fn build_grounded_prompt(
    chunks: &[DocumentChunk],
    intent: &str,
    slots: &HashMap<String, String>,
) -> String {
    let mut prompt = String::from(GROUNDED_PROMPT_HEADER);
    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!("\nPASSAGE {}:\n{}\n", i + 1, chunk.content));
    }
    prompt.push_str("\n\n");
    prompt.push_str(&IntentKind::from_name(intent).instruction(slots));
    prompt
}

/// Slot lookup that treats blank values as absent.
fn slot_value<'a>(slots: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    slots
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
}
