//! Intent classification with slot extraction.
//!
//! The classifier embeds the full schema in an instruction prompt, asks the
//! chat backend to pick an intent, and parses the structured decision out of
//! its reply. It never fails: transport errors, unusable reply shapes, and
//! malformed JSON all resolve to a safe document_query decision so the
//! pipeline always has something to act on.

use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::llm::{ChatGenerator, ChatOptions};
use crate::schema::{IntentSchema, DOCUMENT_QUERY_INTENT, OUT_OF_SCOPE_INTENT};
use crate::types::IntentDecision;

/// Filler words skipped when deriving a topic from the raw query.
const TOPIC_STOP_WORDS: [&str; 8] = [
    "what", "does", "the", "document", "say", "about", "tell", "me",
];

const CLASSIFY_RULES: &str = r#"You are an NLU system that identifies user intent and extracts slots from queries about documents.
IMPORTANT: ALWAYS assume queries are about document content unless they are clearly about something else.
If a query mentions "the document" or asks about topics, information, content, etc., it's ALWAYS a document_query intent.

Follow these instructions:
1. Analyze the query and match it to the most appropriate intent from the schema.
2. For document_query intent, extract 'topic' from the query - this is what the user wants to know about.
3. If the query is about finding a definition in the document, use find_definition intent.
4. If the query is about summarizing the document, use document_summary intent.
5. If the query is about document metadata like author or title, use document_metadata intent.
6. ONLY use out_of_scope for queries that are clearly NOT about document content (like weather, jokes, etc.).
7. Provide a reasonable confidence level (0.0-1.0) based on how well the query matches an intent."#;

const CLASSIFY_REPLY_FORMAT: &str = r#"Respond in JSON format:
{
  "intent": "intent_name",
  "slots": {"slot_name": "extracted_value"},
  "is_out_of_scope": false,
  "confidence": 0.95
}"#;

pub struct IntentClassifier {
    schema: Arc<IntentSchema>,
    schema_prompt: String,
    generator: Arc<dyn ChatGenerator>,
    options: ChatOptions,
}

impl IntentClassifier {
    pub fn new(
        schema: Arc<IntentSchema>,
        generator: Arc<dyn ChatGenerator>,
        options: ChatOptions,
    ) -> Self {
        let schema_prompt = schema.prompt_block();
        Self {
            schema,
            schema_prompt,
            generator,
            options,
        }
    }

    /// Classify a query into an [`IntentDecision`]. Infallible by contract:
    /// if everything else goes wrong the decision becomes a document_query
    /// with a topic guessed from the query itself.
    pub async fn classify(&self, query: &str) -> IntentDecision {
        match self.run_classification(query).await {
            Ok(decision) => {
                tracing::info!(
                    intent = %decision.intent,
                    confidence = decision.confidence,
                    "Classified query"
                );
                decision
            }
            Err(e) => {
                tracing::error!(query = %query, error = %e, "Intent classification failed");
                document_query_fallback(derive_topic(query, "bananas"))
            }
        }
    }

    /// One classification round trip: prompt, call, parse. Call and parse
    /// failures are absorbed here with a fixed "general" topic; a reply
    /// that carries no text at all propagates up to `classify`.
    async fn run_classification(&self, query: &str) -> Result<IntentDecision> {
        let system_prompt = self.build_system_prompt(query);
        tracing::debug!(query = %query, "Running intent classification");

        let reply = match self
            .generator
            .chat(&system_prompt, query, &self.options)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(error = %e, "Classification call failed, using safe default");
                return Ok(document_query_fallback("general"));
            }
        };

        let response_text = reply.text()?;
        tracing::debug!(response = %response_text, "Classification reply");

        match self.parse_decision(query, &response_text) {
            Some(decision) => Ok(decision),
            None => {
                tracing::error!(
                    response = %response_text,
                    "Could not parse classification reply, using safe default"
                );
                Ok(document_query_fallback("general"))
            }
        }
    }

    fn build_system_prompt(&self, query: &str) -> String {
        format!(
            "{}\n\n{}\n\nQuery: {}\n\n{}",
            CLASSIFY_RULES, self.schema_prompt, query, CLASSIFY_REPLY_FORMAT
        )
    }

    /// Read a decision out of the reply text, tolerating markdown fences and
    /// prose around the JSON object. `None` means the reply was unusable.
    fn parse_decision(&self, query: &str, response_text: &str) -> Option<IntentDecision> {
        let cleaned = response_text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();

        let json_str = extract_json_object(cleaned).unwrap_or(cleaned);
        let parsed: Value = serde_json::from_str(json_str).ok()?;

        let mut intent = parsed
            .get("intent")
            .and_then(Value::as_str)
            .unwrap_or(DOCUMENT_QUERY_INTENT)
            .to_string();
        let mut slots = string_slots(parsed.get("slots"));
        let mut is_out_of_scope = parsed
            .get("is_out_of_scope")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let mut confidence = match parsed.get("confidence") {
            Some(value) => coerce_confidence(value)?,
            None => 0.7,
        };

        // Queries that literally mention the document are never out of
        // scope, whatever the model said.
        if query.to_lowercase().contains("document")
            && (intent == OUT_OF_SCOPE_INTENT || is_out_of_scope)
        {
            intent = DOCUMENT_QUERY_INTENT.to_string();
            is_out_of_scope = false;
            confidence = confidence.max(0.7);
        }

        if intent == DOCUMENT_QUERY_INTENT && !slots.contains_key("topic") {
            slots.insert("topic".to_string(), derive_topic(query, "general"));
        }

        let missing_required_slots = self.missing_required_slots(&intent, &slots);

        Some(IntentDecision {
            intent,
            slots,
            is_out_of_scope,
            missing_required_slots,
            confidence,
        })
    }

    /// Required slots the decision is still missing, in schema declaration
    /// order. Whitespace-only slot values count as missing.
    fn missing_required_slots(
        &self,
        intent: &str,
        slots: &HashMap<String, String>,
    ) -> Vec<String> {
        self.schema
            .required_slots(intent)
            .into_iter()
            .filter(|name| slots.get(*name).map_or(true, |value| value.trim().is_empty()))
            .map(|name| name.to_string())
            .collect()
    }
}

fn document_query_fallback(topic: impl Into<String>) -> IntentDecision {
    let mut slots = HashMap::new();
    slots.insert("topic".to_string(), topic.into());
    IntentDecision {
        intent: DOCUMENT_QUERY_INTENT.to_string(),
        slots,
        is_out_of_scope: false,
        missing_required_slots: Vec::new(),
        confidence: 0.6,
    }
}

/// First query word that is not filler, lowercased, or `default` when the
/// whole query is filler. Punctuation stays attached to words.
fn derive_topic(query: &str, default: &str) -> String {
    let lowered = query.to_lowercase();
    lowered
        .split_whitespace()
        .find(|word| !TOPIC_STOP_WORDS.contains(word))
        .unwrap_or(default)
        .to_string()
}

/// Extract the first balanced JSON object from text that may carry prose
/// around it.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Slot values from the reply. Scalars are kept (stringified when needed),
/// anything structured is dropped.
fn string_slots(value: Option<&Value>) -> HashMap<String, String> {
    let mut slots = HashMap::new();
    if let Some(Value::Object(map)) = value {
        for (name, v) in map {
            match v {
                Value::String(s) => {
                    slots.insert(name.clone(), s.clone());
                }
                Value::Number(n) => {
                    slots.insert(name.clone(), n.to_string());
                }
                Value::Bool(b) => {
                    slots.insert(name.clone(), b.to_string());
                }
                _ => {}
            }
        }
    }
    slots
}

/// Confidence as reported by the model: a number, or a numeric string.
/// Anything else makes the whole reply unusable.
fn coerce_confidence(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        _ => None,
    }
}
