//! Intent schema store: which intents exist, which slots they carry, and the
//! canned responses used when grounded generation is not possible. Loaded
//! once at startup and shared read-only by the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// Intent every fallback path resolves to.
pub const DOCUMENT_QUERY_INTENT: &str = "document_query";
pub const OUT_OF_SCOPE_INTENT: &str = "out_of_scope";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSchema {
    pub intents: Vec<IntentDefinition>,
    #[serde(default)]
    pub responses: HashMap<String, String>,
}

/// Schema a fresh install starts with: the four document intents plus
/// out_of_scope, and the canned response texts.
const BUILTIN_SCHEMA_JSON: &str = r#"{
  "intents": [
    {
      "name": "document_query",
      "description": "Questions about document content",
      "slots": [
        {
          "name": "topic",
          "description": "The topic the user is asking about",
          "is_required": true
        },
        {
          "name": "section",
          "description": "The section of the document to focus on",
          "is_required": false
        }
      ],
      "examples": [
        "What does the document say about health?",
        "Tell me about the topic of climate in the document",
        "I want to know what information is provided about AI"
      ]
    },
    {
      "name": "find_definition",
      "description": "Looking for a definition of a term in the document",
      "slots": [
        {
          "name": "term",
          "description": "The term to find a definition for",
          "is_required": true
        }
      ],
      "examples": [
        "What is the definition of blockchain in the document?",
        "How does the document define AI?",
        "What does the term climate change mean according to the document?"
      ]
    },
    {
      "name": "document_summary",
      "description": "Requesting a summary of the document or a section",
      "slots": [
        {
          "name": "section",
          "description": "The section to summarize (optional)",
          "is_required": false
        }
      ],
      "examples": [
        "Can you summarize the document?",
        "Give me a summary of the section on education",
        "Provide a brief overview of what the document is about"
      ]
    },
    {
      "name": "document_metadata",
      "description": "Questions about document metadata like author, date, title",
      "slots": [
        {
          "name": "metadata_type",
          "description": "The type of metadata requested (author, date, title, etc.)",
          "is_required": false
        }
      ],
      "examples": [
        "Who wrote this document?",
        "When was this document published?",
        "What's the title of this document?"
      ]
    },
    {
      "name": "out_of_scope",
      "description": "Questions unrelated to the document",
      "slots": [],
      "examples": [
        "What's the weather like today?",
        "Tell me a joke",
        "How do I make pancakes?"
      ]
    }
  ],
  "responses": {
    "out_of_scope": "I'm designed to answer questions only about the content in the loaded document. I can't help with queries outside that scope.",
    "fallback_not_in_document": "I'm sorry, but I don't see information about that in the document. I can only answer questions based on the document content.",
    "no_documents_loaded": "There are no documents loaded yet. Please upload a document first.",
    "welcome": "Hello! I'm a document chatbot. I can answer questions about documents you upload. How can I help you today?"
  }
}"#;

static BUILTIN_SCHEMA: LazyLock<IntentSchema> = LazyLock::new(|| {
    serde_json::from_str(BUILTIN_SCHEMA_JSON).expect("built-in schema JSON is valid")
});

impl IntentSchema {
    /// Load a schema from disk. A missing file yields the built-in schema,
    /// a file that exists but cannot be parsed yields the minimal one.
    /// Schema problems never fail startup.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read intent schema, using built-in default"
                );
                return Self::builtin();
            }
        };

        match serde_json::from_str::<Self>(&content) {
            Ok(schema) => {
                tracing::info!(
                    path = %path.display(),
                    intents = schema.intents.len(),
                    "Loaded intent schema"
                );
                schema
            }
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse intent schema, using minimal default"
                );
                Self::minimal()
            }
        }
    }

    pub fn builtin() -> Self {
        BUILTIN_SCHEMA.clone()
    }

    /// Last-resort schema: a single document_query intent with a topic slot.
    pub fn minimal() -> Self {
        Self {
            intents: vec![IntentDefinition {
                name: DOCUMENT_QUERY_INTENT.to_string(),
                description: "Questions about document content".to_string(),
                slots: vec![SlotDefinition {
                    name: "topic".to_string(),
                    description: "The topic to query about".to_string(),
                    is_required: true,
                }],
                examples: vec!["What does the document say about X?".to_string()],
            }],
            responses: HashMap::new(),
        }
    }

    /// Render the schema as the prompt section listing every intent with its
    /// slots and example utterances.
    pub fn prompt_block(&self) -> String {
        let mut prompt = String::from("AVAILABLE INTENTS:\n\n");
        for intent in &self.intents {
            prompt.push_str(&format!("Intent: {}\n", intent.name));
            prompt.push_str(&format!("Description: {}\n", intent.description));
            if !intent.slots.is_empty() {
                prompt.push_str("Slots:\n");
                for slot in &intent.slots {
                    let required = if slot.is_required { "required" } else { "optional" };
                    prompt.push_str(&format!(
                        "  - {} ({}): {}\n",
                        slot.name, required, slot.description
                    ));
                }
            }
            prompt.push_str("Examples:\n");
            for example in &intent.examples {
                prompt.push_str(&format!("  - {}\n", example));
            }
            prompt.push('\n');
        }
        prompt
    }

    pub fn intent(&self, name: &str) -> Option<&IntentDefinition> {
        self.intents.iter().find(|intent| intent.name == name)
    }

    /// Slot names the given intent declares as required, in declaration
    /// order. Unknown intents declare none.
    pub fn required_slots(&self, intent: &str) -> Vec<&str> {
        self.intent(intent)
            .map(|def| {
                def.slots
                    .iter()
                    .filter(|slot| slot.is_required)
                    .map(|slot| slot.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Canned response for a fallback key, or the supplied default when the
    /// schema does not define one.
    pub fn response_or(&self, key: &str, default: &str) -> String {
        self.responses
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schema_contents() {
        let schema = IntentSchema::builtin();
        assert_eq!(schema.intents.len(), 5);
        assert!(schema.intent(DOCUMENT_QUERY_INTENT).is_some());
        assert!(schema.intent(OUT_OF_SCOPE_INTENT).is_some());
        assert!(schema.responses.contains_key("out_of_scope"));
        assert!(schema.responses.contains_key("fallback_not_in_document"));
        assert!(schema.responses.contains_key("no_documents_loaded"));
        assert!(schema.responses.contains_key("welcome"));
    }

    #[test]
    fn test_minimal_schema_has_topic_slot() {
        let schema = IntentSchema::minimal();
        assert_eq!(schema.intents.len(), 1);
        assert_eq!(schema.required_slots(DOCUMENT_QUERY_INTENT), vec!["topic"]);
        assert!(schema.responses.is_empty());
    }

    #[test]
    fn test_prompt_block_layout() {
        let schema = IntentSchema::minimal();
        let expected = "AVAILABLE INTENTS:\n\n\
                        Intent: document_query\n\
                        Description: Questions about document content\n\
                        Slots:\n  - topic (required): The topic to query about\n\
                        Examples:\n  - What does the document say about X?\n\n";
        assert_eq!(schema.prompt_block(), expected);
    }

    #[test]
    fn test_prompt_block_omits_slot_section_for_slotless_intents() {
        let schema = IntentSchema::builtin();
        let block = schema.prompt_block();
        let out_of_scope = block
            .split("Intent: out_of_scope\n")
            .nth(1)
            .expect("out_of_scope intent is listed");
        let section = out_of_scope.split("\n\n").next().unwrap();
        assert!(!section.contains("Slots:"));
        assert!(section.contains("Examples:"));
    }

    #[test]
    fn test_load_missing_file_uses_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let schema = IntentSchema::load(&dir.path().join("absent.json"));
        assert_eq!(schema.intents.len(), 5);
        assert!(schema.responses.contains_key("welcome"));
    }

    #[test]
    fn test_load_malformed_file_uses_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "not json at all").unwrap();

        let schema = IntentSchema::load(&path);
        assert_eq!(schema.intents.len(), 1);
        assert_eq!(schema.intents[0].name, DOCUMENT_QUERY_INTENT);
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        let json = r#"{
            "intents": [
                {"name": "custom_intent", "description": "d", "slots": [], "examples": []}
            ],
            "responses": {"out_of_scope": "custom text"}
        }"#;
        std::fs::write(&path, json).unwrap();

        let schema = IntentSchema::load(&path);
        assert_eq!(schema.intents.len(), 1);
        assert_eq!(schema.intents[0].name, "custom_intent");
        assert_eq!(schema.response_or("out_of_scope", "x"), "custom text");
    }

    #[test]
    fn test_required_slots_ordering_and_unknown_intent() {
        let schema = IntentSchema::builtin();
        assert_eq!(schema.required_slots(DOCUMENT_QUERY_INTENT), vec!["topic"]);
        assert_eq!(schema.required_slots("find_definition"), vec!["term"]);
        assert!(schema.required_slots(OUT_OF_SCOPE_INTENT).is_empty());
        assert!(schema.required_slots("no_such_intent").is_empty());
    }

    #[test]
    fn test_response_or_uses_default_when_missing() {
        let schema = IntentSchema::minimal();
        assert_eq!(schema.response_or("out_of_scope", "fallback"), "fallback");
    }
}
