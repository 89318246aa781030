//! The query-processing pipeline: intent classification, retrieval query
//! enhancement, and intent-conditioned response generation.

pub mod enhance;
pub mod intent;
pub mod respond;

// Re-export commonly used types
pub use enhance::enhance_for_retrieval;
pub use intent::IntentClassifier;
pub use respond::ResponseGenerator;
