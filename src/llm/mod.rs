//! External text-generation access.
//!
//! The pipeline only ever talks to the [`ChatGenerator`] trait, so tests can
//! swap the hosted API for a stub and the provider can be replaced without
//! touching classification or response code.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod openrouter;

pub use openrouter::OpenRouterClient;

/// Per-call generation settings. Classification and answer generation use
/// different profiles (short deterministic output vs longer looser output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl ChatOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Reply from a chat completion. Providers return `content` either as a
/// plain string or as a list of typed blocks; both shapes are preserved so
/// callers decide how strictly to read them.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Text(String),
    Blocks(Vec<ReplyBlock>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBlock {
    Text(String),
    /// Non-text block (tool call, image, ...), identified by its type tag.
    Opaque(String),
}

impl ChatReply {
    /// Textual payload of the reply. Fails when a structured reply carries
    /// no text blocks at all.
    pub fn text(&self) -> Result<String> {
        match self {
            ChatReply::Text(text) => Ok(text.clone()),
            ChatReply::Blocks(blocks) => {
                let parts: Vec<&str> = blocks
                    .iter()
                    .filter_map(|block| match block {
                        ReplyBlock::Text(text) => Some(text.as_str()),
                        ReplyBlock::Opaque(_) => None,
                    })
                    .collect();
                if parts.is_empty() {
                    Err(anyhow!("Reply contains no text content"))
                } else {
                    Ok(parts.join(" "))
                }
            }
        }
    }

    /// Like [`ChatReply::text`] but never fails; a reply without text
    /// becomes the empty string.
    pub fn text_lossy(&self) -> String {
        self.text().unwrap_or_default()
    }
}

/// Chat completion backend. Implementations must be shareable across
/// concurrent requests.
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply>;
}
