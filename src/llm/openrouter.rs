//! OpenRouter-backed chat generator speaking the OpenAI-compatible wire
//! format. Any endpoint exposing `/chat/completions` works, which keeps the
//! provider swappable via `api.base_url`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{ChatGenerator, ChatOptions, ChatReply, ReplyBlock};

pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(base_url: &str, api_key: &str, connect_timeout_secs: u64) -> Result<Self> {
        if api_key.is_empty() {
            return Err(anyhow!(
                "No API key configured. Set OPENROUTER_API_KEY or fill in api.api_key in the config file"
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            base_url = %base_url,
            connect_timeout = connect_timeout_secs,
            "Creating OpenRouter client"
        );

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Parse a response body as JSON, returning a clear error if the server returned HTML
    /// (e.g. a gateway error page) instead of valid JSON.
    async fn parse_json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

        // Detect HTML error pages (CDNs/proxies sometimes return 200 with HTML)
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') || trimmed.starts_with("<!") {
            let preview: String = trimmed.chars().take(200).collect();
            return Err(anyhow!(
                "Endpoint {} returned HTML instead of JSON (HTTP {}). The service may be down or misconfigured. Response: {}",
                endpoint, status, preview
            ));
        }

        serde_json::from_str::<T>(&body).map_err(|e| {
            let preview: String = body.chars().take(300).collect();
            anyhow!(
                "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
                endpoint,
                status,
                e,
                preview
            )
        })
    }
}

#[async_trait]
impl ChatGenerator for OpenRouterClient {
    async fn chat(
        &self,
        system_prompt: &str,
        user_message: &str,
        options: &ChatOptions,
    ) -> Result<ChatReply> {
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = %endpoint,
            model = %options.model,
            max_tokens = options.max_tokens,
            system_len = system_prompt.len(),
            "Sending chat completion request"
        );

        let request = json!({
            "model": options.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_message}
            ],
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
            "stream": false
        });

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(options.timeout())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    tracing::error!(endpoint = %endpoint, "Request timed out (connect or response timeout)");
                    anyhow!(
                        "Request to {} timed out after {}s",
                        endpoint,
                        options.timeout_secs
                    )
                } else if e.is_connect() {
                    tracing::error!(endpoint = %endpoint, error = %e, "Connection failed");
                    anyhow!("Failed to connect to {}: {}", endpoint, e)
                } else {
                    tracing::error!(endpoint = %endpoint, error = %e, "Request failed");
                    anyhow!("Request to {} failed: {}", endpoint, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await?;
            tracing::error!(endpoint = %endpoint, status = %status, error = %error, "API returned error");
            return Err(anyhow!("API error ({}): {}", status, error));
        }

        let result: CompletionResponse = Self::parse_json_response(response, &endpoint).await?;

        let message = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No choices returned from API"))?
            .message;

        let reply = reply_from_content(message.content);
        tracing::debug!(chars = reply.text_lossy().len(), "Chat reply received");
        Ok(reply)
    }
}

/// Map the wire `content` field onto [`ChatReply`]. Providers behind
/// OpenRouter return a plain string, a list of typed blocks, or null when
/// the model produced nothing.
fn reply_from_content(content: serde_json::Value) -> ChatReply {
    match content {
        serde_json::Value::String(text) => ChatReply::Text(text),
        serde_json::Value::Array(items) => {
            let blocks = items
                .into_iter()
                .map(|item| {
                    if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                        ReplyBlock::Text(text.to_string())
                    } else {
                        let kind = item
                            .get("type")
                            .and_then(|t| t.as_str())
                            .unwrap_or("unknown")
                            .to_string();
                        ReplyBlock::Opaque(kind)
                    }
                })
                .collect();
            ChatReply::Blocks(blocks)
        }
        // Null and anything else carry no usable text.
        _ => ChatReply::Blocks(Vec::new()),
    }
}

/// Response structures
#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: serde_json::Value,
}
