use crate::llm::ChatOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    pub data_dir: PathBuf,
    /// Intent schema JSON. Missing or malformed files fall back to the
    /// built-in schema instead of failing startup.
    pub schema_path: PathBuf,
    pub qa_log_path: PathBuf,
    pub api: ApiConfig,
    pub classification: ChatOptions,
    pub generation: ChatOptions,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Read from OPENROUTER_API_KEY when absent from the config file.
    pub api_key: String,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub chunk_sentences: usize,
    pub chunk_overlap: usize,
}

impl QaConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.api.base_url.is_empty() {
            return Err("api.base_url must not be empty".into());
        }
        if self.classification.max_tokens == 0 {
            return Err("classification.max_tokens must be > 0".into());
        }
        if self.generation.max_tokens == 0 {
            return Err("generation.max_tokens must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.classification.temperature) {
            return Err("classification.temperature must be in [0.0, 2.0]".into());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err("generation.temperature must be in [0.0, 2.0]".into());
        }
        if self.classification.timeout_secs == 0 || self.generation.timeout_secs == 0 {
            return Err("timeout_secs must be > 0".into());
        }
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.retrieval.chunk_sentences == 0 {
            return Err("retrieval.chunk_sentences must be > 0".into());
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_sentences {
            return Err("retrieval.chunk_overlap must be < chunk_sentences".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for QaConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("prashna");

        let api_key = std::env::var("OPENROUTER_API_KEY").unwrap_or_default();

        Self {
            schema_path: data_dir.join("intent_slot_schema.json"),
            qa_log_path: data_dir.join("qa_log.txt"),
            data_dir,
            api: ApiConfig {
                base_url: "https://openrouter.ai/api/v1".to_string(),
                api_key,
                connect_timeout_secs: 15,
            },
            classification: ChatOptions {
                model: "qwen/qwen-2.5-7b-instruct".to_string(),
                max_tokens: 200,
                temperature: 0.2,
                timeout_secs: 30,
            },
            generation: ChatOptions {
                model: "qwen/qwen-2.5-7b-instruct".to_string(),
                max_tokens: 400,
                temperature: 0.5,
                timeout_secs: 60,
            },
            retrieval: RetrievalConfig {
                top_k: 3,
                chunk_sentences: 6,
                chunk_overlap: 1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = QaConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let mut config = QaConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_not_below_chunk_sentences() {
        let mut config = QaConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_sentences;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = QaConfig::default();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = QaConfig::from_file(&path).unwrap();
        assert_eq!(loaded.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(loaded.api.base_url, config.api.base_url);
    }
}
