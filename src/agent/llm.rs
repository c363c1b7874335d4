//! Ollama client for optional natural-language answers.
//!
//! The LLM is used **only** for:
//! - Classifying chat messages when the keyword classifier is not enough
//! - Phrasing answers around a route or prerequisite list the graph produced
//!
//! Routes themselves always come from the skill graph; the LLM never invents them.

use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// Errors from the LLM subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("Ollama is not available at {url}")]
    #[diagnostic(
        code(atlas::llm::unavailable),
        help("Start Ollama with `ollama serve`, or unset OLLAMA_URL to answer from templates.")
    )]
    Unavailable { url: String },

    #[error("Ollama request failed: {message}")]
    #[diagnostic(
        code(atlas::llm::request_failed),
        help("Check that Ollama is running and the model is pulled.")
    )]
    RequestFailed { message: String },

    #[error("Failed to parse Ollama response: {message}")]
    #[diagnostic(
        code(atlas::llm::parse_error),
        help("The model returned an unexpected response format.")
    )]
    ParseError { message: String },

    #[error("Ollama request timed out after {timeout_secs}s")]
    #[diagnostic(
        code(atlas::llm::timeout),
        help("Increase `llm.timeout_secs` or use a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

/// Text completion backend.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError>;

    /// Model identifier for logs.
    fn model(&self) -> &str;
}

/// Fixed sampling seed; with temperature 0 a prompt gets the same answer on
/// every call to the same model.
const SAMPLING_SEED: u64 = 42;

/// Configuration for the Ollama client.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for the Ollama API.
    pub base_url: String,
    /// Model name to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "llama3.2".into(),
            timeout_secs: 60,
        }
    }
}

impl OllamaConfig {
    /// Client settings from the `[llm]` section; `None` when no URL is configured.
    pub fn from_settings(cfg: &crate::config::LlmConfig) -> Option<Self> {
        cfg.ollama_url.as_ref().map(|url| Self {
            base_url: url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            timeout_secs: cfg.timeout_secs,
        })
    }
}

/// Client for the Ollama REST API.
pub struct OllamaClient {
    config: OllamaConfig,
    http: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::RequestFailed {
                message: e.to_string(),
            })?;
        Ok(Self { config, http })
    }

    /// Probe the Ollama server via `/api/tags`.
    pub async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.config.timeout_secs,
            }
        } else if e.is_connect() {
            LlmError::Unavailable {
                url: self.config.base_url.clone(),
            }
        } else {
            LlmError::RequestFailed {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    /// Generate a completion through `/api/generate`.
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.config.base_url);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0, "seed": SAMPLING_SEED },
        });
        if let Some(sys) = system {
            body["system"] = serde_json::Value::String(sys.to_string());
        }

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        if !resp.status().is_success() {
            return Err(LlmError::RequestFailed {
                message: format!("server returned status {}", resp.status()),
            });
        }

        let json: serde_json::Value = resp.json().await.map_err(|e| LlmError::ParseError {
            message: e.to_string(),
        })?;

        json["response"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| LlmError::ParseError {
                message: "missing 'response' field".into(),
            })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Pull the first JSON object out of a model answer that may wrap it in prose
/// or a code fence.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return value.is_object().then_some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<serde_json::Value>(&trimmed[start..=end])
        .ok()
        .filter(|v| v.is_object())
}
