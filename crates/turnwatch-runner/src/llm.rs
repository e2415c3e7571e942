//! LLM narrator and summarizer selection.
//!
//! One [`LlmBackend`] talks to either an `OpenAI`-compatible chat completions
//! endpoint or the Anthropic Messages API; the two differ only in request
//! shape, auth headers and where the reply text sits. [`Narrator`] is the
//! summarizer the watcher actually holds: an LLM narrator when one is
//! configured, the plain-text digest otherwise.

use serde_json::{Value, json};
use tracing::debug;
use turnwatch_core::message::ReportDigest;
use turnwatch_core::{StructuredChangeReport, Summarizer, SummarizerError};

use crate::config::{BackendType, LlmBackendConfig};
use crate::prompt::{PromptEngine, RenderedPrompt};

/// Upper bound on narrative length, in model tokens.
const MAX_TOKENS: u32 = 400;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// A configured LLM endpoint.
pub struct LlmBackend {
    client: reqwest::Client,
    kind: BackendType,
    api_url: String,
    api_key: String,
    model: String,
}

impl LlmBackend {
    /// Create a backend from configuration.
    pub fn new(client: reqwest::Client, config: &LlmBackendConfig) -> Self {
        Self {
            client,
            kind: config.backend_type,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self.kind {
            BackendType::OpenAi => "openai-compatible",
            BackendType::Anthropic => "anthropic",
        }
    }

    /// Send a prompt and return the reply text.
    pub async fn complete(&self, prompt: &RenderedPrompt) -> Result<String, SummarizerError> {
        let request = match self.kind {
            BackendType::OpenAi => self
                .client
                .post(format!("{}/chat/completions", self.api_url))
                .bearer_auth(&self.api_key)
                .json(&json!({
                    "model": self.model,
                    "messages": [
                        {"role": "system", "content": prompt.system},
                        {"role": "user", "content": prompt.user}
                    ],
                    "temperature": 0.8,
                    "max_tokens": MAX_TOKENS
                })),
            BackendType::Anthropic => self
                .client
                .post(format!("{}/messages", self.api_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&json!({
                    "model": self.model,
                    "max_tokens": MAX_TOKENS,
                    "system": prompt.system,
                    "messages": [{"role": "user", "content": prompt.user}]
                })),
        };

        let response = request.send().await.map_err(|e| {
            SummarizerError::Backend(format!("{} request failed: {}", self.name(), e.without_url()))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(SummarizerError::Backend(format!(
                "{} returned {status}: {error_body}",
                self.name()
            )));
        }

        let json: Value = response.json().await.map_err(|e| {
            SummarizerError::Backend(format!("{} response parse failed: {e}", self.name()))
        })?;
        extract_content(self.kind, &json)
    }
}

/// Pull the reply text out of a backend response.
fn extract_content(kind: BackendType, json: &Value) -> Result<String, SummarizerError> {
    let pointer = match kind {
        BackendType::OpenAi => "/choices/0/message/content",
        BackendType::Anthropic => "/content/0/text",
    };
    json.pointer(pointer)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| SummarizerError::Backend(format!("response missing {pointer}")))
}

/// Narrates a report by prompting an LLM.
pub struct LlmSummarizer {
    backend: LlmBackend,
    prompts: PromptEngine,
}

impl LlmSummarizer {
    /// Pair a backend with the prompt templates it is fed.
    pub const fn new(backend: LlmBackend, prompts: PromptEngine) -> Self {
        Self { backend, prompts }
    }
}

impl Summarizer for LlmSummarizer {
    async fn summarize(&self, report: &StructuredChangeReport) -> Result<String, SummarizerError> {
        let prompt = self.prompts.render(report)?;
        let text = self.backend.complete(&prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SummarizerError::Empty);
        }
        debug!(
            backend = self.backend.name(),
            changes = report.len(),
            chars = text.chars().count(),
            "narrative generated"
        );
        Ok(text.to_owned())
    }
}

/// The summarizer selected at startup.
pub enum Narrator {
    /// LLM-written narrative.
    Llm(LlmSummarizer),
    /// Plain-text digest of the report.
    Digest(ReportDigest),
}

impl Narrator {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Llm(llm) => llm.backend.name(),
            Self::Digest(_) => "digest",
        }
    }
}

impl Summarizer for Narrator {
    async fn summarize(&self, report: &StructuredChangeReport) -> Result<String, SummarizerError> {
        match self {
            Self::Llm(llm) => llm.summarize(report).await,
            Self::Digest(digest) => digest.summarize(report).await,
        }
    }
}
