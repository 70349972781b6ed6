use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use eyre::{Result, bail};
use log::debug;

use crate::QuizError;

const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// A text-completion backend
#[async_trait]
pub trait Llm: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Whether `complete_with_audio` is supported
    fn accepts_audio(&self) -> bool {
        false
    }

    async fn complete_with_audio(&self, _prompt: &str, _audio: &[u8], _mime: &str) -> Result<String> {
        bail!("this model does not accept audio input");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
    Anthropic,
}

impl Provider {
    pub fn for_model(model: &str) -> Self {
        if model.starts_with("claude") {
            Provider::Anthropic
        } else if model.starts_with("gemini") {
            Provider::Gemini
        } else {
            Provider::OpenAi
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Gemini",
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
        }
    }

    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

/// Use the explicit key if given, otherwise the provider's environment variable
pub fn resolve_api_key(explicit: Option<&str>, provider: Provider) -> Result<String, QuizError> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(provider.env_var()).ok())
        .filter(|k| !k.trim().is_empty())
        .ok_or(QuizError::MissingApiKey {
            provider: provider.name(),
            env_var: provider.env_var(),
        })
}

/// HTTP client for the hosted model APIs, routed by model name
pub struct LlmClient {
    http: reqwest::Client,
    provider: Provider,
    model: String,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(http: reqwest::Client, model: &str, api_key: String) -> Self {
        let provider = Provider::for_model(model);
        Self {
            http,
            provider,
            model: model.to_string(),
            api_key,
            base_url: provider.default_base_url().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn gemini(&self, parts: serde_json::Value) -> Result<String> {
        debug!("Calling Gemini API with model {}", self.model);

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ]
        });

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .timeout(GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Gemini API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_gemini_text(&json)
    }

    async fn anthropic(&self, prompt: &str) -> Result<String> {
        debug!("Calling Anthropic API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 8192,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .timeout(GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Anthropic API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_anthropic_text(&json)
    }

    async fn openai(&self, prompt: &str) -> Result<String> {
        debug!("Calling OpenAI API with model {}", self.model);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": prompt
                }
            ]
        });

        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json")
            .timeout(GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("OpenAI API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        extract_openai_text(&json)
    }
}

#[async_trait]
impl Llm for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        match self.provider {
            Provider::Gemini => self.gemini(serde_json::json!([{ "text": prompt }])).await,
            Provider::Anthropic => self.anthropic(prompt).await,
            Provider::OpenAi => self.openai(prompt).await,
        }
    }

    fn accepts_audio(&self) -> bool {
        self.provider == Provider::Gemini
    }

    async fn complete_with_audio(&self, prompt: &str, audio: &[u8], mime: &str) -> Result<String> {
        if !self.accepts_audio() {
            bail!("{} models do not accept inline audio", self.provider.name());
        }
        let parts = serde_json::json!([
            {
                "inline_data": {
                    "mime_type": mime,
                    "data": general_purpose::STANDARD.encode(audio)
                }
            },
            { "text": prompt }
        ]);
        self.gemini(parts).await
    }
}

fn extract_gemini_text(json: &serde_json::Value) -> Result<String> {
    if let Some(parts) = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
    {
        let text: String = parts
            .iter()
            .filter_map(|part| part.get("text")?.as_str())
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    if let Some(reason) = json
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        bail!("Gemini blocked the prompt: {reason}");
    }
    bail!("unexpected Gemini API response format");
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}
