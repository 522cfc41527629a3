//! Abstract summarization through the Gemini generative-language API.

use crate::error::{MonitorError, OptionExt, Result};
use crate::prompts::build_summary_prompt;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Generative-language API root
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Returned in place of a summary when the API answers with an error
pub const API_ERROR_SUMMARY: &str = "Error: Could not generate summary due to an API error.";

/// Returned in place of a summary for any other failure
pub const GENERIC_ERROR_SUMMARY: &str = "Error: Could not generate summary.";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Summarizer configuration
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
}

impl SummarizerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            top_p: 0.8,
        }
    }

    /// Read the API key from `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        ["GOOGLE_API_KEY", "GEMINI_API_KEY"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|key| !key.trim().is_empty())
            .map(Self::new)
            .ok_or_else(|| {
                MonitorError::Config(
                    "Set GOOGLE_API_KEY or GEMINI_API_KEY to enable summaries".to_string(),
                )
            })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Summarizes abstracts with a single reusable HTTP client
pub struct Summarizer {
    client: reqwest::Client,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(config: SummarizerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| MonitorError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
            }
        })
    }

    /// Summarize an abstract, propagating failures.
    pub async fn summarize(&self, abstract_text: &str) -> Result<String> {
        let prompt = build_summary_prompt(abstract_text);
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        debug!(model = %self.config.model, "Sending summary request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(&prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MonitorError::Api {
                code: status.as_u16() as i32,
                message: format!("Gemini API error: {} - {}", status, error_text),
            });
        }

        let body = response.text().await?;
        let summary = parse_summary(&body)?;
        info!(chars = summary.len(), "Summary generated");
        Ok(summary)
    }

    /// Summarize an abstract; failures become a fixed error string.
    pub async fn summarize_or_fallback(&self, abstract_text: &str) -> String {
        match self.summarize(abstract_text).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summarization failed");
                fallback_summary(&e).to_string()
            }
        }
    }
}

/// Fallback text for a failed summary
pub fn fallback_summary(error: &MonitorError) -> &'static str {
    match error {
        MonitorError::Api { .. } | MonitorError::RateLimited(_) => API_ERROR_SUMMARY,
        _ => GENERIC_ERROR_SUMMARY,
    }
}

/// Join the text parts of the first candidate.
fn parse_summary(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| MonitorError::Parse(format!("Failed to parse Gemini response: {}", e)))?;

    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_parse("Gemini response has no candidates")?;

    let text: String = content.parts.into_iter().map(|p| p.text).collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(MonitorError::Parse("Gemini response has no text".to_string()));
    }
    Ok(text.to_string())
}
