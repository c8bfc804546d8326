//! Optional LLM answerer backed by the Gemini `generateContent` API.

use crate::http::{create_http_client, looks_like_html};
use lazy_regex::{lazy_regex, regex_is_match};
use regex::Regex;
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default instruction for group questions
pub const GROUP_INSTRUCTION: &str = "You are a helpful, knowledgeable assistant for a WhatsApp study group. \
Answer the following question concisely and accurately. Keep response under 500 characters. \
Be friendly and use emojis occasionally. If you don't know something, say so honestly. \
Respond in the same language as the question (English, Urdu, or Hindi).";

/// Instruction for direct messages
pub const DM_INSTRUCTION: &str = "You are a helpful assistant. Chat normally and strictly. Be brief.";

static RE_QUESTION_START: lazy_regex::Lazy<Regex> = lazy_regex!(
    r"(?i)^(what|who|where|when|why|how|which|can|could|would|should|is|are|do|does|did|will|explain|tell|describe|kya|kaise|kyun|kab|kahan|kaun|batao|bata|samjhao)"
);

/// Errors from the LLM API
#[derive(Debug, Error)]
pub enum LlmError {
    /// Error returned by the provider's API
    #[error("API error: {0}")]
    ApiError(String),
    /// Error during network communication
    #[error("Network error: {0}")]
    NetworkError(String),
    /// Error during JSON deserialization
    #[error("JSON error: {0}")]
    JsonError(String),
    /// No API key configured
    #[error("Missing API key")]
    MissingConfig,
}

/// Returns true if the message looks like a question worth answering.
///
/// Commands and messages shorter than 10 characters are skipped.
#[must_use]
pub fn should_use_ai(text: &str, prefix: &str) -> bool {
    let text = text.trim().to_lowercase();
    if text.chars().count() < 10 {
        return false;
    }
    if (!prefix.is_empty() && text.starts_with(prefix)) || text.starts_with('.') {
        return false;
    }
    text.ends_with('?') || RE_QUESTION_START.is_match(&text)
}

/// Returns true for "admin number chahiye" and similar contact requests
#[must_use]
pub fn is_contact_request(text: &str) -> bool {
    regex_is_match!(r"(?i)\b(admin|owner|contact|number|num|mobile|whatsapp)\b", text)
        && regex_is_match!(r"(?i)\b(give|send|chahiye|need|talk|bat|rabta)\b", text)
}

/// Gemini client
pub struct AiClient {
    http_client: HttpClient,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl AiClient {
    /// Create a client; without an API key every request fails with
    /// [`LlmError::MissingConfig`]
    #[must_use]
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, GEMINI_BASE_URL)
    }

    /// Client against a custom endpoint
    #[must_use]
    pub fn with_base_url(
        api_key: Option<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client: create_http_client(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// Returns true if an API key is configured
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Answer `question` under `instruction`.
    ///
    /// Returns `Ok(None)` when the model produced only whitespace.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` on missing key, network failure, non-success
    /// status or an unexpected response shape.
    pub async fn generate_response(
        &self,
        question: &str,
        instruction: &str,
    ) -> Result<Option<String>, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingConfig)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": question}]
            }],
            "system_instruction": {
                "parts": [{"text": instruction}]
            },
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 512
            }
        });

        let response = send_json_request(
            &self.http_client,
            &url,
            &body,
            &[("x-goog-api-key", api_key)],
        )
        .await?;
        let text = extract_text_content(
            &response,
            &["candidates", "0", "content", "parts", "0", "text"],
        )?;

        let text = text.trim();
        if text.is_empty() {
            warn!("Gemini returned an empty answer");
            return Ok(None);
        }
        info!(
            question = %crate::utils::truncate_str(question, 50),
            response_len = text.len(),
            "AI response generated"
        );
        Ok(Some(text.to_string()))
    }
}

/// Sends an HTTP POST request with JSON body and returns the parsed JSON.
///
/// # Errors
///
/// Returns `LlmError::NetworkError` on connectivity issues,
/// `LlmError::ApiError` on non-success status codes, or
/// `LlmError::JsonError` if parsing fails.
async fn send_json_request(
    client: &HttpClient,
    url: &str,
    body: &Value,
    extra_headers: &[(&str, &str)],
) -> Result<Value, LlmError> {
    let mut request = client.post(url).json(body);
    for (key, value) in extra_headers {
        request = request.header(*key, *value);
    }

    let response = request
        .send()
        .await
        .map_err(|e| LlmError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        let clean_message = if looks_like_html(&error_text) {
            format!("{status} (Server returned HTML error page)")
        } else {
            let truncated = crate::utils::truncate_str(&error_text, 500);
            format!("{status} - {truncated}")
        };
        return Err(LlmError::ApiError(clean_message));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::JsonError(e.to_string()))
}

/// Extracts text content from a JSON response by navigating a path.
///
/// Numeric segments index arrays, others are object keys.
fn extract_text_content(response: &Value, path: &[&str]) -> Result<String, LlmError> {
    let mut current = response;

    for segment in path {
        current = if let Ok(index) = segment.parse::<usize>() {
            current.get(index).ok_or_else(|| {
                LlmError::ApiError(format!("Invalid path: missing index {index}"))
            })?
        } else {
            current.get(*segment).ok_or_else(|| {
                LlmError::ApiError(format!("Invalid path: missing key {segment}"))
            })?
        };
    }

    current
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| LlmError::ApiError(format!("Expected string at path, got: {current:?}")))
}
