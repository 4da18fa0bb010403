//! Chat-completion client that turns an image into a name.
//!
//! One request per image, no retries:
//!
//! ```text
//! POST {base_url}/v1/chat/completions
//! Authorization: Bearer <api_key>
//!
//! {"model": "...", "max_tokens": 300,
//!  "messages": [{"role": "user", "content": [
//!     {"type": "text", "text": "<prompt>"},
//!     {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,..."}}]}]}
//! ```
//!
//! A usable answer is `choices[0].message.content` as a non-blank string.
//! Transport failures, non-2xx statuses and bodies that are not JSON are
//! [`ApiError`]s of their own kinds; well-formed JSON without that shape is
//! [`ApiError::InvalidResponse`].

use crate::config::RenameConfig;
use crate::imaging::EncodedImage;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on a single request, connect to last byte.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Completion budget. A filename needs a handful of tokens; the slack covers
/// models that think out loud before answering.
pub const MAX_TOKENS: u32 = 300;

/// How much of an error body is kept for messages.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Response is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Asks a model to name an image.
///
/// Implementations are shared by every worker thread in a run.
pub trait NamingClient: Send + Sync {
    /// Return the raw (unsanitized) text the model answered with.
    fn suggest_name(&self, prompt: &str, image: &EncodedImage) -> Result<String, ApiError>;
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

impl<'a> ChatRequest<'a> {
    /// A single user message carrying the prompt and the image inline.
    pub fn new(model: &'a str, prompt: &'a str, image: &EncodedImage, max_tokens: u32) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_uri(),
                        },
                    },
                ],
            }],
            max_tokens,
        }
    }
}

/// Pull the suggestion out of a 2xx response body.
pub fn interpret_response(body: &str) -> Result<String, ApiError> {
    let value: Value = serde_json::from_str(body).map_err(ApiError::MalformedBody)?;

    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::InvalidResponse(describe_unusable(&value)))
}

/// Short explanation of why a response carried no name.
fn describe_unusable(value: &Value) -> String {
    if let Some(message) = value
        .get("error")
        .and_then(|e| e.get("message").or(Some(e)))
        .and_then(Value::as_str)
    {
        return message.to_string();
    }
    truncate(&value.to_string(), ERROR_BODY_LIMIT)
}

fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

// =============================================================================
// reqwest implementation
// =============================================================================

/// Blocking client for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct ChatCompletionsClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &RenameConfig) -> Result<Self, ApiError> {
        Self::with_timeout(config, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(config: &RenameConfig, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("picname/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl NamingClient for ChatCompletionsClient {
    fn suggest_name(&self, prompt: &str, image: &EncodedImage) -> Result<String, ApiError> {
        let request = ChatRequest::new(&self.model, prompt, image, MAX_TOKENS);
        tracing::debug!(endpoint = %self.endpoint, model = %self.model, "sending completion request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(ApiError::Transport)?;

        let status = response.status();
        let body = response.text().map_err(ApiError::Transport)?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate(body.trim(), ERROR_BODY_LIMIT),
            });
        }
        interpret_response(&body)
    }
}
