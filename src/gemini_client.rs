use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const USER_ROLE: &str = "user";
pub const MODEL_ROLE: &str = "model";

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("invalid API endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("request to Gemini API failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Gemini API request failed ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("failed to decode Gemini API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GeminiError {
    // reqwest errors print the request URL; keep it out of anything shown
    fn from(e: reqwest::Error) -> Self {
        GeminiError::Request(e.without_url())
    }
}

/// One turn of conversation in the provider's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    pub fn text(role: &str, text: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// An ongoing exchange with the remote model that remembers prior turns.
#[async_trait]
pub trait RemoteChat: Send {
    /// Send one user message. `Ok(None)` means the model answered without text.
    async fn send_message(&mut self, text: &str) -> Result<Option<String>, GeminiError>;
}

/// Something that can open a [`RemoteChat`] seeded with earlier turns.
pub trait ChatProvider: Send + Sync {
    fn start_chat(&self, history: Vec<Content>) -> Box<dyn RemoteChat>;
}

#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: Url,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeminiError> {
        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            client: build_http_client(DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, GeminiError> {
        self.client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Point the client at a different API root, e.g. a proxy or a test server.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, GeminiError> {
        // Url::join drops the last path segment unless it ends with a slash
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        self.base_url = Url::parse(&base)?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> Result<Url, GeminiError> {
        Ok(self
            .base_url
            .join(&format!("models/{}:generateContent", self.model))?)
    }

    /// Run one `generateContent` call over the given turns and return the
    /// text of the first candidate, if it has any.
    pub async fn generate_content(&self, contents: &[Content]) -> Result<Option<String>, GeminiError> {
        let request_body = GenerateContentRequest { contents };

        debug!(
            model = %self.model,
            turns = contents.len(),
            "Sending request to Gemini API: {}",
            serde_json::to_string_pretty(&request_body).unwrap_or_default()
        );

        let response = self
            .client
            .post(self.endpoint()?)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(%status, "API request failed with response: {}", body);
            return Err(GeminiError::Api {
                status,
                message: error_message(&body),
            });
        }

        debug!("Received response from Gemini API: {}", body);

        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_text())
    }
}

impl ChatProvider for GeminiClient {
    fn start_chat(&self, history: Vec<Content>) -> Box<dyn RemoteChat> {
        debug!(seeded_turns = history.len(), "Starting Gemini chat");
        Box::new(GeminiChat {
            client: self.clone(),
            history,
        })
    }
}

/// A chat over [`GeminiClient`]; the full history is resent on every turn.
pub struct GeminiChat {
    client: GeminiClient,
    history: Vec<Content>,
}

#[async_trait]
impl RemoteChat for GeminiChat {
    async fn send_message(&mut self, text: &str) -> Result<Option<String>, GeminiError> {
        let user_turn = Content::text(USER_ROLE, text);

        let mut contents = self.history.clone();
        contents.push(user_turn.clone());

        let reply = self.client.generate_content(&contents).await?;

        // Failed or empty turns are not remembered
        if let Some(reply_text) = &reply {
            self.history.push(user_turn);
            self.history.push(Content::text(MODEL_ROLE, reply_text.clone()));
        }

        Ok(reply)
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, GeminiError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: &'a [Content],
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();

        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| wrapper.error.message)
        .unwrap_or_else(|| body.to_string())
}
