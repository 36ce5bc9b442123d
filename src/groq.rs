//! Groq inference client (OpenAI-compatible chat completions and Whisper transcription).

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whisper model used for every transcription request.
pub const TRANSCRIPTION_MODEL: &str = "whisper-large-v3";

/// Chat models selectable from the `ask` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    Llama70b,
    Mixtral8x7b,
    Gemma7b,
}

impl Model {
    pub const ALL: [Model; 3] = [Model::Llama70b, Model::Mixtral8x7b, Model::Gemma7b];

    pub fn as_str(&self) -> &'static str {
        match self {
            Model::Llama70b => "llama3-70b-8192",
            Model::Mixtral8x7b => "mixtral-8x7b-32768",
            Model::Gemma7b => "gemma-7b-it",
        }
    }

    /// Human-readable label shown in the command's choice list.
    pub fn label(&self) -> &'static str {
        match self {
            Model::Llama70b => "Llama 3 70B",
            Model::Mixtral8x7b => "Mixtral 8x7B",
            Model::Gemma7b => "Gemma 7B",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == id)
    }
}

/// The two inference operations the bot relies on.
///
/// Both return `Ok(None)` when the API answered but carried no text.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn complete(&self, model: Model, question: &str) -> Result<Option<String>, Error>;

    async fn transcribe(&self, audio: &Path) -> Result<Option<String>, Error>;
}

pub struct Client {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<ApiMessage<'a>>,
    model: &'static str,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: Option<String>,
}

impl Client {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self::with_http(api_key, base_url, reqwest::Client::new())
    }

    /// Reuse an existing connection pool.
    pub fn with_http(api_key: String, base_url: String, http: reqwest::Client) -> Self {
        Self { api_key, base_url, http }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, Error> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }
        response.text().await.map_err(|e| Error::Http(e.to_string()))
    }
}

#[async_trait]
impl Inference for Client {
    async fn complete(&self, model: Model, question: &str) -> Result<Option<String>, Error> {
        let request = CompletionRequest {
            messages: vec![ApiMessage { role: "user", content: question }],
            model: model.as_str(),
        };

        debug!("Completion request with model {}", model.as_str());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let body = Self::read_body(response).await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content))
    }

    async fn transcribe(&self, audio: &Path) -> Result<Option<String>, Error> {
        let io_err = |e: std::io::Error| Error::Io(format!("failed to read {}: {e}", audio.display()));
        let file = tokio::fs::File::open(audio).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        debug!("Uploading {len} bytes for transcription");

        // Streamed from disk; the attachment is never held in memory whole.
        let part = reqwest::multipart::Part::stream_with_length(file, len).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", TRANSCRIPTION_MODEL)
            .text("prompt", "")
            .text("response_format", "json")
            .text("language", "en")
            .text("temperature", "0");

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let body = Self::read_body(response).await?;
        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|e| Error::Parse(e.to_string()))?;

        Ok(parsed.text)
    }
}

#[derive(Debug)]
pub enum Error {
    Io(String),
    Http(String),
    Api(String),
    Parse(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for Error {}
