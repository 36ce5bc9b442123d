//! Command dispatch: parsed invocations in, reply text out.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bot::chunk::{send_chunked, Reply};
use crate::bot::commands::CommandKind;
use crate::bot::scratch::{download_to, ScratchFile};
use crate::config::Config;
use crate::groq::{self, Inference, Model};

pub const NO_COMPLETION: &str = "No response from AI model.";
pub const NO_TRANSCRIPTION: &str = "No transcription returned.";
pub const ASK_FAILED: &str = "There was an error processing your request.";
pub const TRANSCRIBE_FAILED: &str = "There was an error transcribing the audio.";

/// An uploaded file as referenced by the interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
}

/// Option values we care about, lifted out of the platform's types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Text(String),
    Attachment(AttachmentRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Ask { question: String, model: Option<Model> },
    SpeechToText { audio: AttachmentRef },
}

impl Invocation {
    /// Build an invocation from a command name and its resolved options.
    pub fn parse(name: &str, args: &[(String, ArgValue)]) -> Result<Self, HandlerError> {
        let kind = CommandKind::from_name(name)
            .ok_or_else(|| HandlerError::BadInvocation(format!("unknown command '{name}'")))?;
        let arg = |key: &str| args.iter().find(|(k, _)| k == key).map(|(_, v)| v);

        match kind {
            CommandKind::Ask => {
                let question = match arg("question") {
                    Some(ArgValue::Text(q)) => q.clone(),
                    _ => return Err(HandlerError::BadInvocation("question is required".into())),
                };
                let model = match arg("model") {
                    None => None,
                    Some(ArgValue::Text(id)) => Some(Model::from_id(id).ok_or_else(|| {
                        HandlerError::BadInvocation(format!("unknown model '{id}'"))
                    })?),
                    Some(_) => {
                        return Err(HandlerError::BadInvocation("model must be text".into()));
                    }
                };
                Ok(Invocation::Ask { question, model })
            }
            CommandKind::SpeechToText => match arg("audio") {
                Some(ArgValue::Attachment(a)) => Ok(Invocation::SpeechToText { audio: a.clone() }),
                _ => Err(HandlerError::BadInvocation("audio attachment is required".into())),
            },
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Invocation::Ask { .. } => CommandKind::Ask,
            Invocation::SpeechToText { .. } => CommandKind::SpeechToText,
        }
    }
}

/// Errors raised while handling one command.
#[derive(Debug)]
pub enum HandlerError {
    BadInvocation(String),
    Download(String),
    Io(std::io::Error),
    Inference(groq::Error),
    Reply(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadInvocation(msg) => write!(f, "bad invocation: {msg}"),
            Self::Download(msg) => write!(f, "download failed: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Inference(e) => write!(f, "inference failed: {e}"),
            Self::Reply(msg) => write!(f, "reply failed: {msg}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Inference(e) => Some(e),
            _ => None,
        }
    }
}

impl From<groq::Error> for HandlerError {
    fn from(e: groq::Error) -> Self {
        Self::Inference(e)
    }
}

/// Process-wide state shared by every handler.
pub struct BotState {
    pub config: Config,
    pub inference: Arc<dyn Inference>,
    /// Used for attachment downloads.
    pub http: reqwest::Client,
}

impl BotState {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let inference: Arc<dyn Inference> = Arc::new(groq::Client::with_http(
            config.groq_api_key.clone(),
            config.groq_base_url.clone(),
            http.clone(),
        ));
        Self { config, inference, http }
    }
}

/// Answer `question` with `model`, or the default model when none was chosen.
pub async fn ask(state: &BotState, question: &str, model: Option<Model>) -> Result<String, HandlerError> {
    let model = model.unwrap_or_default();
    let content = state.inference.complete(model, question).await?;
    Ok(content
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| NO_COMPLETION.to_string()))
}

/// Download `audio` to a scratch file and transcribe it.
///
/// The scratch file is removed on every return path.
pub async fn speech_to_text(state: &BotState, audio: &AttachmentRef) -> Result<String, HandlerError> {
    tokio::fs::create_dir_all(&state.config.scratch_dir)
        .await
        .map_err(HandlerError::Io)?;
    let scratch = ScratchFile::reserve(&state.config.scratch_dir, &audio.filename);
    let result = transcribe_into(state, audio, scratch.path()).await;
    scratch.remove().await;
    result
}

async fn transcribe_into(state: &BotState, audio: &AttachmentRef, path: &Path) -> Result<String, HandlerError> {
    let bytes = download_to(&state.http, &audio.url, path)
        .await
        .map_err(HandlerError::Download)?;
    info!("Downloaded {} ({bytes} bytes)", audio.filename);

    let text = state.inference.transcribe(path).await?;
    Ok(text
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TRANSCRIPTION.to_string()))
}

/// Run the handler for `invocation` and return the text to deliver.
pub async fn run(state: &BotState, invocation: &Invocation) -> Result<String, HandlerError> {
    match invocation {
        Invocation::Ask { question, model } => ask(state, question, *model).await,
        Invocation::SpeechToText { audio } => speech_to_text(state, audio).await,
    }
}

fn failure_message(kind: CommandKind) -> &'static str {
    match kind {
        CommandKind::Ask => ASK_FAILED,
        CommandKind::SpeechToText => TRANSCRIBE_FAILED,
    }
}

/// Run `invocation` and deliver its result through `reply`.
///
/// Any failure becomes one generic follow-up; if that also fails it is only logged.
pub async fn handle<R: Reply + ?Sized>(state: &BotState, invocation: &Invocation, reply: &R) {
    let kind = invocation.kind();
    let result = match run(state, invocation).await {
        Ok(text) => send_chunked(reply, &text).await.map_err(HandlerError::Reply),
        Err(e) => Err(e),
    };

    match result {
        Ok(segments) => info!("/{} answered in {segments} message(s)", kind.name()),
        Err(e) => report_failure(kind.name(), failure_message(kind), &e, reply).await,
    }
}

/// Parse a deferred command and handle it.
///
/// The interaction is already acknowledged, so a malformed one still gets the
/// generic failure follow-up instead of being left pending.
pub async fn handle_command<R: Reply + ?Sized>(
    state: &BotState,
    name: &str,
    args: &[(String, ArgValue)],
    reply: &R,
) {
    match Invocation::parse(name, args) {
        Ok(invocation) => {
            debug!("Parsed {:?}", invocation);
            handle(state, &invocation, reply).await;
        }
        Err(e) => {
            let message = CommandKind::from_name(name).map_or(ASK_FAILED, failure_message);
            report_failure(name, message, &e, reply).await;
        }
    }
}

async fn report_failure<R: Reply + ?Sized>(name: &str, message: &str, error: &HandlerError, reply: &R) {
    warn!("/{name} failed: {error}");
    if let Err(e) = reply.send(message).await {
        warn!("Failed to send error follow-up for /{name}: {e}");
    }
}
