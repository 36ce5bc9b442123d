//! Slash command definitions and startup registration.

use async_trait::async_trait;
use serenity::all::{Command, CommandOptionType, CreateCommand, CreateCommandOption, Http};
use tracing::{error, info};

use crate::groq::Model;

/// The commands this bot answers, keyed by their registered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Ask,
    SpeechToText,
}

impl CommandKind {
    pub const ALL: [CommandKind; 2] = [CommandKind::Ask, CommandKind::SpeechToText];

    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::Ask => "ask",
            CommandKind::SpeechToText => "speechtotext",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Schema registered with Discord.
    pub fn definition(&self) -> CreateCommand {
        match self {
            CommandKind::Ask => {
                let model = Model::ALL.into_iter().fold(
                    CreateCommandOption::new(
                        CommandOptionType::String,
                        "model",
                        "Model to answer with (defaults to Llama 3 70B)",
                    ),
                    |option, m| option.add_string_choice(m.label(), m.as_str()),
                );
                CreateCommand::new(self.name())
                    .description("Ask a language model a question")
                    .add_option(
                        CreateCommandOption::new(
                            CommandOptionType::String,
                            "question",
                            "What do you want to ask?",
                        )
                        .required(true),
                    )
                    .add_option(model)
            }
            CommandKind::SpeechToText => CreateCommand::new(self.name())
                .description("Transcribe an audio file to text")
                .add_option(
                    CreateCommandOption::new(
                        CommandOptionType::Attachment,
                        "audio",
                        "Audio file to transcribe",
                    )
                    .required(true),
                ),
        }
    }
}

pub fn definitions() -> Vec<CreateCommand> {
    CommandKind::ALL.iter().map(|c| c.definition()).collect()
}

/// Remote store of the application's global commands.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    /// Replace every global command with `commands`.
    async fn set_commands(&self, commands: Vec<CreateCommand>) -> Result<usize, String>;
}

#[async_trait]
impl CommandRegistry for Http {
    async fn set_commands(&self, commands: Vec<CreateCommand>) -> Result<usize, String> {
        Command::set_global_commands(self, commands)
            .await
            .map(|registered| registered.len())
            .map_err(|e| e.to_string())
    }
}

/// Clear every registered command, then register ours.
///
/// Failures are logged and swallowed; the bot keeps running without commands.
pub async fn register_commands<R: CommandRegistry + ?Sized>(registry: &R) {
    info!("Clearing registered commands");
    if let Err(e) = registry.set_commands(Vec::new()).await {
        error!("Failed to clear commands: {e}");
        return;
    }

    match registry.set_commands(definitions()).await {
        Ok(count) => info!("Registered {count} commands"),
        Err(e) => error!("Failed to register commands: {e}"),
    }
}
