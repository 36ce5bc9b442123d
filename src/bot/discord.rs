//! Discord gateway glue using serenity.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{
    CommandInteraction, Context, CreateInteractionResponseFollowup, EventHandler, Http,
    Interaction, Ready, ResolvedOption, ResolvedValue,
};
use tracing::{info, warn};

use crate::bot::chunk::Reply;
use crate::bot::dispatch::{self, ArgValue, AttachmentRef, BotState};

/// Sends follow-up messages for a deferred interaction.
pub struct FollowupReply<'a> {
    http: Arc<Http>,
    command: &'a CommandInteraction,
}

impl<'a> FollowupReply<'a> {
    pub fn new(http: Arc<Http>, command: &'a CommandInteraction) -> Self {
        Self { http, command }
    }
}

#[async_trait]
impl Reply for FollowupReply<'_> {
    async fn send(&self, text: &str) -> Result<(), String> {
        self.command
            .create_followup(&self.http, CreateInteractionResponseFollowup::new().content(text))
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send follow-up: {e}"))
    }
}

/// Gateway event handler routing slash commands to the dispatcher.
pub struct Handler {
    state: Arc<BotState>,
}

impl Handler {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }
}

/// Flatten resolved options into owned values, dropping kinds no command takes.
pub fn option_args(options: &[ResolvedOption<'_>]) -> Vec<(String, ArgValue)> {
    options
        .iter()
        .filter_map(|option| {
            let value = match &option.value {
                ResolvedValue::String(s) => ArgValue::Text(s.to_string()),
                ResolvedValue::Attachment(a) => ArgValue::Attachment(AttachmentRef {
                    filename: a.filename.clone(),
                    url: a.url.clone(),
                }),
                _ => return None,
            };
            Some((option.name.to_string(), value))
        })
        .collect()
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("Connected as {}", ready.user.name);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };

        let name = command.data.name.as_str();
        info!("/{} from {} ({})", name, command.user.name, command.user.id);

        // Acknowledge first: Discord drops interactions not answered within 3 seconds
        if let Err(e) = command.defer(&ctx.http).await {
            warn!("Failed to defer /{name}: {e}");
            return;
        }

        let args = option_args(&command.data.options());
        let reply = FollowupReply::new(ctx.http.clone(), &command);
        dispatch::handle_command(&self.state, name, &args, &reply).await;
    }
}
