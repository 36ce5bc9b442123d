use std::process::ExitCode;
use std::sync::Arc;

use serenity::all::{ApplicationId, ChannelId, GatewayIntents, Http};
use serenity::Client;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use relaybot::bot::{register_commands, BotState, Handler};
use relaybot::config::{Config, DEFAULT_CONFIG_PATH};
use relaybot::discord_log::DiscordLogLayer;

#[tokio::main]
async fn main() -> ExitCode {
    // A path given on the command line must exist; the default one may be absent
    let (config_path, loaded) = match std::env::args().nth(1) {
        Some(path) => {
            let loaded = Config::load(&path);
            (path, loaded)
        }
        None => (DEFAULT_CONFIG_PATH.to_string(), Config::load_optional(DEFAULT_CONFIG_PATH)),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("relaybot.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_channel_id) = config.log_channel_id {
        let http = Arc::new(Http::new(&config.discord_token));
        let discord_layer = DiscordLogLayer::new(http, ChannelId::new(log_channel_id));
        registry.with(discord_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting relaybot...");
    info!("Config path: {config_path}");
    info!("Scratch dir: {:?}", config.scratch_dir);

    let token = config.discord_token.clone();
    let application_id = ApplicationId::new(config.application_id);
    let state = Arc::new(BotState::new(config));

    let mut client = match Client::builder(&token, GatewayIntents::empty())
        .application_id(application_id)
        .event_handler(Handler::new(state))
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create Discord client: {e}");
            return ExitCode::FAILURE;
        }
    };

    register_commands(&*client.http).await;

    if let Err(e) = client.start().await {
        error!("Discord client stopped: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
