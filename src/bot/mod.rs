//! Bot module - relays Discord slash commands to the Groq API.

pub mod chunk;
pub mod commands;
pub mod discord;
pub mod dispatch;
pub mod scratch;


pub use commands::{register_commands, CommandKind};
pub use discord::Handler;
pub use dispatch::{BotState, Invocation};
