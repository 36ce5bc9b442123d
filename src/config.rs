use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Default Groq endpoint (OpenAI-compatible).
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Config file read when none is named on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "relaybot.json";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    /// Discord bot token. Falls back to `DISCORD_TOKEN`.
    #[serde(default)]
    discord_token: Option<String>,
    /// Application (client) ID. Falls back to `CLIENT_ID`.
    #[serde(default)]
    application_id: Option<u64>,
    /// Groq API key. Falls back to `GROQ_API_KEY`.
    #[serde(default)]
    groq_api_key: Option<String>,
    groq_base_url: Option<String>,
    /// Where attachments are downloaded before transcription.
    scratch_dir: Option<String>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
    /// Discord channel that receives a copy of the bot's logs.
    log_channel_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub application_id: u64,
    pub groq_api_key: String,
    /// Base URL of the inference API, without trailing slash.
    pub groq_base_url: String,
    pub scratch_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_channel_id: Option<u64>,
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
    serde_json::from_str(&content)
        .map_err(|e| ConfigError::ParseJson { path: path.to_path_buf(), source: e })
}

impl Config {
    /// Load from a JSON file, filling missing secrets from the process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] with an explicit environment lookup.
    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let file = read_file(path.as_ref())?;
        Self::from_file(file, env)
    }

    /// Load from `path` if it exists; otherwise configure from the environment alone.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_optional_with_env(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load_optional`] with an explicit environment lookup.
    pub fn load_optional_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let file = match read_file(path.as_ref()) {
            Err(ConfigError::ReadFile { source, .. }) if source.kind() == ErrorKind::NotFound => {
                ConfigFile::default()
            }
            other => other?,
        };
        Self::from_file(file, env)
    }

    fn from_file<F>(file: ConfigFile, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let discord_token = non_empty(file.discord_token)
            .or_else(|| non_empty(env("DISCORD_TOKEN")))
            .ok_or_else(|| ConfigError::Validation("discord_token is required".into()))?;
        // Discord tokens are three base64 segments joined by dots
        let parts: Vec<&str> = discord_token.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Validation(
                "discord_token appears invalid (expected three dot-separated segments)".into(),
            ));
        }

        let application_id = match file.application_id {
            Some(id) => id,
            None => match env("CLIENT_ID") {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    ConfigError::Validation(format!("CLIENT_ID is not a numeric id: {raw:?}"))
                })?,
                None => 0,
            },
        };
        if application_id == 0 {
            return Err(ConfigError::Validation("application_id is required".into()));
        }

        let groq_api_key = non_empty(file.groq_api_key)
            .or_else(|| non_empty(env("GROQ_API_KEY")))
            .ok_or_else(|| ConfigError::Validation("groq_api_key is required".into()))?;

        let groq_base_url = file
            .groq_base_url
            .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let scratch_dir = file
            .scratch_dir
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            discord_token,
            application_id,
            groq_api_key,
            groq_base_url,
            scratch_dir,
            data_dir,
            log_channel_id: file.log_channel_id.filter(|id| *id != 0),
        })
    }
}
