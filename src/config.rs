use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::{ActionDescriptor, ActionRegistry, RegistryError};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

/// Insecure fallback for the secret key. Change it via `YTCONTROL_SECRET_KEY`.
pub const DEFAULT_SECRET_KEY: &str = "KEY";

/// Optional config file, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerSection>,
    /// Replaces the built-in hotkey table when non-empty.
    #[serde(default)]
    pub hotkeys: Vec<ActionDescriptor>,
}

/// `[server]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl FileConfig {
    /// Load config from a TOML file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub secret_key: Option<String>,
}

/// Process-wide settings, fixed at startup.
#[derive(Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    secret_key: String,
    pub actions: Arc<ActionRegistry>,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret_key", &"<redacted>")
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl Settings {
    /// Resolve settings: overrides first, then the config file, then defaults.
    pub fn resolve(overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let section = file.server.unwrap_or_default();

        let actions = if file.hotkeys.is_empty() {
            ActionRegistry::builtin()
        } else {
            ActionRegistry::from_descriptors(file.hotkeys).map_err(ConfigError::InvalidHotkeys)?
        };

        let host = overrides
            .host
            .or(section.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }

        Ok(Self {
            host,
            port: overrides.port.or(section.port).unwrap_or(DEFAULT_PORT),
            secret_key: overrides
                .secret_key
                .unwrap_or_else(|| DEFAULT_SECRET_KEY.to_string()),
            actions: Arc::new(actions),
        })
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn uses_default_secret(&self) -> bool {
        self.secret_key == DEFAULT_SECRET_KEY
    }

    /// Copy with a different port, used once the listener reports the real one.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.authority())
    }

    /// URL the browser user script connects to.
    pub fn websocket_url(&self) -> String {
        format!(
            "ws://{}/socket.io/?EIO=4&transport=websocket",
            self.authority()
        )
    }

    /// Lines printed once the server is listening.
    pub fn startup_summary(&self) -> Vec<String> {
        let mut lines = vec![
            "Desktop YouTube Controller Server".to_string(),
            format!("Server URL: {}", self.http_url()),
            format!("WebSocket URL for the user script: {}", self.websocket_url()),
            "Only the websocket transport is served: connect with \
             io(url, { transports: ['websocket'] })"
                .to_string(),
            "Registered hotkeys:".to_string(),
        ];
        lines.extend(self.actions.iter().map(|descriptor| {
            format!(
                "  - {}: {} (emits '{}')",
                descriptor.key_combination.to_uppercase(),
                descriptor.log_message,
                descriptor.action_name
            )
        }));
        lines.push("Press Ctrl+C to stop the server and hotkey listener.".to_string());
        lines
    }

    /// `host:port`, with IPv6 literals bracketed.
    fn authority(&self) -> String {
        if self.host.parse::<std::net::Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Errors that can occur when resolving configuration.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(PathBuf, std::io::Error),
    ParseFailed(PathBuf, toml::de::Error),
    InvalidHotkeys(RegistryError),
    EmptyHost,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
            Self::InvalidHotkeys(e) => write!(f, "Invalid hotkey table: {}", e),
            Self::EmptyHost => write!(f, "Bind host must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
