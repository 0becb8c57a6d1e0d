//! Persistent settings – reads/writes `~/.pitwall/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use pitwall_agent::AgentConfig;
use pitwall_telemetry::{Connector, HttpConnector, SimConnector};
use pitwall_types::PitwallError;

/// Where racing data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Telemetry server next to the simulator.
    #[default]
    Http,
    /// Built-in simulated session.
    Sim,
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(SourceKind::Http),
            "sim" => Ok(SourceKind::Sim),
            other => Err(format!("unknown source '{other}' (expected http or sim)")),
        }
    }
}

/// Persisted user configuration stored in `~/.pitwall/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chat model identifier (e.g. "gpt-4", "gpt-4o").
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OpenAI API key (stored as plain text – the file is written owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub openai_api_key: String,

    /// Racing data source.
    #[serde(default)]
    pub source: SourceKind,

    /// Telemetry server URL, used when `source = "http"`.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Telemetry server request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Recent conversation entries sent with each request.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// TCP port for `pitwall serve`.
    #[serde(default = "default_serve_port")]
    pub serve_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field(
                "openai_api_key",
                if self.openai_api_key.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("source", &self.source)
            .field("server_url", &self.server_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("context_window", &self.context_window)
            .field("serve_port", &self.serve_port)
            .finish()
    }
}

fn default_model() -> String {
    "gpt-4".to_string()
}
fn default_api_base_url() -> String {
    pitwall_agent::DEFAULT_BASE_URL.to_string()
}
fn default_server_url() -> String {
    pitwall_telemetry::http::DEFAULT_SERVER_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    500
}
fn default_context_window() -> usize {
    5
}
fn default_serve_port() -> u16 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            openai_api_key: String::new(),
            source: SourceKind::default(),
            server_url: default_server_url(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_window: default_context_window(),
            serve_port: default_serve_port(),
        }
    }
}

impl Config {
    /// Agent settings; a blank key is passed through as absent.
    pub fn agent_config(&self) -> AgentConfig {
        let key = Some(self.openai_api_key.clone()).filter(|k| !k.trim().is_empty());
        AgentConfig {
            base_url: self.api_base_url.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            context_window: self.context_window,
            ..AgentConfig::new(self.model.clone(), key)
        }
    }

    /// Connector for the configured data source.
    pub fn connector(&self) -> Box<dyn Connector> {
        match self.source {
            SourceKind::Http => Box::new(HttpConnector::new(
                self.server_url.clone(),
                Duration::from_secs(self.timeout_secs),
            )),
            SourceKind::Sim => Box::new(SimConnector::demo()),
        }
    }
}

/// Return the path to `~/.pitwall/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pitwall").join("config.toml")
}

/// Load the config from disk with environment overrides applied.
/// Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, PitwallError> {
    Ok(load_from(&config_path())?.map(|mut cfg| {
        apply_env_overrides(&mut cfg);
        cfg
    }))
}

/// Built-in defaults with environment overrides applied.
pub fn defaults_with_env() -> Config {
    let mut cfg = Config::default();
    apply_env_overrides(&mut cfg);
    cfg
}

/// Load the config from a specific path, without environment overrides.
pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, PitwallError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| PitwallError::Config(format!("Failed to read config at {}: {}", path.display(), e)))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| PitwallError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(Some(cfg))
}

/// Apply environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `OPENAI_API_KEY` | `openai_api_key` |
/// | `PITWALL_MODEL` | `model` |
/// | `PITWALL_API_BASE_URL` | `api_base_url` |
/// | `PITWALL_SOURCE` | `source` (`http` / `sim`) |
/// | `MCP_SERVER_URL` | `server_url` |
/// | `PITWALL_TIMEOUT_SECS` | `timeout_secs` |
/// | `PITWALL_SERVE_PORT` | `serve_port` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var(pitwall_agent::API_KEY_VAR) {
        cfg.openai_api_key = v;
    }
    if let Ok(v) = std::env::var("PITWALL_MODEL") {
        cfg.model = v;
    }
    if let Ok(v) = std::env::var("PITWALL_API_BASE_URL") {
        cfg.api_base_url = v;
    }
    if let Ok(v) = std::env::var("PITWALL_SOURCE")
        && let Ok(source) = v.parse::<SourceKind>()
    {
        cfg.source = source;
    }
    if let Ok(v) = std::env::var("MCP_SERVER_URL") {
        cfg.server_url = v;
    }
    if let Ok(v) = std::env::var("PITWALL_TIMEOUT_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.timeout_secs = secs;
    }
    if let Ok(v) = std::env::var("PITWALL_SERVE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.serve_port = port;
    }
}

/// Save the config to disk, creating `~/.pitwall/` if necessary.
pub fn save(cfg: &Config) -> Result<(), PitwallError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), PitwallError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PitwallError::Config(format!("Failed to create config directory: {}", e)))?;
        // Owner only (rwx------): the file may hold an API key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| PitwallError::Config(format!("Failed to set config directory permissions: {}", e)))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| PitwallError::Config(format!("Failed to serialize config: {}", e)))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| PitwallError::Config(format!("Failed to write config at {}: {}", path.display(), e)))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| PitwallError::Config(format!("Failed to write config at {}: {}", path.display(), e)))?;
    Ok(())
}
