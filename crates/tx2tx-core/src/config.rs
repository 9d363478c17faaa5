//! YAML configuration loading for both roles.
//!
//! One file configures the server (thresholds, hotkeys, client placements)
//! and the client (server address, reconnect policy). Fields absent from the
//! file fall back to the `#[serde(default = "...")]` helpers, so a minimal
//! file, or no file at all, still produces a runnable configuration.
//!
//! Search order when no `--config` path is given: `config.yml` in the
//! working directory, `~/.config/tx2tx/config.yml`, `/etc/tx2tx/config.yml`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::context::ScreenContext;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system error while reading the config file.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The YAML content could not be parsed into the schema.
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two clients claim the same cardinal position.
    #[error("clients {first} and {second} share position '{position}'")]
    DuplicatePosition {
        position: ClientPosition,
        first: String,
        second: String,
    },

    /// Two clients share a name.
    #[error("duplicate client name '{name}' in config")]
    DuplicateName { name: String },

    /// A field value is out of its valid range.
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration shared by the server and client roles.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub clients: Vec<ClientPlacement>,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-role settings: listen address, transition thresholds, hotkeys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the TCP listener to.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Pixels from the screen edge that count as "at the edge".
    #[serde(default)]
    pub edge_threshold: i32,
    /// Minimum pointer velocity (px/s) required to cross a boundary.
    #[serde(default = "default_velocity_threshold")]
    pub velocity_threshold: f64,
    /// Polling-loop tick period in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Key that unconditionally returns control to the server.
    #[serde(default)]
    pub panic_key: PanicKeyConfig,
    /// Prefix-plus-action sequence for jumping straight to a context.
    #[serde(default)]
    pub jump_hotkey: JumpHotkeyConfig,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            edge_threshold: 0,
            velocity_threshold: default_velocity_threshold(),
            poll_interval_ms: default_poll_interval_ms(),
            panic_key: PanicKeyConfig::default(),
            jump_hotkey: JumpHotkeyConfig::default(),
            max_clients: default_max_clients(),
        }
    }
}

/// Cardinal placement of a client relative to the server screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientPosition {
    West,
    East,
    North,
    South,
}

impl ClientPosition {
    /// The screen context a client at this position controls.
    pub fn context(self) -> ScreenContext {
        match self {
            ClientPosition::West => ScreenContext::West,
            ClientPosition::East => ScreenContext::East,
            ClientPosition::North => ScreenContext::North,
            ClientPosition::South => ScreenContext::South,
        }
    }
}

impl std::fmt::Display for ClientPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientPosition::West => "west",
            ClientPosition::East => "east",
            ClientPosition::North => "north",
            ClientPosition::South => "south",
        };
        f.write_str(s)
    }
}

/// A named client bound to exactly one cardinal position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientPlacement {
    pub name: String,
    pub position: ClientPosition,
}

/// Panic key: a key name plus optional modifier names.
///
/// Accepts two YAML spellings: the structured mapping
/// `{key: Escape, modifiers: [Ctrl, Shift]}` and the compact string
/// `"Ctrl+Shift+Escape"` (last token is the key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PanicKeyDe")]
pub struct PanicKeyConfig {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

impl Default for PanicKeyConfig {
    fn default() -> Self {
        Self { key: "Scroll_Lock".to_string(), modifiers: Vec::new() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PanicKeyDe {
    Combo(String),
    Full {
        key: String,
        #[serde(default)]
        modifiers: Vec<String>,
    },
}

impl From<PanicKeyDe> for PanicKeyConfig {
    fn from(de: PanicKeyDe) -> Self {
        match de {
            PanicKeyDe::Combo(spec) => {
                let mut parts: Vec<String> = spec.split('+').map(str::to_string).collect();
                let key = parts.pop().unwrap_or_default();
                PanicKeyConfig { key, modifiers: parts }
            }
            PanicKeyDe::Full { key, modifiers } => PanicKeyConfig { key, modifiers },
        }
    }
}

/// Jump hotkey: a prefix combination arming a short window in which a single
/// action key selects the destination context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JumpHotkeyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefix combination, e.g. `"Ctrl+slash"`.
    #[serde(default = "default_jump_prefix")]
    pub prefix: String,
    /// How long the armed window stays open for the action key.
    #[serde(default = "default_jump_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for JumpHotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: default_jump_prefix(),
            timeout_ms: default_jump_timeout_ms(),
        }
    }
}

/// Client-role settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_server_address")]
    pub server_address: String,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { server_address: default_server_address(), reconnect: ReconnectConfig::default() }
    }
}

/// Client reconnection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconnect_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_reconnect_delay")]
    pub delay_seconds: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_reconnect_attempts(),
            delay_seconds: default_reconnect_delay(),
        }
    }
}

/// Which display backend implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    X11,
    Wayland,
}

/// Display backend selection plus backend-specific options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub name: BackendKind,
    #[serde(default)]
    pub wayland: WaylandConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { name: default_backend_kind(), wayland: WaylandConfig::default() }
    }
}

/// Options for the helper-mediated Wayland backend.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WaylandConfig {
    /// Command line for the out-of-process helper daemon.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_command: Option<String>,
    /// Fallback geometry when the helper cannot report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter level: `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    24800
}
fn default_velocity_threshold() -> f64 {
    100.0
}
fn default_poll_interval_ms() -> u64 {
    20
}
fn default_max_clients() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_jump_prefix() -> String {
    "Ctrl+slash".to_string()
}
fn default_jump_timeout_ms() -> u64 {
    1000
}
fn default_server_address() -> String {
    "127.0.0.1:24800".to_string()
}
fn default_reconnect_attempts() -> u32 {
    10
}
fn default_reconnect_delay() -> f64 {
    2.0
}
fn default_backend_kind() -> BackendKind {
    BackendKind::X11
}
fn default_log_level() -> String {
    "info".to_string()
}

// ── Loading and validation ────────────────────────────────────────────────────

/// CLI overrides applied on top of the loaded file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub backend: Option<BackendKind>,
    pub server_address: Option<String>,
}

impl Config {
    /// Search paths probed when no explicit `--config` path is given.
    pub const DEFAULT_CONFIG_PATHS: [&'static str; 3] =
        ["config.yml", "~/.config/tx2tx/config.yml", "/etc/tx2tx/config.yml"];

    /// Finds a config file in the standard locations.
    pub fn discover_path() -> Option<PathBuf> {
        for candidate in Self::DEFAULT_CONFIG_PATHS {
            let path = expand_home(candidate);
            if path.is_file() {
                return Some(path);
            }
        }
        None
    }

    /// Loads and validates configuration.
    ///
    /// With an explicit `path` the file must exist. Without one, the standard
    /// locations are searched and a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] / [`ConfigError::Parse`] for unreadable or
    /// malformed files and the validation variants for semantic errors.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let resolved = match path {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover_path(),
        };

        let config = match resolved {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                Self::parse(&content)?
            }
            None => {
                tracing::debug!("no config file found, using defaults");
                Config::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document into a config without validating it.
    pub fn parse(yaml: &str) -> Result<Config, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Checks semantic constraints that the schema alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut positions: HashMap<ClientPosition, &str> = HashMap::new();
        let mut names: HashSet<&str> = HashSet::new();

        for placement in &self.clients {
            if let Some(first) = positions.insert(placement.position, &placement.name) {
                return Err(ConfigError::DuplicatePosition {
                    position: placement.position,
                    first: first.to_string(),
                    second: placement.name.clone(),
                });
            }
            if !names.insert(&placement.name) {
                return Err(ConfigError::DuplicateName { name: placement.name.clone() });
            }
        }

        if self.server.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.poll_interval_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.max_clients == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_clients",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.server.velocity_threshold < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "server.velocity_threshold",
                reason: "must not be negative".to_string(),
            });
        }
        if self.server.edge_threshold < 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.edge_threshold",
                reason: "must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Applies CLI overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(backend) = overrides.backend {
            self.backend.name = backend;
        }
        if let Some(addr) = &overrides.server_address {
            self.client.server_address = addr.clone();
        }
    }

    /// The context → client-name routing map built from the placements.
    pub fn routes(&self) -> HashMap<ScreenContext, String> {
        self.clients
            .iter()
            .map(|placement| (placement.position.context(), placement.name.clone()))
            .collect()
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
