//! Configuration loading and types for reword
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/reword/config.toml)
//! 3. Environment variables (REWORD_*)
//! 4. CLI arguments (highest priority)
//!
//! The daemon only ever reads this file; editing and persistence belong to
//! whatever front-end the user runs.

use crate::error::RewordError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Reword Configuration
#
# Location: ~/.config/reword/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for default location ($XDG_RUNTIME_DIR/reword/state),
# a custom path, or "disabled" to turn off. The daemon writes state
# ("idle", "fixing", "session") to this file whenever it changes.
state_file = "auto"

[llm]
# Backend wire protocol: "ollama" or "openai"
# - ollama: POST /api/generate, newline-delimited JSON response
# - openai: POST /v1/chat/completions, single JSON response
backend = "ollama"

# Base URL of the LLM server
base_url = "http://localhost:11434"

# Model name to request
# List what the server offers with: reword models
model = "gemma3"

[shortcuts.fix]
# One-shot grammar fix: capture selection, rewrite, replace in place
# Key names are evdev KEY_* constants without the prefix; at least one
# modifier is required. Use `evtest` to find key names for your keyboard.
key = "F9"
modifiers = ["LEFTCTRL", "LEFTALT"]

[shortcuts.rewrite]
# Open a rewrite session with all configured modes
key = "F10"
modifiers = ["LEFTCTRL", "LEFTALT"]

[notification]
# Desktop notification when the fix action fails (no text is mutated)
on_error = true

# Optional: mode used by the fix shortcut and focused first in sessions.
# Falls back to plain grammar fixing (fix) / the first mode (rewrite)
# when unset or no longer present in the list. Keep this line above any
# [[modes]] table so TOML reads it as a top-level key.
# default_mode = "f47ac10b-58cc-4372-a567-0e02b2c3d479"

# Rewrite modes, in display order. Each needs a stable unique id.
# A mode named "My Tone" treats its prompt as a tone description;
# any other mode's prompt is used as the rewrite instruction verbatim.
#
# [[modes]]
# id = "f47ac10b-58cc-4372-a567-0e02b2c3d479"
# name = "Professional"
# prompt = "Rewrite the following text in a clear, professional register."
"#;

/// Stable identity of a rewrite mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModeId(pub Uuid);

impl ModeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ModeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ModeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A user-configured rewrite mode: a named prompt template
///
/// An empty name or prompt is valid; such a mode produces a pass-through
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteMode {
    pub id: ModeId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub prompt: String,
}

/// LLM backend wire protocol selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama generate API (newline-delimited JSON stream)
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions API (single JSON response)
    OpenAi,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// LLM client configuration, read fresh at every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,
}

/// One global shortcut binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutConfig {
    /// Key name (evdev KEY_* constant name, without the KEY_ prefix)
    /// Examples: "F9", "R", "SPACE"
    pub key: String,

    /// Modifier keys that must also be held. At least one is required;
    /// bare-key global bindings are rejected at startup.
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// The two global shortcut bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutsConfig {
    #[serde(default = "default_fix_shortcut")]
    pub fix: ShortcutConfig,

    #[serde(default = "default_rewrite_shortcut")]
    pub rewrite: ShortcutConfig,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Notify when the fix action fails (connection error, empty selection)
    #[serde(default = "default_true")]
    pub on_error: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { on_error: true }
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    /// Rewrite modes in display order; ids are unique within the list
    #[serde(default)]
    pub modes: Vec<RewriteMode>,

    /// Mode used by the fix shortcut and focused first in rewrite sessions
    #[serde(default)]
    pub default_mode: Option<ModeId>,

    #[serde(default)]
    pub shortcuts: ShortcutsConfig,

    #[serde(default)]
    pub notification: NotificationConfig,

    /// Optional path to state file for external integrations (e.g., Waybar).
    /// When set, the daemon writes current state ("idle", "fixing",
    /// "session") to this file whenever it changes.
    #[serde(default = "default_state_file")]
    pub state_file: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "gemma3".to_string()
}

fn default_fix_shortcut() -> ShortcutConfig {
    ShortcutConfig {
        key: "F9".to_string(),
        modifiers: vec!["LEFTCTRL".to_string(), "LEFTALT".to_string()],
    }
}

fn default_rewrite_shortcut() -> ShortcutConfig {
    ShortcutConfig {
        key: "F10".to_string(),
        modifiers: vec!["LEFTCTRL".to_string(), "LEFTALT".to_string()],
    }
}

fn default_state_file() -> Option<String> {
    Some("auto".to_string())
}

fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Ollama,
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

impl Default for ShortcutsConfig {
    fn default() -> Self {
        Self {
            fix: default_fix_shortcut(),
            rewrite: default_rewrite_shortcut(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            modes: vec![],
            default_mode: None,
            shortcuts: ShortcutsConfig::default(),
            notification: NotificationConfig::default(),
            state_file: default_state_file(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "reword")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, control socket)
    pub fn runtime_dir() -> PathBuf {
        // Use XDG_RUNTIME_DIR if available, otherwise fall back to /tmp
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("reword")
    }

    /// Path of the control socket used by the session UI and CLI
    pub fn control_socket_path() -> PathBuf {
        Self::runtime_dir().join("control.sock")
    }

    /// Resolve the state file path from config
    ///
    /// Returns None if state_file is not configured or explicitly disabled.
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file.as_ref().and_then(|path| {
            match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            }
        })
    }

    /// Look up a mode by id in the current list
    pub fn mode(&self, id: ModeId) -> Option<&RewriteMode> {
        self.modes.iter().find(|m| m.id == id)
    }

    /// The configured default mode, if it still exists in the mode list
    pub fn default_mode(&self) -> Option<&RewriteMode> {
        self.default_mode.and_then(|id| self.mode(id))
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, RewordError> {
    // Start with defaults
    let mut config = Config::default();

    // Determine config file path
    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    // Load from file if it exists
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| RewordError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| RewordError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    // Override from environment variables
    if let Ok(url) = std::env::var("REWORD_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Ok(model) = std::env::var("REWORD_MODEL") {
        config.llm.model = model;
    }
    if let Ok(backend) = std::env::var("REWORD_BACKEND") {
        config.llm.backend = match backend.to_lowercase().as_str() {
            "openai" => BackendKind::OpenAi,
            _ => BackendKind::Ollama,
        };
    }

    validate_modes(&config)?;

    Ok(config)
}

/// Reject configurations with duplicate mode ids
fn validate_modes(config: &Config) -> Result<(), RewordError> {
    let mut seen = std::collections::HashSet::new();
    for mode in &config.modes {
        if !seen.insert(mode.id) {
            return Err(RewordError::Config(format!(
                "Duplicate mode id: {}",
                mode.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).expect("default config should parse");
        assert_eq!(config.llm.backend, BackendKind::Ollama);
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.shortcuts.fix.key, "F9");
        assert!(config.modes.is_empty());
    }

    #[test]
    fn test_modes_parse_with_default_mode() {
        let toml_src = r#"
            [llm]
            backend = "openai"
            base_url = "http://localhost:8080"
            model = "test-model"

            default_mode = "f47ac10b-58cc-4372-a567-0e02b2c3d479"

            [[modes]]
            id = "f47ac10b-58cc-4372-a567-0e02b2c3d479"
            name = "Professional"
            prompt = "Rewrite professionally."

            [[modes]]
            id = "9b2d6d3e-1f51-4f68-b21c-79b8b9c2d6aa"
            name = "My Tone"
            prompt = "casual, direct"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.modes.len(), 2);
        assert_eq!(config.llm.backend, BackendKind::OpenAi);

        let default = config.default_mode().expect("default mode should resolve");
        assert_eq!(default.name, "Professional");
    }

    #[test]
    fn test_default_mode_missing_from_list_resolves_to_none() {
        let toml_src = r#"
            default_mode = "f47ac10b-58cc-4372-a567-0e02b2c3d479"

            [[modes]]
            id = "9b2d6d3e-1f51-4f68-b21c-79b8b9c2d6aa"
            name = "Other"
            prompt = "p"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert!(config.default_mode().is_none());
    }

    #[test]
    fn test_duplicate_mode_ids_rejected() {
        let config = Config {
            modes: vec![
                RewriteMode {
                    id: ModeId("f47ac10b-58cc-4372-a567-0e02b2c3d479".parse().unwrap()),
                    name: "A".into(),
                    prompt: "a".into(),
                },
                RewriteMode {
                    id: ModeId("f47ac10b-58cc-4372-a567-0e02b2c3d479".parse().unwrap()),
                    name: "B".into(),
                    prompt: "b".into(),
                },
            ],
            ..Config::default()
        };
        assert!(validate_modes(&config).is_err());
    }

    #[test]
    fn test_resolve_state_file() {
        let mut config = Config::default();

        config.state_file = Some("disabled".to_string());
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("/tmp/custom-state".to_string());
        assert_eq!(
            config.resolve_state_file(),
            Some(PathBuf::from("/tmp/custom-state"))
        );

        config.state_file = Some("auto".to_string());
        let auto = config.resolve_state_file().unwrap();
        assert!(auto.ends_with("reword/state"));
    }

    #[test]
    fn test_empty_mode_fields_are_valid() {
        let toml_src = r#"
            [[modes]]
            id = "9b2d6d3e-1f51-4f68-b21c-79b8b9c2d6aa"
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.modes[0].name, "");
        assert_eq!(config.modes[0].prompt, "");
    }
}
