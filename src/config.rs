//! Configuration loading and types for saytype
//!
//! Configuration is loaded in layers:
//! 1. Built-in defaults
//! 2. Config file (~/.config/saytype/config.toml)
//! 3. Environment variables (SAYTYPE_*)
//! 4. CLI arguments (highest priority)

use crate::error::SaytypeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# Saytype Configuration
#
# Location: ~/.config/saytype/config.toml
# All settings can be overridden via CLI flags

# State file for external integrations (Waybar, polybar, etc.)
# Use "auto" for $XDG_RUNTIME_DIR/saytype/state, a custom path, or "disabled".
state_file = "auto"

[hotkey]
# Key to hold for dictation. An empty or unknown name refuses to start.
# Common choices: SCROLLLOCK, PAUSE, RIGHTALT, F13-F24
key = "SCROLLLOCK"

# Activation mode: "hold" or "toggle"
# - hold: Hold the key to record, release to transcribe (default)
# - toggle: Press toggle_key once to start recording, press again to stop
# mode = "hold"

# Key used in toggle mode (defaults to `key`)
# toggle_key = "F13"

# Key that cancels an active recording (empty disables)
# cancel_key = "ESC"

[audio]
# Audio input device ("default" uses system default)
device = "default"

# Sample rate in Hz (whisper expects 16000)
sample_rate = 16000

# Maximum recording duration in seconds (safety limit)
max_duration_secs = 120

# [audio.feedback]
# enabled = true
# theme = "default"   # "default", "subtle", or a directory with start/ready/cancel/error.wav
# volume = 0.7

[whisper]
# backend = "local"   # or "remote" for an OpenAI-compatible server
model = "base.en"
language = "en"
translate = false
# threads = 4
# remote_endpoint = "http://localhost:8080"

[output]
# Injection mode: "auto", "keystroke" or "paste"
# - auto: accessibility insertion when the focused widget supports it,
#         otherwise clipboard paste (Ctrl+Shift+V), then keystrokes
# - keystroke: simulated key events only
# - paste: clipboard + Ctrl+Shift+V, keystrokes if no clipboard tool exists
injection_mode = "auto"

# Delay between typed characters in milliseconds
type_delay_ms = 0

# Delay between staging the clipboard and sending the paste shortcut
paste_delay_ms = 80

# Optional accessibility helper command (see README)
# accessibility_helper = "saytype-a11y"

[output.notification]
on_transcription = false

[text]
# Spoken punctuation, formatting and undo commands
voice_commands = true

# Custom word replacements (case-insensitive)
# replacements = { "say type" = "saytype" }

[auto_timeout]
# Exit after this many idle minutes (only hotkey activity counts)
enabled = false
minutes = 30
"#;

/// Hotkey activation mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Hold key to record, release to stop (default)
    #[default]
    #[serde(alias = "push_to_talk")]
    Hold,
    /// Press once to start recording, press again to stop
    Toggle,
}

/// Configured text injection mode
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMode {
    /// Pick per utterance from what the focused application supports
    #[default]
    Auto,
    /// Simulated key events
    #[serde(alias = "type")]
    Keystroke,
    /// Clipboard staging plus the paste shortcut
    Paste,
}

impl std::str::FromStr for InjectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(InjectionMode::Auto),
            "keystroke" | "type" => Ok(InjectionMode::Keystroke),
            "paste" => Ok(InjectionMode::Paste),
            other => Err(format!("unknown injection mode '{}'", other)),
        }
    }
}

/// Transcription backend selection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum WhisperBackend {
    /// Local whisper.cpp inference
    #[default]
    Local,
    /// OpenAI-compatible HTTP endpoint
    Remote,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub hotkey: HotkeyConfig,
    pub audio: AudioConfig,
    pub whisper: WhisperConfig,
    pub output: OutputConfig,
    pub text: TextConfig,
    pub auto_timeout: AutoTimeoutConfig,

    /// Optional path to state file for external integrations (e.g., Waybar)
    /// "auto" resolves to the runtime directory, "disabled" turns it off.
    pub state_file: Option<String>,
}

/// Hotkey detection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Primary key name (evdev KEY_* constant name, without the KEY_ prefix)
    pub key: String,

    /// Key used in toggle mode; falls back to `key` when unset
    pub toggle_key: Option<String>,

    /// Key that cancels an active recording; empty disables
    pub cancel_key: String,

    /// Activation mode: hold (hold to record) or toggle (press to start/stop)
    pub mode: ActivationMode,

    /// Enable built-in hotkey detection
    /// When disabled, use `saytype record start/stop/toggle` to control recording
    pub enabled: bool,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            key: "SCROLLLOCK".to_string(),
            toggle_key: None,
            cancel_key: "ESC".to_string(),
            mode: ActivationMode::default(),
            enabled: true,
        }
    }
}

impl HotkeyConfig {
    /// Key name that starts and stops a recording in the configured mode
    pub fn trigger_key(&self) -> &str {
        match (self.mode, self.toggle_key.as_deref()) {
            (ActivationMode::Toggle, Some(toggle)) if !toggle.trim().is_empty() => toggle,
            _ => &self.key,
        }
    }
}

/// Audio capture configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// PipeWire/PulseAudio device name, or "default"
    pub device: String,

    /// Sample rate in Hz (whisper expects 16000)
    pub sample_rate: u32,

    /// Maximum recording duration in seconds (safety limit)
    pub max_duration_secs: u32,

    /// Audio feedback settings
    pub feedback: AudioFeedbackConfig,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "default".to_string(),
            sample_rate: 16000,
            max_duration_secs: 120,
            feedback: AudioFeedbackConfig::default(),
        }
    }
}

/// Audio feedback configuration for sound cues
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioFeedbackConfig {
    /// Enable audio feedback sounds
    pub enabled: bool,

    /// Sound theme: "default", "subtle", or path to custom theme directory
    pub theme: String,

    /// Volume level (0.0 to 1.0)
    pub volume: f32,
}

impl Default for AudioFeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            theme: "default".to_string(),
            volume: 0.7,
        }
    }
}

/// Whisper speech-to-text configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Local inference or remote endpoint
    pub backend: WhisperBackend,

    /// Model name: tiny, base, small, medium, large-v3, large-v3-turbo
    /// Can also be an absolute path to a .bin file
    pub model: String,

    /// Language code (en, es, fr, auto, etc.)
    pub language: String,

    /// Translate to English if source language is not English
    pub translate: bool,

    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,

    /// Remote server base URL (backend = "remote")
    pub remote_endpoint: Option<String>,

    /// Model name sent to the remote server
    pub remote_model: Option<String>,

    /// Bearer token for the remote server
    pub remote_api_key: Option<String>,

    /// Remote request timeout in seconds
    pub remote_timeout_secs: Option<u64>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            backend: WhisperBackend::Local,
            model: "base.en".to_string(),
            language: "en".to_string(),
            translate: false,
            threads: None,
            remote_endpoint: None,
            remote_model: None,
            remote_api_key: None,
            remote_timeout_secs: None,
        }
    }
}

/// Text processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TextConfig {
    /// Enable spoken punctuation, formatting and undo commands
    pub voice_commands: bool,

    /// Custom word replacements (case-insensitive)
    /// Example: { "say type" = "saytype" }
    pub replacements: HashMap<String, String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            voice_commands: true,
            replacements: HashMap::new(),
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Notify with the injected text after each utterance
    pub on_transcription: bool,
}

/// Text injection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// auto, keystroke or paste
    pub injection_mode: InjectionMode,

    /// Delay between typed characters (ms), 0 for fastest
    pub type_delay_ms: u32,

    /// Delay between staging the clipboard and sending the paste shortcut (ms)
    pub paste_delay_ms: u64,

    /// Command implementing the accessibility insertion protocol
    pub accessibility_helper: Option<String>,

    /// Notification settings
    pub notification: NotificationConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            injection_mode: InjectionMode::Auto,
            type_delay_ms: 0,
            paste_delay_ms: 80,
            accessibility_helper: None,
            notification: NotificationConfig::default(),
        }
    }
}

/// Idle auto-exit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoTimeoutConfig {
    /// Exit when no hotkey activity happened for `minutes`
    pub enabled: bool,

    /// Idle threshold in minutes
    pub minutes: u64,
}

impl Default for AutoTimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            minutes: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotkey: HotkeyConfig::default(),
            audio: AudioConfig::default(),
            whisper: WhisperConfig::default(),
            output: OutputConfig::default(),
            text: TextConfig::default(),
            auto_timeout: AutoTimeoutConfig::default(),
            state_file: Some("auto".to_string()),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "saytype")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the runtime directory for ephemeral files (state, pid, level)
    pub fn runtime_dir() -> PathBuf {
        std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join("saytype")
    }

    /// Resolve the state file path from config
    /// Returns None if state_file is not configured or explicitly disabled
    pub fn resolve_state_file(&self) -> Option<PathBuf> {
        self.state_file.as_ref().and_then(|path| {
            match path.to_lowercase().as_str() {
                "disabled" | "none" | "off" | "false" => None,
                "auto" => Some(Self::runtime_dir().join("state")),
                _ => Some(PathBuf::from(path)),
            }
        })
    }

    /// Get the data directory path (for models)
    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "saytype")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the models directory path
    pub fn models_dir() -> PathBuf {
        Self::data_dir().join("models")
    }

    /// Ensure the config and models directories exist
    pub fn ensure_directories() -> std::io::Result<()> {
        if let Some(config_dir) = Self::default_path().as_deref().and_then(Path::parent) {
            std::fs::create_dir_all(config_dir)?;
            tracing::debug!("Ensured config directory exists: {:?}", config_dir);
        }

        let models_dir = Self::models_dir();
        std::fs::create_dir_all(&models_dir)?;
        tracing::debug!("Ensured models directory exists: {:?}", models_dir);

        Ok(())
    }
}

/// Load configuration from file, with defaults for missing values
pub fn load_config(path: Option<&Path>) -> Result<Config, SaytypeError> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);

    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| SaytypeError::Config(format!("Failed to read config: {}", e)))?;

            config = toml::from_str(&contents)
                .map_err(|e| SaytypeError::Config(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    Ok(config)
}

/// Apply SAYTYPE_* overrides using the given variable lookup
fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("SAYTYPE_HOTKEY") {
        config.hotkey.key = key;
    }
    if let Some(model) = lookup("SAYTYPE_MODEL") {
        config.whisper.model = model;
    }
    if let Some(mode) = lookup("SAYTYPE_INJECTION_MODE") {
        match mode.parse() {
            Ok(mode) => config.output.injection_mode = mode,
            Err(e) => tracing::warn!("Ignoring SAYTYPE_INJECTION_MODE: {}", e),
        }
    }
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<(), SaytypeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| SaytypeError::Config(format!("Failed to create config dir: {}", e)))?;
    }

    let contents = toml::to_string_pretty(config)
        .map_err(|e| SaytypeError::Config(format!("Failed to serialize config: {}", e)))?;

    std::fs::write(path, contents)
        .map_err(|e| SaytypeError::Config(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.hotkey.key, "SCROLLLOCK");
        assert_eq!(config.hotkey.cancel_key, "ESC");
        assert_eq!(config.hotkey.mode, ActivationMode::Hold);
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(!config.audio.feedback.enabled);
        assert_eq!(config.output.injection_mode, InjectionMode::Auto);
        assert!(config.text.voice_commands);
        assert!(!config.auto_timeout.enabled);
    }

    #[test]
    fn test_default_config_template_parses() {
        let config: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.hotkey.key, "SCROLLLOCK");
        assert_eq!(config.output.paste_delay_ms, 80);
        assert_eq!(config.auto_timeout.minutes, 30);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            [hotkey]
            key = "PAUSE"
            mode = "toggle"
            toggle_key = "F13"

            [output]
            injection_mode = "type"

            [auto_timeout]
            enabled = true
            minutes = 5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.hotkey.key, "PAUSE");
        assert_eq!(config.hotkey.mode, ActivationMode::Toggle);
        assert_eq!(config.hotkey.trigger_key(), "F13");
        assert_eq!(config.output.injection_mode, InjectionMode::Keystroke);
        assert!(config.auto_timeout.enabled);
        assert_eq!(config.auto_timeout.minutes, 5);
        assert_eq!(config.whisper.model, "base.en");
    }

    #[test]
    fn test_push_to_talk_alias() {
        let config: Config = toml::from_str("[hotkey]\nmode = \"push_to_talk\"\n").unwrap();
        assert_eq!(config.hotkey.mode, ActivationMode::Hold);
    }

    #[test]
    fn test_trigger_key_ignores_toggle_key_in_hold_mode() {
        let hotkey = HotkeyConfig {
            toggle_key: Some("F13".to_string()),
            ..HotkeyConfig::default()
        };
        assert_eq!(hotkey.trigger_key(), "SCROLLLOCK");
    }

    #[test]
    fn test_injection_mode_from_str() {
        assert_eq!("auto".parse::<InjectionMode>().unwrap(), InjectionMode::Auto);
        assert_eq!("TYPE".parse::<InjectionMode>().unwrap(), InjectionMode::Keystroke);
        assert_eq!("paste".parse::<InjectionMode>().unwrap(), InjectionMode::Paste);
        assert!("clipboard".parse::<InjectionMode>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| match name {
            "SAYTYPE_HOTKEY" => Some("F24".to_string()),
            "SAYTYPE_INJECTION_MODE" => Some("paste".to_string()),
            _ => None,
        });
        assert_eq!(config.hotkey.key, "F24");
        assert_eq!(config.output.injection_mode, InjectionMode::Paste);
        assert_eq!(config.whisper.model, "base.en");
    }

    #[test]
    fn test_state_file_resolution() {
        let mut config = Config::default();
        assert!(config.resolve_state_file().unwrap().ends_with("saytype/state"));

        config.state_file = Some("disabled".to_string());
        assert!(config.resolve_state_file().is_none());

        config.state_file = Some("/tmp/custom-state".to_string());
        assert_eq!(
            config.resolve_state_file(),
            Some(PathBuf::from("/tmp/custom-state"))
        );
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.hotkey.key = "F20".to_string();
        config.output.injection_mode = InjectionMode::Paste;
        save_config(&config, &path).unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.hotkey.key, "F20");
        assert_eq!(loaded.output.injection_mode, InjectionMode::Paste);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[hotkey\nkey = ").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
