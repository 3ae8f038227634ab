//! Error types for saytype
//!
//! Uses thiserror for ergonomic error definitions with clear messages
//! that guide users toward fixing common issues.

use thiserror::Error;

/// Top-level error type for the saytype application
#[derive(Error, Debug)]
pub enum SaytypeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to hotkey detection
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Cannot open input device '{0}'. Is the user in the 'input' group?\n  Run: sudo usermod -aG input $USER\n  Then log out and back in.")]
    DeviceAccess(String),

    #[error("Unknown key name: '{0}'. Use evtest or wev to find valid key names.")]
    UnknownKey(String),

    #[error("No hotkey configured. Set [hotkey] key in the config file or pass --hotkey.")]
    NoHotkey,

    #[error("No keyboard device found in /dev/input/")]
    NoKeyboard,

    #[error("Hotkey capture is not supported on this platform: {0}")]
    NotSupported(String),
}

impl HotkeyError {
    /// Configuration mistakes end the capture loop instead of being retried
    pub fn is_fatal_config(&self) -> bool {
        matches!(self, HotkeyError::NoHotkey | HotkeyError::UnknownKey(_))
    }
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio connection failed: {0}")]
    Connection(String),

    #[error("Audio device not found: '{0}'. List devices with: pactl list sources short")]
    DeviceNotFound(String),

    #[error("Audio device not found: '{requested}'\n{available}")]
    DeviceNotFoundWithList { requested: String, available: String },

    #[error("Recording timeout: exceeded {0} seconds")]
    Timeout(u32),

    #[error("Audio stream error: {0}")]
    StreamError(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("Model not found: {0}\n  Download a ggml model into the models directory (see 'saytype config').")]
    ModelNotFound(String),

    #[error("Whisper initialization failed: {0}")]
    InitFailed(String),

    #[error("Transcription failed: {0}")]
    InferenceFailed(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Remote server error: {0}")]
    RemoteError(String),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("{0} not found in PATH. Install it via your package manager.")]
    ToolNotFound(&'static str),

    #[error("ydotool daemon not running.\n  Start with: systemctl --user start ydotool\n  Enable at boot: systemctl --user enable ydotool")]
    YdotoolNotRunning,

    #[error("Text injection failed: {0}")]
    InjectionFailed(String),

    #[error("Clipboard unavailable: {0}")]
    ClipboardUnavailable(String),

    #[error("Paste shortcut failed: {0}")]
    PasteFailed(String),

    #[error("Accessibility insertion unsupported: {0}")]
    AccessibilityUnsupported(String),

    #[error("All injection methods failed. Ensure wtype, ydotool, wl-copy or xclip is available.")]
    AllMethodsFailed,
}

/// Result type alias using SaytypeError
pub type Result<T> = std::result::Result<T, SaytypeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_config_errors() {
        assert!(HotkeyError::NoHotkey.is_fatal_config());
        assert!(HotkeyError::UnknownKey("FOO".into()).is_fatal_config());
        assert!(!HotkeyError::NoKeyboard.is_fatal_config());
        assert!(!HotkeyError::DeviceAccess("/dev/input/event3".into()).is_fatal_config());
    }

    #[test]
    fn test_error_wraps_into_top_level() {
        let err: SaytypeError = OutputError::AllMethodsFailed.into();
        assert!(err.to_string().starts_with("Output error:"));
    }
}
