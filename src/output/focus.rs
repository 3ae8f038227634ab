//! Best-effort classification of the focused window
//!
//! Only used by auto injection mode, and only to skip accessibility
//! insertion in terminals. Every probe is bounded so a slow compositor
//! never delays typing by more than [`PROBE_BUDGET`].

use super::{FocusClass, FocusProbe};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const PROBE_BUDGET: Duration = Duration::from_millis(300);

const TERMINALS: &[&str] = &[
    "alacritty",
    "foot",
    "kitty",
    "wezterm",
    "konsole",
    "gnome-terminal",
    "org.gnome.console",
    "xterm",
    "urxvt",
    "terminator",
    "tilix",
    "st-256color",
    "ghostty",
];

const EDITORS: &[&str] = &[
    "code",
    "codium",
    "gedit",
    "org.gnome.texteditor",
    "kate",
    "emacs",
    "libreoffice",
    "firefox",
    "chromium",
    "google-chrome",
    "thunderbird",
    "obsidian",
    "zed",
];

/// Map a window class to what it means for injection
pub fn classify(class: &str) -> FocusClass {
    let class = class.trim().to_lowercase();
    if class.is_empty() {
        return FocusClass::Unknown;
    }
    if TERMINALS.iter().any(|t| class == *t || class.ends_with(&format!(".{}", t))) {
        FocusClass::Terminal
    } else if EDITORS.iter().any(|e| class == *e || class.starts_with(&format!("{}-", e))) {
        FocusClass::Editor
    } else {
        FocusClass::Unknown
    }
}

/// Focused window class from the compositor or X server
pub struct SystemFocusProbe;

impl SystemFocusProbe {
    async fn stdout_of(program: &str, args: &[&str]) -> Option<String> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn window_class() -> Option<String> {
        if std::env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some() {
            let json = Self::stdout_of("hyprctl", &["activewindow", "-j"]).await?;
            let value: serde_json::Value = serde_json::from_str(&json).ok()?;
            return value.get("class")?.as_str().map(str::to_string);
        }
        if std::env::var_os("DISPLAY").is_some() {
            return Self::stdout_of("xdotool", &["getactivewindow", "getwindowclassname"]).await;
        }
        None
    }
}

#[async_trait::async_trait]
impl FocusProbe for SystemFocusProbe {
    async fn probe(&self) -> FocusClass {
        match tokio::time::timeout(PROBE_BUDGET, Self::window_class()).await {
            Ok(Some(class)) => {
                let kind = classify(&class);
                tracing::debug!("Focused window class {:?}: {:?}", class.trim(), kind);
                kind
            }
            Ok(None) => FocusClass::Unknown,
            Err(_) => {
                tracing::debug!("Focus probe timed out");
                FocusClass::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_terminals() {
        assert_eq!(classify("kitty"), FocusClass::Terminal);
        assert_eq!(classify("Alacritty"), FocusClass::Terminal);
        assert_eq!(classify("org.wezfurlong.wezterm"), FocusClass::Terminal);
        assert_eq!(classify("foot\n"), FocusClass::Terminal);
    }

    #[test]
    fn test_classify_editors() {
        assert_eq!(classify("Code"), FocusClass::Editor);
        assert_eq!(classify("libreoffice-writer"), FocusClass::Editor);
        assert_eq!(classify("firefox"), FocusClass::Editor);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify(""), FocusClass::Unknown);
        assert_eq!(classify("steam"), FocusClass::Unknown);
        assert_eq!(classify("footnote-app"), FocusClass::Unknown);
    }
}
