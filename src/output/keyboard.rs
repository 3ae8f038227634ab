//! Simulated keyboard input
//!
//! - wtype: Wayland-native, best Unicode/CJK support, no daemon needed
//! - ydotool: works on X11/Wayland/TTY through uinput, requires ydotoold
//!
//! [`KeyboardChain`] uses the first backend that is available and falls back
//! to the next when a call fails.

use super::Keyboard;
use crate::error::OutputError;
use std::process::Stdio;
use tokio::process::Command;

/// Linux input event codes used with `ydotool key`
const YDO_LEFTCTRL: u16 = 29;
const YDO_LEFTSHIFT: u16 = 42;
const YDO_V: u16 = 47;
const YDO_ENTER: u16 = 28;
const YDO_BACKSPACE: u16 = 14;

/// Run a tool to completion, mapping spawn and exit failures
async fn run_tool(
    tool: &'static str,
    cmd: &mut Command,
    classify: impl Fn(&str) -> Option<OutputError>,
) -> Result<(), OutputError> {
    let output = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OutputError::ToolNotFound(tool)
            } else {
                OutputError::InjectionFailed(format!("{}: {}", tool, e))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if let Some(err) = classify(&stderr) {
            return Err(err);
        }
        return Err(OutputError::InjectionFailed(format!(
            "{} failed: {}",
            tool,
            stderr.trim()
        )));
    }

    Ok(())
}

/// wtype-based keyboard
pub struct Wtype {
    delay_ms: u32,
}

impl Wtype {
    pub fn new(delay_ms: u32) -> Self {
        Self { delay_ms }
    }

    async fn run(&self, args: &[&str]) -> Result<(), OutputError> {
        run_tool("wtype", Command::new("wtype").args(args), |_| None).await
    }
}

#[async_trait::async_trait]
impl Keyboard for Wtype {
    fn name(&self) -> &'static str {
        "wtype"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some() && which::which("wtype").is_ok()
    }

    async fn type_text(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }
        let delay = self.delay_ms.to_string();
        let mut args = Vec::new();
        if self.delay_ms > 0 {
            args.extend(["-d", delay.as_str()]);
        }
        // The -- keeps text starting with '-' from being read as an option
        args.extend(["--", text]);
        self.run(&args).await
    }

    async fn press_enter(&self) -> Result<(), OutputError> {
        self.run(&["-k", "Return"]).await
    }

    async fn backspace(&self, count: usize) -> Result<(), OutputError> {
        if count == 0 {
            return Ok(());
        }
        let mut args = Vec::with_capacity(count * 2);
        for _ in 0..count {
            args.extend(["-k", "BackSpace"]);
        }
        self.run(&args).await
    }

    async fn paste_shortcut(&self) -> Result<(), OutputError> {
        self.run(&["-M", "ctrl", "-M", "shift", "-k", "v", "-m", "shift", "-m", "ctrl"])
            .await
            .map_err(|e| OutputError::PasteFailed(e.to_string()))
    }
}

/// ydotool-based keyboard
pub struct Ydotool {
    delay_ms: u32,
}

impl Ydotool {
    pub fn new(delay_ms: u32) -> Self {
        Self { delay_ms }
    }

    async fn run(&self, args: &[String]) -> Result<(), OutputError> {
        run_tool("ydotool", Command::new("ydotool").args(args), |stderr| {
            if stderr.contains("socket") || stderr.contains("connect") || stderr.contains("daemon")
            {
                Some(OutputError::YdotoolNotRunning)
            } else {
                None
            }
        })
        .await
    }

    async fn keys(&self, sequence: &[(u16, bool)]) -> Result<(), OutputError> {
        let mut args = vec!["key".to_string()];
        args.extend(
            sequence
                .iter()
                .map(|(code, down)| format!("{}:{}", code, u8::from(*down))),
        );
        self.run(&args).await
    }
}

/// Press and release of one key
fn tap(code: u16) -> [(u16, bool); 2] {
    [(code, true), (code, false)]
}

#[async_trait::async_trait]
impl Keyboard for Ydotool {
    fn name(&self) -> &'static str {
        "ydotool"
    }

    async fn is_available(&self) -> bool {
        which::which("ydotool").is_ok()
    }

    async fn type_text(&self, text: &str) -> Result<(), OutputError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut args = vec!["type".to_string()];
        if self.delay_ms > 0 {
            args.push("--key-delay".to_string());
            args.push(self.delay_ms.to_string());
        }
        args.push("--".to_string());
        args.push(text.to_string());
        self.run(&args).await
    }

    async fn press_enter(&self) -> Result<(), OutputError> {
        self.keys(&tap(YDO_ENTER)).await
    }

    async fn backspace(&self, count: usize) -> Result<(), OutputError> {
        if count == 0 {
            return Ok(());
        }
        let sequence: Vec<_> = (0..count).flat_map(|_| tap(YDO_BACKSPACE)).collect();
        self.keys(&sequence).await
    }

    async fn paste_shortcut(&self) -> Result<(), OutputError> {
        self.keys(&[
            (YDO_LEFTCTRL, true),
            (YDO_LEFTSHIFT, true),
            (YDO_V, true),
            (YDO_V, false),
            (YDO_LEFTSHIFT, false),
            (YDO_LEFTCTRL, false),
        ])
        .await
        .map_err(|e| match e {
            OutputError::YdotoolNotRunning => e,
            other => OutputError::PasteFailed(other.to_string()),
        })
    }
}

/// Ordered keyboard backends with per-call fallback
pub struct KeyboardChain {
    backends: Vec<Box<dyn Keyboard>>,
}

impl KeyboardChain {
    pub fn new(backends: Vec<Box<dyn Keyboard>>) -> Self {
        Self { backends }
    }

    /// wtype, then ydotool
    pub fn system(delay_ms: u32) -> Self {
        Self::new(vec![
            Box::new(Wtype::new(delay_ms)),
            Box::new(Ydotool::new(delay_ms)),
        ])
    }
}

/// Try each backend in turn until one succeeds
macro_rules! with_fallback {
    ($chain:expr, |$kb:ident| $call:expr) => {{
        let mut last_err = None;
        for $kb in &$chain.backends {
            if !$kb.is_available().await {
                tracing::debug!("{} not available, trying next", $kb.name());
                continue;
            }
            match $call.await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", $kb.name(), e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(OutputError::AllMethodsFailed))
    }};
}

#[async_trait::async_trait]
impl Keyboard for KeyboardChain {
    fn name(&self) -> &'static str {
        "keyboard"
    }

    async fn is_available(&self) -> bool {
        for kb in &self.backends {
            if kb.is_available().await {
                return true;
            }
        }
        false
    }

    async fn type_text(&self, text: &str) -> Result<(), OutputError> {
        with_fallback!(self, |kb| kb.type_text(text))
    }

    async fn press_enter(&self) -> Result<(), OutputError> {
        with_fallback!(self, |kb| kb.press_enter())
    }

    async fn backspace(&self, count: usize) -> Result<(), OutputError> {
        with_fallback!(self, |kb| kb.backspace(count))
    }

    async fn paste_shortcut(&self) -> Result<(), OutputError> {
        with_fallback!(self, |kb| kb.paste_shortcut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Scripted {
        name: &'static str,
        available: bool,
        fails: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn boxed(
            name: &'static str,
            available: bool,
            fails: bool,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn Keyboard> {
            Box::new(Self {
                name,
                available,
                fails,
                log: log.clone(),
            })
        }

        fn record(&self, what: &str) -> Result<(), OutputError> {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, what));
            if self.fails {
                Err(OutputError::InjectionFailed(self.name.into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl Keyboard for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn is_available(&self) -> bool {
            self.available
        }
        async fn type_text(&self, text: &str) -> Result<(), OutputError> {
            self.record(text)
        }
        async fn press_enter(&self) -> Result<(), OutputError> {
            self.record("enter")
        }
        async fn backspace(&self, count: usize) -> Result<(), OutputError> {
            self.record(&format!("bs{}", count))
        }
        async fn paste_shortcut(&self) -> Result<(), OutputError> {
            self.record("paste")
        }
    }

    #[tokio::test]
    async fn test_chain_skips_unavailable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = KeyboardChain::new(vec![
            Scripted::boxed("a", false, false, &log),
            Scripted::boxed("b", true, false, &log),
        ]);

        chain.type_text("hi").await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["b:hi"]);
    }

    #[tokio::test]
    async fn test_chain_falls_back_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = KeyboardChain::new(vec![
            Scripted::boxed("a", true, true, &log),
            Scripted::boxed("b", true, false, &log),
        ]);

        chain.backspace(3).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["a:bs3", "b:bs3"]);
    }

    #[tokio::test]
    async fn test_chain_reports_last_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = KeyboardChain::new(vec![Scripted::boxed("a", true, true, &log)]);
        assert!(matches!(
            chain.press_enter().await,
            Err(OutputError::InjectionFailed(_))
        ));

        let empty = KeyboardChain::new(Vec::new());
        assert!(!empty.is_available().await);
        assert!(matches!(
            empty.paste_shortcut().await,
            Err(OutputError::AllMethodsFailed)
        ));
    }

    #[test]
    fn test_tap_sequence() {
        assert_eq!(tap(YDO_ENTER), [(28, true), (28, false)]);
    }
}
