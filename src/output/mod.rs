//! Text injection module
//!
//! Gets normalized text into the focused application. Three methods:
//! 1. Accessibility insertion - direct insert through the accessibility helper
//! 2. Paste - stage on the clipboard, then Ctrl+Shift+V
//! 3. Type - simulated key presses (wtype, then ydotool)
//!
//! The configured [`InjectionMode`] decides which are tried and in what
//! order. Break markers never reach a tool as characters: they replay as
//! Enter presses (or become newlines for accessibility insertion).
//!
//! The [`Injector`] also owns the [`UndoRecord`], since only it knows what
//! actually landed in the focused application.

pub mod accessibility;
pub mod clipboard;
pub mod focus;
pub mod keyboard;

use crate::config::{InjectionMode, OutputConfig};
use crate::error::OutputError;
use crate::text::undo::rendered_width;
use crate::text::{UndoKind, UndoRecord, LINE_BREAK, PARAGRAPH_BREAK};
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Simulated keyboard
#[async_trait::async_trait]
pub trait Keyboard: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> bool;

    /// Type literal text (no break markers)
    async fn type_text(&self, text: &str) -> Result<(), OutputError>;

    async fn press_enter(&self) -> Result<(), OutputError>;

    async fn backspace(&self, count: usize) -> Result<(), OutputError>;

    /// Ctrl+Shift+V, which pastes in terminals and regular widgets alike
    async fn paste_shortcut(&self) -> Result<(), OutputError>;
}

/// System clipboard
#[async_trait::async_trait]
pub trait Clipboard: Send + Sync {
    fn name(&self) -> &'static str;

    async fn is_available(&self) -> bool;

    async fn set_text(&self, text: &str) -> Result<(), OutputError>;
}

/// Accessibility access to the focused widget. Offsets are in characters.
#[async_trait::async_trait]
pub trait Accessibility: Send + Sync {
    /// Is the focused widget editable and able to take inserted text
    async fn focused_supports_insertion(&self) -> bool;

    /// Current selection; start == end is the caret
    async fn selection(&self) -> Result<(usize, usize), OutputError>;

    async fn insert_text(&self, offset: usize, text: &str) -> Result<(), OutputError>;

    async fn delete_range(&self, start: usize, end: usize) -> Result<(), OutputError>;
}

/// What kind of application has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusClass {
    Terminal,
    Editor,
    Unknown,
}

#[async_trait::async_trait]
pub trait FocusProbe: Send + Sync {
    async fn probe(&self) -> FocusClass;
}

/// How one utterance gets into the focused application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMethod {
    Accessibility,
    Paste,
    Type,
}

impl fmt::Display for InjectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InjectionMethod::Accessibility => "accessibility",
            InjectionMethod::Paste => "paste",
            InjectionMethod::Type => "type",
        })
    }
}

/// The method that delivered an utterance, and why it was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionDecision {
    pub method: InjectionMethod,
    /// Diagnostic only
    pub reason: String,
}

/// What we learned about the target before injecting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub class: FocusClass,
    /// Accessibility insertion is available for the focused widget
    pub accessibility: bool,
    /// A clipboard tool is available
    pub clipboard: bool,
}

impl InjectionMode {
    /// Methods to try, in order
    pub fn fallback_chain(&self, target: &TargetInfo) -> Vec<InjectionMethod> {
        match self {
            InjectionMode::Keystroke => vec![InjectionMethod::Type],
            InjectionMode::Paste if target.clipboard => {
                vec![InjectionMethod::Paste, InjectionMethod::Type]
            }
            InjectionMode::Paste => vec![InjectionMethod::Type],
            InjectionMode::Auto => {
                let mut chain = Vec::with_capacity(3);
                if target.accessibility && target.class != FocusClass::Terminal {
                    chain.push(InjectionMethod::Accessibility);
                }
                if target.clipboard {
                    chain.push(InjectionMethod::Paste);
                }
                chain.push(InjectionMethod::Type);
                chain
            }
        }
    }
}

/// Text split at break markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a> {
    Text(&'a str),
    /// Number of Enter presses
    Enter(usize),
}

/// Split text into literal runs and Enter presses
pub fn pieces(text: &str) -> Vec<Piece<'_>> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        let enters = match c {
            LINE_BREAK | '\n' => 1,
            PARAGRAPH_BREAK => 2,
            _ => continue,
        };
        if start < i {
            out.push(Piece::Text(&text[start..i]));
        }
        out.push(Piece::Enter(enters));
        start = i + c.len_utf8();
    }
    if start < text.len() {
        out.push(Piece::Text(&text[start..]));
    }
    out
}

/// Text as an accessibility insert should see it
pub fn with_newlines(text: &str) -> String {
    text.replace(PARAGRAPH_BREAK, "\n\n").replace(LINE_BREAK, "\n")
}

/// An attempt failed; `emitted` if some of the text already reached the target
struct Failure {
    emitted: bool,
    error: OutputError,
}

impl Failure {
    fn clean(error: OutputError) -> Self {
        Self {
            emitted: false,
            error,
        }
    }
}

/// Chooses an injection method per utterance and carries it out
pub struct Injector {
    mode: InjectionMode,
    keyboard: Box<dyn Keyboard>,
    clipboard: Box<dyn Clipboard>,
    accessibility: Option<Box<dyn Accessibility>>,
    focus: Box<dyn FocusProbe>,
    paste_delay: Duration,
    undo: UndoRecord,
}

impl Injector {
    pub fn new(
        mode: InjectionMode,
        keyboard: Box<dyn Keyboard>,
        clipboard: Box<dyn Clipboard>,
        accessibility: Option<Box<dyn Accessibility>>,
        focus: Box<dyn FocusProbe>,
    ) -> Self {
        Self {
            mode,
            keyboard,
            clipboard,
            accessibility,
            focus,
            paste_delay: Duration::ZERO,
            undo: UndoRecord::default(),
        }
    }

    /// Wait between staging the clipboard and sending the paste shortcut
    pub fn with_paste_delay(mut self, delay: Duration) -> Self {
        self.paste_delay = delay;
        self
    }

    /// Injector using the system tools
    pub fn from_config(config: &OutputConfig) -> Self {
        let accessibility = config
            .accessibility_helper
            .as_deref()
            .and_then(accessibility::HelperAccessibility::from_command)
            .map(|helper| Box::new(helper) as Box<dyn Accessibility>);

        Self::new(
            config.injection_mode,
            Box::new(keyboard::KeyboardChain::system(config.type_delay_ms)),
            Box::new(clipboard::ClipboardChain::system()),
            accessibility,
            Box::new(focus::SystemFocusProbe),
        )
        .with_paste_delay(Duration::from_millis(config.paste_delay_ms))
    }

    pub fn mode(&self) -> InjectionMode {
        self.mode
    }

    pub fn undo_record(&self) -> &UndoRecord {
        &self.undo
    }

    async fn inspect_target(&self) -> TargetInfo {
        let mut target = TargetInfo {
            class: FocusClass::Unknown,
            accessibility: false,
            clipboard: false,
        };

        match self.mode {
            InjectionMode::Keystroke => {}
            InjectionMode::Paste => {
                target.clipboard = self.clipboard.is_available().await;
            }
            InjectionMode::Auto => {
                target.class = self.focus.probe().await;
                if target.class != FocusClass::Terminal {
                    if let Some(acc) = &self.accessibility {
                        target.accessibility = acc.focused_supports_insertion().await;
                    }
                }
                target.clipboard = self.clipboard.is_available().await;
            }
        }

        target
    }

    /// Inject one utterance, falling back through the mode's chain
    ///
    /// Once any part of the text has reached the target, a failure is final:
    /// trying the next method would duplicate what was already emitted.
    pub async fn inject(&mut self, text: &str) -> Result<InjectionDecision, OutputError> {
        if text.is_empty() {
            return Err(OutputError::InjectionFailed("nothing to inject".into()));
        }

        let target = self.inspect_target().await;
        let chain = self.mode.fallback_chain(&target);
        tracing::debug!("Injection target {:?}, chain {:?}", target, chain);

        let mut failed = Vec::new();
        for method in chain {
            match self.attempt(method, text).await {
                Ok(()) => {
                    self.undo.record_insert(text);
                    let reason = describe(self.mode, &target, &failed);
                    tracing::info!("Injected {} chars via {} ({})", text.chars().count(), method, reason);
                    return Ok(InjectionDecision { method, reason });
                }
                Err(Failure {
                    emitted: true,
                    error,
                }) => {
                    tracing::error!("{} failed after partial output: {}", method, error);
                    self.undo = UndoRecord::default();
                    return Err(error);
                }
                Err(Failure { error, .. }) => {
                    tracing::warn!("{} failed: {}, trying next", method, error);
                    failed.push(method);
                }
            }
        }

        Err(OutputError::AllMethodsFailed)
    }

    async fn attempt(&self, method: InjectionMethod, text: &str) -> Result<(), Failure> {
        match method {
            InjectionMethod::Accessibility => self.insert_accessible(text).await,
            InjectionMethod::Paste => self.replay(text, true).await,
            InjectionMethod::Type => self.replay(text, false).await,
        }
    }

    async fn insert_accessible(&self, text: &str) -> Result<(), Failure> {
        let acc = self.accessibility.as_ref().ok_or_else(|| {
            Failure::clean(OutputError::AccessibilityUnsupported("no helper configured".into()))
        })?;

        let (start, end) = acc.selection().await.map_err(Failure::clean)?;
        if start != end {
            acc.delete_range(start, end).await.map_err(Failure::clean)?;
        }
        acc.insert_text(start, &with_newlines(text))
            .await
            .map_err(|error| Failure {
                emitted: start != end,
                error,
            })
    }

    /// Paste or type each run of text, pressing Enter for break markers
    async fn replay(&self, text: &str, paste: bool) -> Result<(), Failure> {
        let mut emitted = false;
        let fail = |emitted: bool| move |error| Failure { emitted, error };

        for piece in pieces(text) {
            match piece {
                Piece::Text(run) if paste => {
                    self.clipboard.set_text(run).await.map_err(fail(emitted))?;
                    if !self.paste_delay.is_zero() {
                        tokio::time::sleep(self.paste_delay).await;
                    }
                    self.keyboard.paste_shortcut().await.map_err(fail(emitted))?;
                }
                Piece::Text(run) => {
                    self.keyboard.type_text(run).await.map_err(fail(emitted))?;
                }
                Piece::Enter(count) => {
                    for _ in 0..count {
                        self.keyboard.press_enter().await.map_err(fail(emitted))?;
                        emitted = true;
                    }
                }
            }
            emitted = true;
        }

        Ok(())
    }

    /// Remove part of the last insertion from the focused application
    ///
    /// Returns the removed text; empty when there was nothing to undo.
    pub async fn undo(&mut self, kind: UndoKind) -> Result<String, OutputError> {
        let removal = self.undo.pending_removal(kind);
        if removal.is_empty() {
            tracing::debug!("Nothing to undo");
            return Ok(String::new());
        }
        let width = rendered_width(removal);

        if !self.delete_accessible(width).await {
            self.keyboard.backspace(width).await?;
        }

        let removed = self.undo.apply_undo(kind);
        tracing::info!("Undo {}: removed {:?}", kind, removed);
        Ok(removed)
    }

    /// Delete `width` characters before the caret, if accessibility allows
    async fn delete_accessible(&self, width: usize) -> bool {
        if self.mode == InjectionMode::Keystroke {
            return false;
        }
        let Some(acc) = &self.accessibility else {
            return false;
        };
        if !acc.focused_supports_insertion().await {
            return false;
        }

        match acc.selection().await {
            Ok((caret, end)) if caret == end && caret >= width => {
                match acc.delete_range(caret - width, caret).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::debug!("Accessibility delete failed: {}", e);
                        false
                    }
                }
            }
            Ok(_) => false,
            Err(e) => {
                tracing::debug!("Accessibility selection failed: {}", e);
                false
            }
        }
    }
}

fn describe(mode: InjectionMode, target: &TargetInfo, failed: &[InjectionMethod]) -> String {
    let mut reason = match mode {
        InjectionMode::Keystroke => "keystroke mode".to_string(),
        InjectionMode::Paste if target.clipboard => "paste mode".to_string(),
        InjectionMode::Paste => "paste mode, clipboard unavailable".to_string(),
        InjectionMode::Auto => format!(
            "auto mode, {:?} target, accessibility {}, clipboard {}",
            target.class,
            if target.accessibility { "supported" } else { "unsupported" },
            if target.clipboard { "available" } else { "unavailable" },
        ),
    };
    for method in failed {
        reason.push_str(&format!(", {} failed", method));
    }
    reason
}

/// Desktop notification with the injected text
pub async fn send_notification(title: &str, text: &str) {
    let preview = if text.chars().count() > 80 {
        format!("{}...", text.chars().take(80).collect::<String>())
    } else {
        text.to_string()
    };

    let _ = Command::new("notify-send")
        .args([
            "--app-name=Saytype",
            "--urgency=low",
            "--expire-time=3000",
            title,
            &with_newlines(&preview),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
}
