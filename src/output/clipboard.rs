//! System clipboard access
//!
//! - wl-copy (wl-clipboard) on Wayland
//! - xclip on X11
//!
//! Both read the text from stdin.

use super::Clipboard;
use crate::error::OutputError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Pipe `text` into a clipboard tool
async fn pipe_to(tool: &'static str, args: &[&str], text: &str) -> Result<(), OutputError> {
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                OutputError::ToolNotFound(tool)
            } else {
                OutputError::ClipboardUnavailable(format!("{}: {}", tool, e))
            }
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| OutputError::ClipboardUnavailable(e.to_string()))?;
        // EOF tells the tool the text is complete
        drop(stdin);
    }

    let status = child
        .wait()
        .await
        .map_err(|e| OutputError::ClipboardUnavailable(e.to_string()))?;

    if !status.success() {
        return Err(OutputError::ClipboardUnavailable(format!(
            "{} exited with {}",
            tool, status
        )));
    }

    Ok(())
}

/// Wayland clipboard via wl-copy
pub struct WlCopy;

#[async_trait::async_trait]
impl Clipboard for WlCopy {
    fn name(&self) -> &'static str {
        "wl-copy"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("WAYLAND_DISPLAY").is_some() && which::which("wl-copy").is_ok()
    }

    async fn set_text(&self, text: &str) -> Result<(), OutputError> {
        pipe_to("wl-copy", &[], text).await
    }
}

/// X11 clipboard via xclip
pub struct Xclip;

#[async_trait::async_trait]
impl Clipboard for Xclip {
    fn name(&self) -> &'static str {
        "xclip"
    }

    async fn is_available(&self) -> bool {
        std::env::var_os("DISPLAY").is_some() && which::which("xclip").is_ok()
    }

    async fn set_text(&self, text: &str) -> Result<(), OutputError> {
        // CLIPBOARD selection, which is what Ctrl+Shift+V reads
        pipe_to("xclip", &["-selection", "clipboard"], text).await
    }
}

/// Ordered clipboard backends
pub struct ClipboardChain {
    backends: Vec<Box<dyn Clipboard>>,
}

impl ClipboardChain {
    pub fn new(backends: Vec<Box<dyn Clipboard>>) -> Self {
        Self { backends }
    }

    /// wl-copy, then xclip
    pub fn system() -> Self {
        Self::new(vec![Box::new(WlCopy), Box::new(Xclip)])
    }
}

#[async_trait::async_trait]
impl Clipboard for ClipboardChain {
    fn name(&self) -> &'static str {
        "clipboard"
    }

    async fn is_available(&self) -> bool {
        for clipboard in &self.backends {
            if clipboard.is_available().await {
                return true;
            }
        }
        false
    }

    async fn set_text(&self, text: &str) -> Result<(), OutputError> {
        let mut last_err = None;
        for clipboard in &self.backends {
            if !clipboard.is_available().await {
                tracing::debug!("{} not available, trying next", clipboard.name());
                continue;
            }
            match clipboard.set_text(text).await {
                Ok(()) => {
                    tracing::debug!("Clipboard set via {}", clipboard.name());
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!("{} failed: {}, trying next", clipboard.name(), e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            OutputError::ClipboardUnavailable("no clipboard tool available".into())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        available: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Clipboard for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn is_available(&self) -> bool {
            self.available
        }
        async fn set_text(&self, _text: &str) -> Result<(), OutputError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chain_uses_first_available() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let chain = ClipboardChain::new(vec![
            Box::new(Counting {
                available: false,
                calls: first.clone(),
            }),
            Box::new(Counting {
                available: true,
                calls: second.clone(),
            }),
        ]);

        assert!(chain.is_available().await);
        chain.set_text("x").await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_is_unavailable() {
        let chain = ClipboardChain::new(Vec::new());
        assert!(!chain.is_available().await);
        assert!(matches!(
            chain.set_text("x").await,
            Err(OutputError::ClipboardUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_tool_reported() {
        let err = pipe_to("saytype-no-such-clipboard-tool", &[], "x")
            .await
            .unwrap_err();
        assert!(matches!(err, OutputError::ToolNotFound(_)));
    }
}
