//! Accessibility insertion through a helper program
//!
//! Direct insertion into the focused widget needs an accessibility bus
//! client (AT-SPI on Linux). That lives outside this process: the configured
//! `accessibility_helper` command answers four subcommands.
//!
//! ```text
//! <helper> probe                 exit 0 and print "editable" when insertion works
//! <helper> selection             print "<start> <end>" in characters
//! <helper> insert <offset>       insert stdin at offset
//! <helper> delete <start> <end>  delete the character range
//! ```
//!
//! Any failure means "not supported"; it is never fatal.

use super::Accessibility;
use crate::error::OutputError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// The probe runs before every utterance in auto mode
const PROBE_TIMEOUT: Duration = Duration::from_millis(300);
const EDIT_TIMEOUT: Duration = Duration::from_secs(2);

fn unsupported(msg: impl Into<String>) -> OutputError {
    OutputError::AccessibilityUnsupported(msg.into())
}

/// Parse "<start> <end>" as printed by the helper
fn parse_selection(stdout: &str) -> Option<(usize, usize)> {
    let mut parts = stdout.split_whitespace();
    let start: usize = parts.next()?.parse().ok()?;
    let end = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((start.min(end), start.max(end)))
}

/// Accessibility collaborator backed by an external command
pub struct HelperAccessibility {
    program: String,
    base_args: Vec<String>,
}

impl HelperAccessibility {
    /// Split a command line such as "saytype-atspi --bus session"
    pub fn from_command(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            base_args: words.collect(),
        })
    }

    async fn run(
        &self,
        args: &[String],
        stdin: Option<&str>,
        timeout: Duration,
    ) -> Result<String, OutputError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| unsupported(format!("{}: {}", self.program, e)))?;

        if let (Some(text), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(text.as_bytes())
                .await
                .map_err(|e| unsupported(e.to_string()))?;
            drop(pipe);
        }

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| unsupported(format!("{} timed out", self.program)))?
            .map_err(|e| unsupported(e.to_string()))?;

        if !output.status.success() {
            return Err(unsupported(format!(
                "{} {}: {}",
                self.program,
                args.first().map(String::as_str).unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl Accessibility for HelperAccessibility {
    async fn focused_supports_insertion(&self) -> bool {
        match self.run(&["probe".into()], None, PROBE_TIMEOUT).await {
            Ok(stdout) => stdout.trim() == "editable",
            Err(e) => {
                tracing::debug!("Accessibility probe failed: {}", e);
                false
            }
        }
    }

    async fn selection(&self) -> Result<(usize, usize), OutputError> {
        let stdout = self
            .run(&["selection".into()], None, PROBE_TIMEOUT)
            .await?;
        parse_selection(&stdout)
            .ok_or_else(|| unsupported(format!("unexpected selection output: {:?}", stdout.trim())))
    }

    async fn insert_text(&self, offset: usize, text: &str) -> Result<(), OutputError> {
        self.run(
            &["insert".into(), offset.to_string()],
            Some(text),
            EDIT_TIMEOUT,
        )
        .await
        .map(|_| ())
    }

    async fn delete_range(&self, start: usize, end: usize) -> Result<(), OutputError> {
        self.run(
            &["delete".into(), start.to_string(), end.to_string()],
            None,
            EDIT_TIMEOUT,
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("4 9\n"), Some((4, 9)));
        assert_eq!(parse_selection("12 12"), Some((12, 12)));
        assert_eq!(parse_selection("9 4"), Some((4, 9)));
        assert_eq!(parse_selection(""), None);
        assert_eq!(parse_selection("4"), None);
        assert_eq!(parse_selection("a b"), None);
        assert_eq!(parse_selection("1 2 3"), None);
    }

    #[test]
    fn test_from_command() {
        let helper = HelperAccessibility::from_command("atspi-helper --bus session").unwrap();
        assert_eq!(helper.program, "atspi-helper");
        assert_eq!(helper.base_args, vec!["--bus", "session"]);
        assert!(HelperAccessibility::from_command("   ").is_none());
    }

    #[tokio::test]
    async fn test_missing_helper_is_unsupported() {
        let helper = HelperAccessibility::from_command("saytype-no-such-helper").unwrap();
        assert!(!helper.focused_supports_insertion().await);
        assert!(matches!(
            helper.selection().await,
            Err(OutputError::AccessibilityUnsupported(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_helper_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("helper.sh");
        std::fs::write(
            &script,
            "#!/bin/sh\ncase \"$1\" in\n  probe) echo editable ;;\n  selection) echo 3 7 ;;\n  insert) cat > /dev/null ;;\n  delete) exit 0 ;;\n  *) exit 1 ;;\nesac\n",
        )
        .unwrap();

        let helper = HelperAccessibility::from_command(&format!("sh {}", script.display())).unwrap();
        assert!(helper.focused_supports_insertion().await);
        assert_eq!(helper.selection().await.unwrap(), (3, 7));
        helper.insert_text(3, "hello").await.unwrap();
        helper.delete_range(3, 7).await.unwrap();
    }
}
