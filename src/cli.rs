// Command-line interface definitions for saytype
//
// This module is separate so it can be used by both the binary (main.rs)
// and build.rs for generating man pages.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "saytype")]
#[command(author, version, about = "Hotkey voice dictation for Linux")]
#[command(long_about = "
Saytype is a hotkey-driven dictation tool for Linux.
Hold a hotkey to record, release to transcribe. Spoken punctuation such as
\"comma\", \"new line\" or \"scratch that\" is turned into text edits, and the
result is inserted into the focused application.

SETUP:
  1. Add yourself to the input group: sudo usermod -aG input $USER
  2. Log out and back in
  3. Install wl-clipboard and wtype (Wayland) or xclip and ydotool (X11)
  4. Download a whisper model into the models directory
  5. Run: saytype (to start the daemon)

USAGE:
  Hold ScrollLock (default) while speaking, release to transcribe.
  Press Escape while recording to throw the recording away.
")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Force paste injection (clipboard + Ctrl+Shift+V)
    #[arg(long, conflicts_with = "keystroke")]
    pub paste: bool,

    /// Force keystroke injection (type each character)
    #[arg(long)]
    pub keystroke: bool,

    /// Override whisper model (tiny, base, small, medium, large-v3, large-v3-turbo)
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Override hotkey (e.g., SCROLLLOCK, PAUSE, F13)
    #[arg(long, value_name = "KEY")]
    pub hotkey: Option<String>,

    /// Use toggle mode (press to start/stop) instead of hold to record
    #[arg(long)]
    pub toggle: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as daemon (default if no command specified)
    Daemon,

    /// Transcribe an audio file (WAV) and print the normalized text
    Transcribe {
        /// Path to audio file
        file: std::path::PathBuf,
    },

    /// Run spoken text through the voice-command normalizer
    Normalize {
        /// Text as a transcriber would produce it
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show current configuration
    Config,

    /// Show daemon status (idle, recording, transcribing, injecting, stopped)
    Status {
        /// Output format: "text" (default) or "json" (for Waybar)
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Control recording from external sources (compositor keybindings, scripts)
    Record {
        #[command(subcommand)]
        action: RecordAction,
    },
}

#[derive(Subcommand, Clone, Copy)]
pub enum RecordAction {
    /// Start recording (send SIGUSR1 to daemon)
    Start,
    /// Stop recording and transcribe (send SIGUSR2 to daemon)
    Stop,
    /// Toggle recording state
    Toggle,
}
