//! Saytype: hotkey voice dictation for Linux
//!
//! This library provides the core functionality for:
//! - Detecting the hotkey via evdev, with exclusive keyboard grabs while held
//! - Capturing audio via cpal (supports PipeWire, PulseAudio, ALSA)
//! - Transcribing speech using whisper.cpp or an OpenAI-compatible server
//! - Turning spoken punctuation, formatting and undo commands into edits
//! - Inserting text through accessibility, clipboard paste or keystrokes
//!
//! # Architecture
//!
//! ```text
//!                        ┌───────────────────────────────┐
//!                        │            Daemon             │
//!                        │  signals, state file, timeout │
//!                        └───────────────────────────────┘
//!                                        │
//!            ┌───────────────────────────┼────────────────────────┐
//!            ▼                           ▼                        ▼
//!   ┌────────────────┐         ┌──────────────────┐      ┌────────────────┐
//!   │     Hotkey     │ events  │     Session      │      │    Watchdog    │
//!   │ (evdev, grabs) │ ──────▶ │ (cpal, 200ms min)│      │  (idle exit)   │
//!   └────────────────┘         └──────────────────┘      └────────────────┘
//!                                        │ samples
//!                                        ▼
//!                              ┌──────────────────┐
//!                              │    Transcribe    │
//!                              │ whisper / remote │
//!                              └──────────────────┘
//!                                        │ raw text
//!                                        ▼
//!                              ┌──────────────────┐
//!                              │       Text       │◀──┐
//!                              │ commands + undo  │   │ undo record
//!                              └──────────────────┘   │
//!                                        │            │
//!                                        ▼            │
//!                              ┌──────────────────┐   │
//!                              │      Output      │───┘
//!                              │ a11y/paste/type  │
//!                              └──────────────────┘
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod hotkey;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod text;
pub mod transcribe;
pub mod watchdog;

pub use cli::{Cli, Commands, RecordAction};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Result, SaytypeError};
