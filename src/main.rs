//! Saytype - hotkey voice dictation for Linux
//!
//! Run with `saytype` or `saytype daemon` to start the daemon.
//! Use `saytype normalize <text>` to try the voice-command grammar.
//! Use `saytype transcribe <file>` to transcribe an audio file.

use clap::Parser;
use saytype::cli::{Cli, Commands, RecordAction};
use saytype::config::{self, ActivationMode, Config, InjectionMode};
use saytype::daemon::Daemon;
use saytype::output::with_newlines;
use saytype::text::{TextProcessor, UndoRecord, Utterance};
use saytype::transcribe::{create_transcriber, load_wav};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("saytype={},warn", log_level))),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = config::load_config(cli.config.as_deref())?;

    // Apply CLI overrides
    if cli.paste {
        config.output.injection_mode = InjectionMode::Paste;
    }
    if cli.keystroke {
        config.output.injection_mode = InjectionMode::Keystroke;
    }
    if let Some(model) = cli.model {
        config.whisper.model = model;
    }
    if let Some(hotkey) = cli.hotkey {
        config.hotkey.key = hotkey;
    }
    if cli.toggle {
        config.hotkey.mode = ActivationMode::Toggle;
    }

    match cli.command.unwrap_or(Commands::Daemon) {
        Commands::Daemon => {
            let mut daemon = Daemon::new(config);
            daemon.run().await?;
        }

        Commands::Transcribe { file } => {
            transcribe_file(&config, &file)?;
        }

        Commands::Normalize { text } => {
            normalize_text(&config, &text.join(" "));
        }

        Commands::Config => {
            show_config(&config)?;
        }

        Commands::Status { format } => {
            show_status(&config, &format)?;
        }

        Commands::Record { action } => {
            send_record_command(&config, action)?;
        }
    }

    Ok(())
}

/// Print what the daemon would do with a transcript
fn print_utterance(processor: &TextProcessor, raw: &str) {
    match processor.interpret(raw, &UndoRecord::default()) {
        Some(Utterance::Text(text)) => println!("{}", with_newlines(&text)),
        Some(Utterance::Undo(kind)) => println!("<undo {}>", kind),
        None => println!("<empty>"),
    }
}

fn normalize_text(config: &Config, raw: &str) {
    let processor = TextProcessor::new(&config.text);
    print_utterance(&processor, raw);
}

/// Transcribe an audio file
fn transcribe_file(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("Loading audio file: {:?}", path);
    let samples = load_wav(path)?;
    println!(
        "Loaded {} samples ({:.2}s at 16kHz)",
        samples.len(),
        samples.len() as f32 / 16000.0
    );

    let transcriber = create_transcriber(&config.whisper)?;
    let raw = transcriber.transcribe(&samples)?;

    println!("\nTranscript: {}", raw.trim());
    print!("Dictation:  ");
    print_utterance(&TextProcessor::new(&config.text), &raw);
    Ok(())
}

/// Show current configuration
fn show_config(config: &Config) -> anyhow::Result<()> {
    match Config::default_path() {
        Some(path) if path.exists() => println!("# Loaded from {:?}\n", path),
        Some(path) => println!("# No config file at {:?}, using defaults\n", path),
        None => println!("# No config directory, using defaults\n"),
    }
    print!("{}", toml::to_string_pretty(config)?);

    println!("\n# Models directory: {:?}", Config::models_dir());
    if let Some(path) = config.resolve_state_file() {
        println!("# State file: {:?}", path);
    }
    Ok(())
}

fn read_state(config: &Config) -> Option<String> {
    let path = config.resolve_state_file()?;
    let state = std::fs::read_to_string(path).unwrap_or_else(|_| "stopped".to_string());
    Some(state.trim().to_string())
}

/// Print the daemon state (for Waybar/polybar integration)
fn show_status(config: &Config, format: &str) -> anyhow::Result<()> {
    let Some(state) = read_state(config) else {
        anyhow::bail!(
            "state_file is not configured. Add `state_file = \"auto\"` to your config.toml"
        );
    };

    let level = std::fs::read_to_string(Config::runtime_dir().join("level"))
        .ok()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|_| state == "recording");

    if format == "json" {
        let mut value = serde_json::json!({
            "text": state,
            "class": state,
            "tooltip": format!("Saytype: {}", state),
        });
        if let Some(level) = level {
            value["level"] = serde_json::json!(level);
        }
        println!("{}", value);
    } else {
        match level {
            Some(level) => println!("{} ({:.2})", state, level),
            None => println!("{}", state),
        }
    }
    Ok(())
}

/// Signal the running daemon
#[cfg(target_os = "linux")]
fn send_record_command(config: &Config, action: RecordAction) -> anyhow::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid_path = Config::runtime_dir().join("pid");
    let pid: i32 = std::fs::read_to_string(&pid_path)
        .map_err(|_| anyhow::anyhow!("saytype daemon is not running (no {:?})", pid_path))?
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Malformed PID file {:?}", pid_path))?;

    let signal = match action {
        RecordAction::Start => Signal::SIGUSR1,
        RecordAction::Stop => Signal::SIGUSR2,
        RecordAction::Toggle => match read_state(config).as_deref() {
            Some("recording") => Signal::SIGUSR2,
            Some(_) => Signal::SIGUSR1,
            None => anyhow::bail!("record toggle needs state_file to be enabled"),
        },
    };

    kill(Pid::from_raw(pid), signal)
        .map_err(|e| anyhow::anyhow!("Failed to signal daemon (pid {}): {}", pid, e))?;
    tracing::debug!("Sent {:?} to pid {}", signal, pid);
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn send_record_command(_config: &Config, _action: RecordAction) -> anyhow::Result<()> {
    anyhow::bail!("record control is only available on Linux")
}
