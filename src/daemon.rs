//! Daemon module - main event loop
//!
//! Wires the hotkey listener, the dictation pipeline and the idle watchdog
//! together, and exposes state, level and PID files for external tools.

use crate::audio::create_capture;
use crate::audio::feedback::{AudioFeedback, SoundEvent};
use crate::config::Config;
use crate::error::{Result, SaytypeError};
use crate::hotkey::{self, HotkeyEvent, HotkeyListener};
use crate::output::{send_notification, Injector};
use crate::pipeline::{cue_for, Dictation, PipelineOutcome};
use crate::session::SessionController;
use crate::text::TextProcessor;
use crate::transcribe::create_transcriber;
use crate::watchdog::IdleWatchdog;
use pidlock::Pidlock;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// How often the recording is pumped and the level file refreshed
const RECORDING_TICK: Duration = Duration::from_millis(100);
const WATCHDOG_TICK: Duration = Duration::from_secs(1);

/// Write state to file for external integrations (e.g., Waybar)
fn write_state_file(path: &Path, state: &str) {
    if let Some(parent) = path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create state file directory: {}", e);
            return;
        }
    }

    if let Err(e) = std::fs::write(path, state) {
        tracing::warn!("Failed to write state file: {}", e);
    } else {
        tracing::trace!("State file updated: {}", state);
    }
}

fn remove_file_quietly(path: &Path, what: &str) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove {} file: {}", what, e);
        }
    }
}

/// Write PID file for external control via signals
fn write_pid_file() -> Option<PathBuf> {
    let pid_path = Config::runtime_dir().join("pid");

    if let Some(parent) = pid_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("Failed to create PID file directory: {}", e);
            return None;
        }
    }

    let pid = std::process::id();
    if let Err(e) = std::fs::write(&pid_path, pid.to_string()) {
        tracing::warn!("Failed to write PID file: {}", e);
        return None;
    }

    tracing::debug!("PID file written: {:?} (pid={})", pid_path, pid);
    Some(pid_path)
}

/// Take the single-instance lock
fn acquire_instance_lock() -> Result<Pidlock> {
    let runtime_dir = Config::runtime_dir();
    std::fs::create_dir_all(&runtime_dir)?;

    let lock_path = runtime_dir.join("saytype.lock");
    let mut lock = Pidlock::new(&lock_path.to_string_lossy());
    lock.acquire().map_err(|e| {
        SaytypeError::Config(format!(
            "Another saytype daemon appears to be running ({:?}: {:?})",
            lock_path, e
        ))
    })?;
    Ok(lock)
}

fn signal_error(name: &str, e: std::io::Error) -> SaytypeError {
    SaytypeError::Config(format!("Failed to set up {} handler: {}", name, e))
}

/// Main daemon that orchestrates all components
pub struct Daemon {
    config: Config,
    state_file_path: Option<PathBuf>,
    level_file_path: PathBuf,
    pid_file_path: Option<PathBuf>,
    audio_feedback: Option<AudioFeedback>,
}

impl Daemon {
    /// Create a new daemon with the given configuration
    pub fn new(config: Config) -> Self {
        let state_file_path = config.resolve_state_file();

        let audio_feedback = if config.audio.feedback.enabled {
            match AudioFeedback::new(&config.audio.feedback) {
                Ok(feedback) => {
                    tracing::info!(
                        "Audio feedback enabled (theme: {}, volume: {:.0}%)",
                        config.audio.feedback.theme,
                        config.audio.feedback.volume * 100.0
                    );
                    Some(feedback)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize audio feedback: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            config,
            state_file_path,
            level_file_path: Config::runtime_dir().join("level"),
            pid_file_path: None,
            audio_feedback,
        }
    }

    fn play_feedback(&self, event: SoundEvent) {
        if let Some(ref feedback) = self.audio_feedback {
            feedback.play(event);
        }
    }

    fn write_level(&self, level: f32) {
        if let Err(e) = std::fs::write(&self.level_file_path, format!("{:.2}", level)) {
            tracing::trace!("Failed to write level file: {}", e);
        }
    }

    fn max_duration(&self) -> Option<Duration> {
        match self.config.audio.max_duration_secs {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        }
    }

    /// Cue, notify and log what an event led to
    async fn report(&self, outcome: &PipelineOutcome) {
        if let Some(event) = cue_for(outcome) {
            self.play_feedback(event);
        }

        match outcome {
            PipelineOutcome::Injected { text, decision } => {
                tracing::info!("Injected {} chars ({})", text.chars().count(), decision.reason);
                if self.config.output.notification.on_transcription {
                    send_notification("Transcribed", text.trim_end()).await;
                }
            }
            PipelineOutcome::Undone { kind, removed } => {
                tracing::info!("Undo {:?} removed {:?}", kind, removed);
            }
            PipelineOutcome::Cancelled => {
                self.write_level(0.0);
            }
            _ => {}
        }
    }

    fn build_dictation(&self) -> Result<Dictation> {
        let transcriber = create_transcriber(&self.config.whisper)?;
        let capture = create_capture(&self.config.audio)?;
        let processor = TextProcessor::new(&self.config.text);
        let injector = Injector::from_config(&self.config.output);

        let mut dictation = Dictation::new(
            SessionController::new(capture),
            transcriber,
            processor,
            injector,
            self.config.hotkey.mode,
        );

        if let Some(path) = self.state_file_path.clone() {
            write_state_file(&path, "idle");
            dictation.on_phase(move |phase| write_state_file(&path, phase.as_str()));
        }

        Ok(dictation)
    }

    /// Start the hotkey listener if one is configured
    ///
    /// Key configuration mistakes end the daemon; missing devices or
    /// permissions only disable the hotkey so signals keep working.
    async fn start_listener(
        &self,
        dictation: &Dictation,
    ) -> Result<Option<(Box<dyn HotkeyListener>, mpsc::Receiver<HotkeyEvent>)>> {
        if !self.config.hotkey.enabled {
            tracing::info!(
                "Built-in hotkey disabled, use 'saytype record start/stop' to control recording"
            );
            return Ok(None);
        }

        let started = match hotkey::create_listener(
            &self.config.hotkey,
            dictation.active_flag(),
            dictation.busy_flag(),
        ) {
            Ok(mut listener) => listener.start().await.map(|rx| (listener, rx)),
            Err(e) => Err(e),
        };

        match started {
            Ok(pair) => {
                tracing::info!(
                    "Hotkey: {} ({:?} mode)",
                    self.config.hotkey.trigger_key(),
                    self.config.hotkey.mode
                );
                Ok(Some(pair))
            }
            Err(e) if e.is_fatal_config() => Err(e.into()),
            Err(e) => {
                tracing::error!("Hotkey capture unavailable: {}", e);
                tracing::warn!("Continuing without a hotkey, 'saytype record' still works");
                Ok(None)
            }
        }
    }

    /// Called on every recording tick
    async fn on_recording_tick(&self, dictation: &mut Dictation) {
        dictation.pump();
        self.write_level(dictation.level().current());

        let (Some(limit), Some(elapsed)) =
            (self.max_duration(), dictation.elapsed(Instant::now()))
        else {
            return;
        };
        if elapsed < limit {
            return;
        }

        tracing::warn!(
            "Recording reached the {}s limit",
            self.config.audio.max_duration_secs
        );
        let outcome = dictation
            .request_stop(Instant::now(), "maximum duration reached")
            .await;
        self.report(&outcome).await;
    }

    /// Run the daemon main loop
    pub async fn run(&mut self) -> Result<()> {
        tracing::info!("Starting saytype daemon");

        let mut instance_lock = acquire_instance_lock()?;
        self.pid_file_path = write_pid_file();

        let mut sigusr1 =
            signal(SignalKind::user_defined1()).map_err(|e| signal_error("SIGUSR1", e))?;
        let mut sigusr2 =
            signal(SignalKind::user_defined2()).map_err(|e| signal_error("SIGUSR2", e))?;
        let mut sigterm =
            signal(SignalKind::terminate()).map_err(|e| signal_error("SIGTERM", e))?;

        Config::ensure_directories().map_err(|e| {
            SaytypeError::Config(format!("Failed to create directories: {}", e))
        })?;

        tracing::info!("Injection mode: {:?}", self.config.output.injection_mode);
        if let Some(ref path) = self.state_file_path {
            tracing::info!("State file: {:?}", path);
        }

        let mut dictation = self.build_dictation()?;
        let (mut listener, mut hotkey_rx) = match self.start_listener(&dictation).await? {
            Some((listener, rx)) => (Some(listener), Some(rx)),
            None => (None, None),
        };

        let mut watchdog = IdleWatchdog::from_config(&self.config.auto_timeout, Instant::now());
        if watchdog.is_enabled() {
            tracing::info!(
                "Auto-exit after {} idle minutes",
                self.config.auto_timeout.minutes
            );
        }
        let mut watchdog_tick = tokio::time::interval(WATCHDOG_TICK);

        tracing::info!("Ready");

        loop {
            let recording = dictation.is_recording();

            tokio::select! {
                Some(event) = async {
                    match &mut hotkey_rx {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    tracing::debug!("Hotkey event: {:?}", event);
                    watchdog.touch(Instant::now());
                    let outcome = dictation.on_hotkey(event, Instant::now()).await;
                    self.report(&outcome).await;
                }

                _ = tokio::time::sleep(RECORDING_TICK), if recording => {
                    self.on_recording_tick(&mut dictation).await;
                }

                _ = watchdog_tick.tick() => {
                    if watchdog.should_exit(Instant::now(), dictation.is_recording()) {
                        tracing::info!(
                            "No activity for {}s, exiting",
                            watchdog.idle_for(Instant::now()).as_secs()
                        );
                        break;
                    }
                }

                _ = sigusr1.recv() => {
                    tracing::debug!("Received SIGUSR1 (start recording)");
                    watchdog.touch(Instant::now());
                    let outcome = dictation.start(Instant::now()).await;
                    self.report(&outcome).await;
                }

                _ = sigusr2.recv() => {
                    tracing::debug!("Received SIGUSR2 (stop recording)");
                    watchdog.touch(Instant::now());
                    let outcome = dictation
                        .request_stop(Instant::now(), "stop signal while the hotkey is held")
                        .await;
                    self.report(&outcome).await;
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received interrupt, shutting down...");
                    break;
                }

                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down...");
                    break;
                }
            }
        }

        if dictation.is_recording() {
            dictation.cancel("daemon shutting down").await;
        }

        if let Some(ref mut listener) = listener {
            if let Err(e) = listener.stop().await {
                tracing::warn!("Failed to stop hotkey listener: {}", e);
            }
        }

        if let Some(ref path) = self.state_file_path {
            remove_file_quietly(path, "state");
        }
        remove_file_quietly(&self.level_file_path, "level");
        if let Some(ref path) = self.pid_file_path {
            remove_file_quietly(path, "PID");
        }
        if let Err(e) = instance_lock.release() {
            tracing::warn!("Failed to release instance lock: {:?}", e);
        }

        tracing::info!("Daemon stopped");
        Ok(())
    }
}
