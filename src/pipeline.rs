//! Dictation pipeline
//!
//! Hotkey event -> recording session -> transcriber -> text processor ->
//! injector. One utterance is handled to completion before the next hotkey
//! event is looked at; the capture loop sees `busy` while that happens and
//! drops presses instead of queueing them.

use crate::audio::feedback::SoundEvent;
use crate::audio::LevelMeter;
use crate::config::ActivationMode;
use crate::hotkey::HotkeyEvent;
use crate::output::{InjectionDecision, Injector};
use crate::session::{SessionController, StopOutcome};
use crate::text::normalize::is_break;
use crate::text::{TextProcessor, UndoKind, UndoRecord, Utterance};
use crate::transcribe::Transcriber;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where the pipeline is, for external status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Transcribing,
    Injecting,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Recording => "recording",
            Phase::Transcribing => "transcribing",
            Phase::Injecting => "injecting",
        }
    }
}

/// What handling an event led to
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Nothing to do for this event
    Ignored,
    Started,
    /// The audio input could not be opened
    StartFailed(String),
    Cancelled,
    /// Released before the minimum hold
    TooShort(Duration),
    /// Recording held no audio
    NothingCaptured,
    /// The transcript normalized to nothing
    EmptyTranscript,
    TranscriptionFailed(String),
    Injected {
        text: String,
        decision: InjectionDecision,
    },
    Undone {
        kind: UndoKind,
        removed: String,
    },
    InjectionFailed(String),
}

/// Audio cue for an outcome
///
/// Every finished utterance gets the ready cue, whether or not text appeared.
pub fn cue_for(outcome: &PipelineOutcome) -> Option<SoundEvent> {
    match outcome {
        PipelineOutcome::Ignored => None,
        PipelineOutcome::Started => Some(SoundEvent::RecordingStart),
        PipelineOutcome::Cancelled | PipelineOutcome::TooShort(_) => Some(SoundEvent::Cancelled),
        PipelineOutcome::NothingCaptured
        | PipelineOutcome::EmptyTranscript
        | PipelineOutcome::TranscriptionFailed(_)
        | PipelineOutcome::Injected { .. }
        | PipelineOutcome::Undone { .. } => Some(SoundEvent::Ready),
        PipelineOutcome::StartFailed(_) | PipelineOutcome::InjectionFailed(_) => {
            Some(SoundEvent::Error)
        }
    }
}

/// Separate consecutive utterances with a space, unless the text already
/// ends at a line start
pub fn with_separator(mut text: String) -> String {
    match text.chars().last() {
        Some(c) if is_break(c) || c.is_whitespace() => {}
        Some(_) => text.push(' '),
        None => {}
    }
    text
}

type PhaseObserver = Box<dyn Fn(Phase) + Send + Sync>;

/// The dictation pipeline
pub struct Dictation {
    session: SessionController,
    transcriber: Arc<dyn Transcriber>,
    processor: TextProcessor,
    injector: Injector,
    mode: ActivationMode,
    busy: Arc<AtomicBool>,
    /// A hold-mode press started the recording and its release is pending,
    /// so the capture loop still holds every keyboard grabbed
    hotkey_held: bool,
    observer: Option<PhaseObserver>,
}

impl Dictation {
    pub fn new(
        session: SessionController,
        transcriber: Arc<dyn Transcriber>,
        processor: TextProcessor,
        injector: Injector,
        mode: ActivationMode,
    ) -> Self {
        Self {
            session,
            transcriber,
            processor,
            injector,
            mode,
            busy: Arc::new(AtomicBool::new(false)),
            hotkey_held: false,
            observer: None,
        }
    }

    /// Called on every phase change
    pub fn on_phase(&mut self, observer: impl Fn(Phase) + Send + Sync + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Flag the capture loop checks before acting on a press
    pub fn busy_flag(&self) -> Arc<AtomicBool> {
        self.busy.clone()
    }

    /// Flag mirroring "a session is recording"
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.session.active_flag()
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.session.elapsed(now)
    }

    pub fn level(&self) -> &LevelMeter {
        self.session.level()
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    pub fn undo_record(&self) -> &UndoRecord {
        self.injector.undo_record()
    }

    /// Move captured audio out of the queue; call while recording
    pub fn pump(&mut self) {
        self.session.pump();
    }

    fn set_phase(&self, phase: Phase) {
        tracing::trace!("Phase: {}", phase.as_str());
        if let Some(observer) = &self.observer {
            observer(phase);
        }
    }

    /// Handle one event from the capture loop
    pub async fn on_hotkey(&mut self, event: HotkeyEvent, now: Instant) -> PipelineOutcome {
        let outcome = match (event, self.mode) {
            (HotkeyEvent::Cancel, _) => {
                self.hotkey_held = false;
                self.cancel("cancel key pressed").await
            }
            (HotkeyEvent::Pressed, ActivationMode::Hold) => {
                let outcome = self.start(now).await;
                self.hotkey_held = outcome == PipelineOutcome::Started;
                outcome
            }
            (HotkeyEvent::Released, ActivationMode::Hold) => {
                self.hotkey_held = false;
                self.finish(now).await
            }
            (HotkeyEvent::Pressed, ActivationMode::Toggle) => self.toggle(now).await,
            (HotkeyEvent::Released, ActivationMode::Toggle) => PipelineOutcome::Ignored,
        };
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    pub async fn toggle(&mut self, now: Instant) -> PipelineOutcome {
        if self.session.is_recording() {
            self.finish(now).await
        } else {
            self.start(now).await
        }
    }

    pub async fn start(&mut self, now: Instant) -> PipelineOutcome {
        if self.session.is_recording() {
            return PipelineOutcome::Ignored;
        }

        match self.session.start(now).await {
            Ok(()) => {
                tracing::info!("Recording started");
                self.set_phase(Phase::Recording);
                PipelineOutcome::Started
            }
            Err(e) => {
                tracing::error!("Failed to start recording: {}", e);
                self.set_phase(Phase::Idle);
                PipelineOutcome::StartFailed(e.to_string())
            }
        }
    }

    pub async fn cancel(&mut self, reason: &str) -> PipelineOutcome {
        if self.session.cancel(reason).await {
            self.set_phase(Phase::Idle);
            PipelineOutcome::Cancelled
        } else {
            PipelineOutcome::Ignored
        }
    }

    /// Stop requested from outside the hotkey (signal, max duration)
    ///
    /// While a held hotkey keeps the keyboards grabbed nothing may be
    /// typed, so the recording is discarded instead of transcribed. The
    /// later release only ungrabs.
    pub async fn request_stop(&mut self, now: Instant, reason: &str) -> PipelineOutcome {
        if self.hotkey_held {
            tracing::info!("Hotkey still held, discarding recording: {}", reason);
            return self.cancel(reason).await;
        }
        self.finish(now).await
    }

    /// Stop the recording and run the rest of the pipeline
    pub async fn finish(&mut self, now: Instant) -> PipelineOutcome {
        self.busy.store(true, Ordering::SeqCst);

        let outcome = match self.session.stop(now).await {
            StopOutcome::NotRecording => {
                self.busy.store(false, Ordering::SeqCst);
                return PipelineOutcome::Ignored;
            }
            StopOutcome::TooShort(held) => {
                tracing::info!("Hotkey held for {}ms, ignoring", held.as_millis());
                PipelineOutcome::TooShort(held)
            }
            StopOutcome::Empty => {
                tracing::info!("No audio captured");
                PipelineOutcome::NothingCaptured
            }
            StopOutcome::Dispatch(samples) => self.transcribe_and_inject(samples).await,
        };

        self.set_phase(Phase::Idle);
        self.busy.store(false, Ordering::SeqCst);
        outcome
    }

    async fn transcribe_and_inject(&mut self, samples: Vec<f32>) -> PipelineOutcome {
        self.set_phase(Phase::Transcribing);

        let transcriber = self.transcriber.clone();
        let raw = match tokio::task::spawn_blocking(move || transcriber.transcribe(&samples)).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::error!("Transcription failed: {}", e);
                return PipelineOutcome::TranscriptionFailed(e.to_string());
            }
            Err(e) => {
                tracing::error!("Transcription task failed: {}", e);
                return PipelineOutcome::TranscriptionFailed(e.to_string());
            }
        };

        self.handle_transcript(&raw).await
    }

    /// Interpret a transcript and act on it
    pub async fn handle_transcript(&mut self, raw: &str) -> PipelineOutcome {
        let Some(utterance) = self.processor.interpret(raw, self.injector.undo_record()) else {
            tracing::info!("Transcript is empty, nothing to inject");
            return PipelineOutcome::EmptyTranscript;
        };

        self.set_phase(Phase::Injecting);
        match utterance {
            Utterance::Undo(kind) => match self.injector.undo(kind).await {
                Ok(removed) => PipelineOutcome::Undone { kind, removed },
                Err(e) => {
                    tracing::error!("Undo failed: {}", e);
                    PipelineOutcome::InjectionFailed(e.to_string())
                }
            },
            Utterance::Text(text) => {
                let text = with_separator(text);
                match self.injector.inject(&text).await {
                    Ok(decision) => PipelineOutcome::Injected { text, decision },
                    Err(e) => {
                        tracing::error!("Injection failed: {}", e);
                        PipelineOutcome::InjectionFailed(e.to_string())
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{LINE_BREAK, PARAGRAPH_BREAK};

    #[test]
    fn test_with_separator() {
        assert_eq!(with_separator("Hello.".into()), "Hello. ");
        assert_eq!(with_separator("Hello. ".into()), "Hello. ");
        assert_eq!(
            with_separator(format!("Hello.{}", PARAGRAPH_BREAK)),
            format!("Hello.{}", PARAGRAPH_BREAK)
        );
        assert_eq!(
            with_separator(format!("Hello.{}", LINE_BREAK)),
            format!("Hello.{}", LINE_BREAK)
        );
        assert_eq!(with_separator(String::new()), "");
    }

    #[test]
    fn test_ready_cue_even_on_failure() {
        assert_eq!(
            cue_for(&PipelineOutcome::TranscriptionFailed("boom".into())),
            Some(SoundEvent::Ready)
        );
        assert_eq!(cue_for(&PipelineOutcome::NothingCaptured), Some(SoundEvent::Ready));
        assert_eq!(cue_for(&PipelineOutcome::EmptyTranscript), Some(SoundEvent::Ready));
    }

    #[test]
    fn test_other_cues() {
        assert_eq!(cue_for(&PipelineOutcome::Started), Some(SoundEvent::RecordingStart));
        assert_eq!(
            cue_for(&PipelineOutcome::TooShort(Duration::from_millis(50))),
            Some(SoundEvent::Cancelled)
        );
        assert_eq!(cue_for(&PipelineOutcome::Cancelled), Some(SoundEvent::Cancelled));
        assert_eq!(
            cue_for(&PipelineOutcome::InjectionFailed("x".into())),
            Some(SoundEvent::Error)
        );
        assert_eq!(cue_for(&PipelineOutcome::Ignored), None);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Idle.as_str(), "idle");
        assert_eq!(Phase::Transcribing.as_str(), "transcribing");
    }
}
