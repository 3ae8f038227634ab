//! Recording session controller
//!
//! Owns the single recording session of the process. The audio callback only
//! ever sees a [`FrameSink`]; it pushes blocks while the shared `active` flag
//! is set. The controller is the sole writer of that flag and the sole reader
//! of the frame buffer.

use crate::audio::{AudioCapture, FrameSink, LevelMeter, FRAME_QUEUE};
use crate::error::AudioError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Presses shorter than this are accidental taps and never reach transcription
pub const MIN_HOLD: Duration = Duration::from_millis(200);

/// The one in-flight recording
#[derive(Debug, Default)]
pub struct RecordingSession {
    pub active: bool,
    pub cancelled: bool,
    pub started_at: Option<Instant>,
    pub press_at: Option<Instant>,
    frames: Vec<Vec<f32>>,
}

impl RecordingSession {
    fn reset(&mut self, now: Instant) {
        self.active = false;
        self.cancelled = false;
        self.started_at = Some(now);
        self.press_at = Some(now);
        self.frames.clear();
    }

    /// Number of sample blocks captured so far
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Number of samples captured so far
    pub fn sample_count(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }
}

/// What a stop produced
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Mono 16 kHz samples in [-1, 1], ready for transcription
    Dispatch(Vec<f32>),
    /// Released before [`MIN_HOLD`]; treated as a cancel
    TooShort(Duration),
    /// Held long enough but no audio arrived
    Empty,
    /// There was no session to stop
    NotRecording,
}

/// Starts and stops audio capture around a [`RecordingSession`]
pub struct SessionController {
    capture: Box<dyn AudioCapture>,
    session: RecordingSession,
    active: Arc<AtomicBool>,
    rx: Option<mpsc::Receiver<Vec<f32>>>,
    level: LevelMeter,
    min_hold: Duration,
}

impl SessionController {
    pub fn new(capture: Box<dyn AudioCapture>) -> Self {
        Self {
            capture,
            session: RecordingSession::default(),
            active: Arc::new(AtomicBool::new(false)),
            rx: None,
            level: LevelMeter::new(),
            min_hold: MIN_HOLD,
        }
    }

    /// Shared flag mirroring "a session is recording", for the hotkey loop
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Level of the current recording
    pub fn level(&self) -> &LevelMeter {
        &self.level
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn is_recording(&self) -> bool {
        self.session.active
    }

    /// Time since the current recording started
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        if !self.session.active {
            return None;
        }
        self.session
            .started_at
            .map(|started| now.saturating_duration_since(started))
    }

    /// Reset the session and open the input stream
    pub async fn start(&mut self, now: Instant) -> Result<(), AudioError> {
        if self.session.active {
            tracing::debug!("Recording already in progress");
            return Ok(());
        }

        self.session.reset(now);
        self.level.reset();

        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        self.rx = Some(rx);
        self.active.store(true, Ordering::Release);
        self.session.active = true;

        let sink = FrameSink::new(self.active.clone(), tx, self.level.clone());
        if let Err(e) = self.capture.start(sink).await {
            self.active.store(false, Ordering::Release);
            self.session.active = false;
            self.rx = None;
            return Err(e);
        }

        tracing::debug!("Recording session started");
        Ok(())
    }

    /// Move queued blocks into the session buffer
    ///
    /// Called periodically while recording so the queue never fills up.
    pub fn pump(&mut self) -> usize {
        if !self.session.active {
            return 0;
        }
        let Some(rx) = self.rx.as_mut() else {
            return 0;
        };

        let mut moved = 0;
        while let Ok(block) = rx.try_recv() {
            self.session.frames.push(block);
            moved += 1;
        }
        moved
    }

    /// End the recording and decide whether its audio is dispatched
    pub async fn stop(&mut self, now: Instant) -> StopOutcome {
        if !self.session.active {
            return StopOutcome::NotRecording;
        }

        self.close_stream().await;
        self.pump();
        self.session.active = false;
        self.rx = None;

        let held = self
            .session
            .press_at
            .map(|press| now.saturating_duration_since(press))
            .unwrap_or_default();

        let frames = std::mem::take(&mut self.session.frames);

        if held < self.min_hold {
            self.session.cancelled = true;
            tracing::debug!("Released after {:?}, below minimum hold", held);
            return StopOutcome::TooShort(held);
        }

        let samples: Vec<f32> = frames
            .into_iter()
            .flatten()
            .map(|s| if s.is_finite() { s.clamp(-1.0, 1.0) } else { 0.0 })
            .collect();

        if samples.is_empty() {
            tracing::debug!("Recording stopped with no audio");
            return StopOutcome::Empty;
        }

        tracing::debug!(
            "Recording stopped: {:.2}s of audio after {:?} held",
            samples.len() as f32 / 16000.0,
            held
        );
        StopOutcome::Dispatch(samples)
    }

    /// Abandon the recording without dispatching anything
    pub async fn cancel(&mut self, reason: &str) -> bool {
        if !self.session.active {
            return false;
        }

        self.close_stream().await;
        self.session.active = false;
        self.session.cancelled = true;
        self.session.frames.clear();
        self.rx = None;

        tracing::info!("Recording cancelled: {}", reason);
        true
    }

    async fn close_stream(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Err(e) = self.capture.stop().await {
            tracing::warn!("Failed to close audio stream: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Capture that hands its sink to the test
    #[derive(Clone, Default)]
    struct FakeCapture {
        sink: Arc<Mutex<Option<FrameSink>>>,
        fail: bool,
    }

    impl FakeCapture {
        fn push(&self, block: Vec<f32>) -> bool {
            self.sink
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.push(block))
                .unwrap_or(false)
        }
    }

    #[async_trait::async_trait]
    impl AudioCapture for FakeCapture {
        async fn start(&mut self, sink: FrameSink) -> Result<(), AudioError> {
            if self.fail {
                return Err(AudioError::DeviceNotFound("fake".into()));
            }
            *self.sink.lock().unwrap() = Some(sink);
            Ok(())
        }

        async fn stop(&mut self) -> Result<(), AudioError> {
            Ok(())
        }
    }

    fn controller() -> (SessionController, FakeCapture) {
        let fake = FakeCapture::default();
        (SessionController::new(Box::new(fake.clone())), fake)
    }

    #[tokio::test]
    async fn test_dispatches_after_min_hold() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        assert!(ctl.is_recording());
        assert!(fake.push(vec![0.25; 160]));
        assert!(fake.push(vec![2.0, -3.0]));

        let outcome = ctl.stop(t0 + Duration::from_millis(500)).await;
        let StopOutcome::Dispatch(samples) = outcome else {
            panic!("expected dispatch, got {:?}", outcome);
        };
        assert_eq!(samples.len(), 162);
        assert_eq!(&samples[160..], &[1.0, -1.0]);
        assert!(!ctl.is_recording());
        assert_eq!(ctl.session().frame_count(), 0);
    }

    #[tokio::test]
    async fn test_short_press_never_dispatches() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        fake.push(vec![0.5; 1600]);

        let outcome = ctl.stop(t0 + Duration::from_millis(199)).await;
        assert_eq!(outcome, StopOutcome::TooShort(Duration::from_millis(199)));
        assert!(ctl.session().cancelled);
    }

    #[tokio::test]
    async fn test_exact_min_hold_dispatches() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        fake.push(vec![0.1; 10]);
        assert!(matches!(ctl.stop(t0 + MIN_HOLD).await, StopOutcome::Dispatch(_)));
    }

    #[tokio::test]
    async fn test_empty_recording() {
        let (mut ctl, _fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        assert_eq!(ctl.stop(t0 + Duration::from_secs(1)).await, StopOutcome::Empty);
    }

    #[tokio::test]
    async fn test_frames_frozen_after_stop() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        fake.push(vec![0.1; 10]);
        ctl.pump();
        assert_eq!(ctl.session().frame_count(), 1);

        ctl.stop(t0 + Duration::from_secs(1)).await;
        assert!(!fake.push(vec![0.1; 10]));
        assert_eq!(ctl.pump(), 0);
        assert_eq!(ctl.session().sample_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_discards_audio() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        fake.push(vec![0.3; 100]);
        assert!(ctl.cancel("test").await);
        assert!(ctl.session().cancelled);
        assert!(!ctl.is_recording());
        assert!(!ctl.active_flag().load(Ordering::Acquire));
        assert_eq!(ctl.stop(t0 + Duration::from_secs(1)).await, StopOutcome::NotRecording);
        assert!(!ctl.cancel("again").await);
    }

    #[tokio::test]
    async fn test_start_resets_previous_session() {
        let (mut ctl, fake) = controller();
        let t0 = Instant::now();

        ctl.start(t0).await.unwrap();
        ctl.cancel("first").await;

        let t1 = t0 + Duration::from_secs(5);
        ctl.start(t1).await.unwrap();
        assert!(!ctl.session().cancelled);
        assert_eq!(ctl.session().press_at, Some(t1));
        assert_eq!(ctl.elapsed(t1 + Duration::from_secs(2)), Some(Duration::from_secs(2)));
        fake.push(vec![0.2; 4]);
        assert!(matches!(
            ctl.stop(t1 + Duration::from_secs(1)).await,
            StopOutcome::Dispatch(s) if s.len() == 4
        ));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_idle() {
        let fake = FakeCapture {
            fail: true,
            ..Default::default()
        };
        let mut ctl = SessionController::new(Box::new(fake));

        assert!(ctl.start(Instant::now()).await.is_err());
        assert!(!ctl.is_recording());
        assert!(!ctl.active_flag().load(Ordering::Acquire));
    }
}
