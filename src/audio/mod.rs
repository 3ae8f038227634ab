//! Audio capture module
//!
//! Provides audio recording capabilities using cpal, which works with
//! PipeWire, PulseAudio, and ALSA backends.
//!
//! The capture backend runs its callback on the audio subsystem's own
//! thread. Blocks travel to the session through a bounded channel held in a
//! [`FrameSink`]; the sink drops blocks once the session is no longer active.

pub mod cpal_capture;
pub mod feedback;
pub mod level;

pub use level::LevelMeter;

use crate::config::AudioConfig;
use crate::error::AudioError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Blocks buffered between the audio thread and the session
pub const FRAME_QUEUE: usize = 512;

/// Delivery end of a recording: the audio callback pushes blocks here
#[derive(Clone)]
pub struct FrameSink {
    active: Arc<AtomicBool>,
    tx: mpsc::Sender<Vec<f32>>,
    level: LevelMeter,
}

impl FrameSink {
    pub fn new(active: Arc<AtomicBool>, tx: mpsc::Sender<Vec<f32>>, level: LevelMeter) -> Self {
        Self { active, tx, level }
    }

    /// Hand a mono 16 kHz block to the session
    ///
    /// Returns false when the block was dropped (session inactive, queue
    /// full or closed). Never blocks; this runs on the audio thread.
    pub fn push(&self, block: Vec<f32>) -> bool {
        if block.is_empty() || !self.active.load(Ordering::Acquire) {
            return false;
        }

        self.level.update(&block);
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("Audio queue full, dropping block");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Trait for audio capture implementations
#[async_trait::async_trait]
pub trait AudioCapture: Send {
    /// Open the input stream; captured blocks (f32, mono, 16kHz) go to `sink`
    async fn start(&mut self, sink: FrameSink) -> Result<(), AudioError>;

    /// Close the input stream. No block reaches the sink afterwards.
    async fn stop(&mut self) -> Result<(), AudioError>;
}

/// Factory function to create audio capture
pub fn create_capture(config: &AudioConfig) -> Result<Box<dyn AudioCapture>, AudioError> {
    Ok(Box::new(cpal_capture::CpalCapture::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_only_delivers_while_active() {
        let active = Arc::new(AtomicBool::new(true));
        let (tx, mut rx) = mpsc::channel(4);
        let sink = FrameSink::new(active.clone(), tx, LevelMeter::new());

        assert!(sink.push(vec![0.1; 8]));
        active.store(false, Ordering::Release);
        assert!(!sink.push(vec![0.2; 8]));

        assert_eq!(rx.try_recv().unwrap(), vec![0.1; 8]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_drops_when_full() {
        let active = Arc::new(AtomicBool::new(true));
        let (tx, _rx) = mpsc::channel(1);
        let sink = FrameSink::new(active, tx, LevelMeter::new());

        assert!(sink.push(vec![0.1; 8]));
        assert!(!sink.push(vec![0.1; 8]));
    }

    #[test]
    fn test_sink_updates_level() {
        let active = Arc::new(AtomicBool::new(true));
        let (tx, _rx) = mpsc::channel(4);
        let level = LevelMeter::new();
        let sink = FrameSink::new(active, tx, level.clone());

        sink.push(vec![0.5; 160]);
        assert!(level.current() > 0.0);
    }
}
