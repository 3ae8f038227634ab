//! Speech-to-text transcription module
//!
//! The recognizer is a black box to the rest of the crate: mono 16 kHz f32
//! samples in, one transcript string out. Two backends:
//! - Local whisper.cpp inference (whisper-rs crate)
//! - Remote OpenAI-compatible Whisper API (whisper.cpp server, OpenAI, etc.)
//!
//! Both block, so the daemon calls them through `spawn_blocking`.

pub mod remote;
pub mod whisper;

use crate::config::{WhisperBackend, WhisperConfig};
use crate::error::TranscribeError;
use std::path::Path;
use std::sync::Arc;

/// Sample rate every transcriber expects
pub const SAMPLE_RATE: u32 = 16000;

/// Trait for speech-to-text implementations
pub trait Transcriber: Send + Sync {
    /// Transcribe audio samples to text
    /// Input: f32 samples, mono, 16kHz
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError>;
}

/// Factory function to create transcriber based on configured backend
pub fn create_transcriber(config: &WhisperConfig) -> Result<Arc<dyn Transcriber>, TranscribeError> {
    match config.backend {
        WhisperBackend::Local => {
            tracing::info!("Using local whisper backend with model={}", config.model);
            Ok(Arc::new(whisper::WhisperTranscriber::new(config)?))
        }
        WhisperBackend::Remote => {
            tracing::info!("Using remote whisper transcription backend");
            Ok(Arc::new(remote::RemoteTranscriber::new(config)?))
        }
    }
}

/// Read a WAV file as mono 16 kHz samples
pub fn load_wav(path: &Path) -> Result<Vec<f32>, TranscribeError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| TranscribeError::AudioFormat(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| TranscribeError::AudioFormat(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| TranscribeError::AudioFormat(e.to_string()))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono: Vec<f32> = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    tracing::debug!(
        "Loaded {}: {} Hz, {} channel(s), {} frames",
        path.display(),
        spec.sample_rate,
        spec.channels,
        mono.len()
    );

    Ok(crate::audio::cpal_capture::resample(
        &mono,
        spec.sample_rate,
        SAMPLE_RATE,
    ))
}

/// Shorten a transcript for log lines
pub(crate) fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    }
}
