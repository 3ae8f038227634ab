//! Audio feedback module
//!
//! Short cues for the dictation lifecycle. The "ready" cue plays after every
//! finished utterance, including failed transcriptions, so the user always
//! hears that the pipeline is done.

use crate::config::AudioFeedbackConfig;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::path::PathBuf;

const CUE_SAMPLE_RATE: u32 = 44100;

/// Sound event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundEvent {
    /// Recording started
    RecordingStart,
    /// Utterance finished (text injected, or nothing to inject)
    Ready,
    /// Recording cancelled or too short
    Cancelled,
    /// Something the user should look at went wrong
    Error,
}

/// Audio feedback player
pub struct AudioFeedback {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    volume: f32,
    theme: SoundTheme,
}

/// Encoded WAV data per event
struct SoundTheme {
    start: Vec<u8>,
    ready: Vec<u8>,
    cancel: Vec<u8>,
    error: Vec<u8>,
}

impl SoundTheme {
    fn sound(&self, event: SoundEvent) -> &[u8] {
        match event {
            SoundEvent::RecordingStart => &self.start,
            SoundEvent::Ready => &self.ready,
            SoundEvent::Cancelled => &self.cancel,
            SoundEvent::Error => &self.error,
        }
    }
}

impl AudioFeedback {
    /// Open the default output device and prepare the configured theme
    pub fn new(config: &AudioFeedbackConfig) -> Result<Self, String> {
        if !config.enabled {
            return Err("Audio feedback is disabled".to_string());
        }

        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;

        Ok(Self {
            _stream: stream,
            stream_handle,
            volume: config.volume.clamp(0.0, 1.0),
            theme: load_theme(&config.theme)?,
        })
    }

    /// Play the cue for `event` without waiting for it to finish
    pub fn play(&self, event: SoundEvent) {
        let data = self.theme.sound(event);
        if data.is_empty() {
            return;
        }

        if let Err(e) = self.play_wav(data) {
            tracing::warn!("Failed to play feedback sound: {}", e);
        }
    }

    fn play_wav(&self, data: &[u8]) -> Result<(), String> {
        let source = Decoder::new(Cursor::new(data.to_vec()))
            .map_err(|e| format!("Failed to decode audio: {}", e))?
            .amplify(self.volume);

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
        sink.append(source);
        sink.detach();
        Ok(())
    }
}

fn load_theme(theme_name: &str) -> Result<SoundTheme, String> {
    match theme_name {
        "default" => Ok(default_theme()),
        "subtle" => Ok(subtle_theme()),
        path => load_custom_theme(path),
    }
}

/// A directory holding start.wav, ready.wav, cancel.wav and error.wav.
/// Missing files are silent.
fn load_custom_theme(path: &str) -> Result<SoundTheme, String> {
    let dir = PathBuf::from(path);
    if !dir.is_dir() {
        return Err(format!("Theme directory not found: {}", path));
    }

    let load = |name: &str| std::fs::read(dir.join(name)).unwrap_or_default();
    Ok(SoundTheme {
        start: load("start.wav"),
        ready: load("ready.wav"),
        cancel: load("cancel.wav"),
        error: load("error.wav"),
    })
}

/// A tone that steps through `freqs` in equal slices, with a linear fade at
/// both ends to avoid clicks
fn tone_wav(freqs: &[f32], duration_ms: u32, fade_ms: u32) -> Vec<u8> {
    let num_samples = (CUE_SAMPLE_RATE * duration_ms / 1000) as usize;
    let fade = ((CUE_SAMPLE_RATE * fade_ms / 1000) as usize).max(1);
    let slice = num_samples.div_ceil(freqs.len().max(1)).max(1);

    let samples: Vec<i16> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / CUE_SAMPLE_RATE as f32;
            let freq = freqs.get(i / slice).copied().unwrap_or(0.0);
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i + fade >= num_samples {
                (num_samples - i) as f32 / fade as f32
            } else {
                1.0
            };
            ((2.0 * std::f32::consts::PI * freq * t).sin() * envelope * 16000.0) as i16
        })
        .collect();

    match encode_wav(&samples) {
        Ok(wav) => wav,
        Err(e) => {
            tracing::warn!("Failed to encode feedback tone: {}", e);
            Vec::new()
        }
    }
}

fn encode_wav(samples: &[i16]) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: CUE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buf = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buf)
}

fn default_theme() -> SoundTheme {
    SoundTheme {
        // Rising: listening
        start: tone_wav(&[440.0, 880.0], 150, 20),
        // Falling: done
        ready: tone_wav(&[880.0, 660.0], 120, 20),
        cancel: tone_wav(&[600.0, 400.0], 100, 10),
        error: tone_wav(&[300.0, 200.0], 200, 30),
    }
}

fn subtle_theme() -> SoundTheme {
    SoundTheme {
        start: tone_wav(&[1200.0], 50, 10),
        ready: tone_wav(&[800.0], 50, 10),
        cancel: tone_wav(&[600.0], 40, 8),
        error: tone_wav(&[400.0, 300.0], 100, 15),
    }
}
