//! cpal-based audio capture
//!
//! Uses the cpal crate for cross-platform audio input.
//! Works with PipeWire, PulseAudio, and ALSA backends.
//!
//! Note: cpal::Stream is not Send, so the stream lives on a dedicated thread
//! and is controlled through channels.

use super::{AudioCapture, FrameSink};
use crate::config::AudioConfig;
use crate::error::AudioError;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// How long to wait for the capture thread to open or close the stream
const THREAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands sent to the audio capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<()>),
}

/// Stream format facts the callback needs
#[derive(Clone, Copy)]
struct StreamShape {
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// cpal-based audio capture implementation
pub struct CpalCapture {
    /// Audio configuration
    config: AudioConfig,
    /// Command sender to the capture thread
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    /// Handle to the capture thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalCapture {
    /// Create a new cpal audio capture instance
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            config: config.clone(),
            cmd_tx: None,
            thread_handle: None,
        }
    }
}

/// Find an audio input device by name.
///
/// Tries an exact match, then a case-insensitive match, then a
/// case-insensitive substring match, so both full cpal names and short
/// PipeWire/PulseAudio names work.
fn find_audio_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let devices: Vec<(String, cpal::Device)> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .filter_map(|d| d.name().ok().map(|name| (name, d)))
        .collect();

    let search_lower = device_name.to_lowercase();
    let position = devices
        .iter()
        .position(|(name, _)| name == device_name)
        .or_else(|| {
            devices
                .iter()
                .position(|(name, _)| name.to_lowercase() == search_lower)
        })
        .or_else(|| {
            devices
                .iter()
                .position(|(name, _)| name.to_lowercase().contains(&search_lower))
        });

    if let Some(index) = position {
        let (name, device) = devices.into_iter().nth(index).ok_or_else(|| {
            AudioError::DeviceNotFound(device_name.to_string())
        })?;
        tracing::debug!("Matched audio device '{}' for '{}'", name, device_name);
        return Ok(device);
    }

    let available = if devices.is_empty() {
        "No audio input devices found.".to_string()
    } else {
        format!(
            "Available devices:\n{}",
            devices
                .iter()
                .map(|(n, _)| format!("  - {}", n))
                .collect::<Vec<_>>()
                .join("\n")
        )
    };

    Err(AudioError::DeviceNotFoundWithList {
        requested: device_name.to_string(),
        available,
    })
}

#[async_trait::async_trait]
impl AudioCapture for CpalCapture {
    async fn start(&mut self, sink: FrameSink) -> Result<(), AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        if self.cmd_tx.is_some() {
            self.stop().await?;
        }

        let host = cpal::default_host();
        let device = if self.config.device == "default" {
            host.default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?
        } else {
            find_audio_device(&host, &self.config.device)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::debug!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let shape = StreamShape {
            source_rate: supported_config.sample_rate().0,
            target_rate: self.config.sample_rate,
            source_channels: supported_config.channels() as usize,
        };
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            shape.source_rate,
            shape.source_channels,
            sample_format
        );

        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<(), AudioError>>();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            let err_fn = |err| tracing::error!("Audio stream error: {}", err);

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, shape, sink, err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, shape, sink, err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, shape, sink, err_fn)
                }
                format => Err(AudioError::StreamError(format!(
                    "Unsupported sample format: {:?}",
                    format
                ))),
            };

            let stream = match stream_result.and_then(|s| {
                s.play()
                    .map_err(|e| AudioError::StreamError(e.to_string()))
                    .map(|()| s)
            }) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            let _ = ready_tx.send(Ok(()));
            tracing::debug!("Audio capture thread started");

            // Dropping the stream closes the device
            if let Ok(CaptureCommand::Stop(done)) = cmd_rx.recv() {
                drop(stream);
                let _ = done.send(());
            }

            tracing::debug!("Audio capture thread stopped");
        });

        match tokio::time::timeout(THREAD_TIMEOUT, ready_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Ok(Err(_)) => {
                return Err(AudioError::StreamError(
                    "Capture thread exited during startup".to_string(),
                ))
            }
            Err(_) => return Err(AudioError::Timeout(THREAD_TIMEOUT.as_secs() as u32)),
        }

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), AudioError> {
        let Some(cmd_tx) = self.cmd_tx.take() else {
            return Ok(());
        };

        let (done_tx, done_rx) = oneshot::channel();
        if cmd_tx.send(CaptureCommand::Stop(done_tx)).is_ok() {
            match tokio::time::timeout(THREAD_TIMEOUT, done_rx).await {
                Ok(_) => {}
                Err(_) => return Err(AudioError::Timeout(THREAD_TIMEOUT.as_secs() as u32)),
            }
        }

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shape: StreamShape,
    sink: FrameSink,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = data
                    .chunks(shape.source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / frame.len() as f32
                    })
                    .collect();

                sink.push(resample(&mono, shape.source_rate, shape.target_rate));
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))
}

/// Linear interpolation resampling
pub(crate) fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;

    (0..new_len)
        .map(|i| {
            let src_idx = i as f64 / ratio;
            let idx = src_idx.floor() as usize;
            let frac = (src_idx - idx as f64) as f32;

            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(a), Some(b)) => a * (1.0 - frac) + b * frac,
                (Some(a), None) => *a,
                _ => 0.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_48k_to_16k() {
        let samples: Vec<f32> = (0..480).map(|i| i as f32).collect();
        let result = resample(&samples, 48000, 16000);
        assert_eq!(result.len(), 160);
        assert_eq!(result[1], 3.0);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let result = resample(&[0.0, 1.0], 8000, 16000);
        assert_eq!(result, vec![0.0, 0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 48000, 16000).is_empty());
    }
}
