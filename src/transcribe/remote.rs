//! Remote speech-to-text transcription via OpenAI-compatible API
//!
//! Sends audio to a remote whisper.cpp server or OpenAI-compatible endpoint
//! as a multipart WAV upload.

use super::{preview, Transcriber, SAMPLE_RATE};
use crate::config::WhisperConfig;
use crate::error::TranscribeError;
use std::io::Cursor;
use std::time::Duration;

const DEFAULT_REMOTE_MODEL: &str = "whisper-1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Remote transcriber using OpenAI-compatible Whisper API
#[derive(Debug)]
pub struct RemoteTranscriber {
    /// Base endpoint URL (e.g., "http://192.168.1.100:8080")
    endpoint: String,
    model: String,
    language: String,
    translate: bool,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteTranscriber {
    pub fn new(config: &WhisperConfig) -> Result<Self, TranscribeError> {
        Self::with_api_key(
            config,
            config
                .remote_api_key
                .clone()
                .or_else(|| std::env::var("SAYTYPE_WHISPER_API_KEY").ok()),
        )
    }

    fn with_api_key(
        config: &WhisperConfig,
        api_key: Option<String>,
    ) -> Result<Self, TranscribeError> {
        let endpoint = config.remote_endpoint.clone().ok_or_else(|| {
            TranscribeError::ConfigError("remote_endpoint is required when backend = 'remote'".into())
        })?;

        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(TranscribeError::ConfigError(format!(
                "remote_endpoint must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        if endpoint.starts_with("http://")
            && !["localhost", "127.0.0.1", "[::1]"]
                .iter()
                .any(|host| endpoint.contains(host))
        {
            tracing::warn!(
                "Remote endpoint uses HTTP without TLS. Audio data will be transmitted unencrypted!"
            );
        }

        let model = config
            .remote_model
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_MODEL.to_string());
        let timeout =
            Duration::from_secs(config.remote_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        tracing::info!(
            "Configured remote transcriber: endpoint={}, model={}, timeout={}s",
            endpoint,
            model,
            timeout.as_secs()
        );

        Ok(Self {
            endpoint,
            model,
            language: config.language.clone(),
            translate: config.translate,
            api_key,
            timeout,
        })
    }

    fn url(&self) -> String {
        let path = if self.translate {
            "/v1/audio/translations"
        } else {
            "/v1/audio/transcriptions"
        };
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    /// Build the multipart form body, returning (boundary, body)
    fn multipart_body(&self, wav_data: &[u8]) -> (String, Vec<u8>) {
        let boundary = format!(
            "----SaytypeBoundary{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        );

        let mut body = Vec::new();
        let mut field = |name: &str, value: &[u8]| {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value);
            body.extend_from_slice(b"\r\n");
        };

        field("model", self.model.as_bytes());
        if self.language != "auto" {
            field("language", self.language.as_bytes());
        }
        field("response_format", b"json");

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"audio.wav\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(wav_data);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());

        (boundary, body)
    }
}

/// 16-bit PCM WAV of f32 samples in [-1, 1]
fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, TranscribeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let wav_err = |e: hound::Error| TranscribeError::AudioFormat(format!("WAV encoding failed: {}", e));

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec).map_err(wav_err)?;
    for &sample in samples {
        writer
            .write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
            .map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;

    Ok(buffer.into_inner())
}

/// Pull the transcript out of an OpenAI-style JSON response
fn extract_text(json: &serde_json::Value) -> Result<String, TranscribeError> {
    json.get("text")
        .and_then(|v| v.as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| TranscribeError::RemoteError(format!("Response missing 'text' field: {}", json)))
}

impl Transcriber for RemoteTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::AudioFormat("Empty audio buffer".into()));
        }

        tracing::debug!(
            "Sending {:.2}s of audio to remote server",
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        let start = std::time::Instant::now();

        let wav_data = encode_wav(samples)?;
        let (boundary, body) = self.multipart_body(&wav_data);

        let mut request = ureq::post(&self.url()).timeout(self.timeout).set(
            "Content-Type",
            &format!("multipart/form-data; boundary={}", boundary),
        );
        if let Some(ref key) = self.api_key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }

        let response = request.send_bytes(&body).map_err(|e| match e {
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                TranscribeError::RemoteError(format!("Server returned {}: {}", code, body))
            }
            ureq::Error::Transport(t) => {
                TranscribeError::NetworkError(format!("Request failed: {}", t))
            }
        })?;

        let json: serde_json::Value = response.into_json().map_err(|e| {
            TranscribeError::RemoteError(format!("Failed to parse response: {}", e))
        })?;
        let text = extract_text(&json)?;

        tracing::info!(
            "Remote transcription completed in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            preview(&text)
        );

        Ok(text)
    }
}
