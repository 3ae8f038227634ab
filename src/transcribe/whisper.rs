//! Whisper-based speech-to-text transcription
//!
//! Uses whisper.cpp via the whisper-rs crate for fast, local transcription.

use super::{preview, Transcriber, SAMPLE_RATE};
use crate::config::{Config, WhisperConfig};
use crate::error::TranscribeError;
use std::path::{Path, PathBuf};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Whisper-based transcriber
pub struct WhisperTranscriber {
    /// Whisper context (holds the model)
    ctx: WhisperContext,
    /// Language for transcription, "auto" to detect
    language: String,
    /// Whether to translate to English
    translate: bool,
    /// Number of threads to use
    threads: usize,
}

impl WhisperTranscriber {
    /// Load the configured model
    pub fn new(config: &WhisperConfig) -> Result<Self, TranscribeError> {
        let model_path = resolve_model_path(&config.model, &Config::models_dir())?;

        tracing::info!("Loading whisper model from {:?}", model_path);
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(
            model_path
                .to_str()
                .ok_or_else(|| TranscribeError::ModelNotFound("Invalid path".to_string()))?,
            WhisperContextParameters::default(),
        )
        .map_err(|e| TranscribeError::InitFailed(e.to_string()))?;

        tracing::info!("Model loaded in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            ctx,
            language: config.language.clone(),
            translate: config.translate,
            threads: config.threads.unwrap_or_else(|| num_cpus::get().min(4)),
        })
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String, TranscribeError> {
        if samples.is_empty() {
            return Err(TranscribeError::AudioFormat("Empty audio buffer".to_string()));
        }

        let duration_secs = samples.len() as f32 / SAMPLE_RATE as f32;
        tracing::debug!(
            "Transcribing {:.2}s of audio ({} samples)",
            duration_secs,
            samples.len()
        );

        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if self.language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.language));
        }
        params.set_translate(self.translate);
        params.set_n_threads(self.threads as i32);

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        params.set_suppress_nst(true);

        // Dictation clips are short; one segment avoids mid-utterance splits
        if duration_secs < 30.0 {
            params.set_single_segment(true);
        }
        if let Some(audio_ctx) = audio_ctx_for(duration_secs) {
            params.set_audio_ctx(audio_ctx);
            tracing::debug!("Using audio_ctx={} for {:.2}s clip", audio_ctx, duration_secs);
        }

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::InferenceFailed(e.to_string()))?,
            );
        }
        let result = text.trim().to_string();

        tracing::info!(
            "Transcription completed in {:.2}s: {:?}",
            start.elapsed().as_secs_f32(),
            preview(&result)
        );

        Ok(result)
    }
}

/// File name of a ggml model: "base.en" becomes "ggml-base.en.bin"
pub fn model_filename(model: &str) -> String {
    if model.ends_with(".bin") {
        model.to_string()
    } else {
        format!("ggml-{}.bin", model)
    }
}

/// Where to download a model from
pub fn model_url(model: &str) -> String {
    format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_filename(model)
    )
}

/// Find a model on disk: absolute path, the models directory, then
/// the working directory and ./models
fn resolve_model_path(model: &str, models_dir: &Path) -> Result<PathBuf, TranscribeError> {
    let direct = PathBuf::from(model);
    if direct.is_absolute() {
        if direct.exists() {
            return Ok(direct);
        }
        return Err(TranscribeError::ModelNotFound(format!(
            "Model file not found: {}",
            direct.display()
        )));
    }

    let filename = model_filename(model);
    let candidates = [
        models_dir.join(&filename),
        PathBuf::from(&filename),
        PathBuf::from("models").join(&filename),
    ];

    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    Err(TranscribeError::ModelNotFound(format!(
        "Model '{}' not found. Looked in:\n{}\n\nDownload from: {}",
        model,
        candidates
            .iter()
            .map(|p| format!("  - {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n"),
        model_url(model)
    )))
}

/// Smaller audio context for short clips (up to 22.5 s): duration * 50 + 64
fn audio_ctx_for(duration_secs: f32) -> Option<i32> {
    if duration_secs <= 22.5 {
        Some((duration_secs * 50.0) as i32 + 64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_filename() {
        assert_eq!(model_filename("base.en"), "ggml-base.en.bin");
        assert_eq!(model_filename("large-v3-turbo"), "ggml-large-v3-turbo.bin");
        assert_eq!(model_filename("custom.bin"), "custom.bin");
    }

    #[test]
    fn test_model_url() {
        let url = model_url("base.en");
        assert!(url.contains("ggml-base.en.bin"));
        assert!(url.contains("huggingface.co"));
    }

    #[test]
    fn test_resolve_model_in_models_dir() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("ggml-tiny.en.bin");
        std::fs::write(&model, b"fake").unwrap();

        assert_eq!(resolve_model_path("tiny.en", dir.path()).unwrap(), model);
        assert_eq!(
            resolve_model_path(model.to_str().unwrap(), Path::new("/nonexistent")).unwrap(),
            model
        );
    }

    #[test]
    fn test_resolve_missing_model_lists_locations() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_model_path("saytype-missing", dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ggml-saytype-missing.bin"));
        assert!(message.contains("huggingface.co"));
    }

    #[test]
    fn test_audio_ctx() {
        assert_eq!(audio_ctx_for(1.0), Some(114));
        assert_eq!(audio_ctx_for(22.5), Some(1189));
        assert_eq!(audio_ctx_for(30.0), None);
    }
}
