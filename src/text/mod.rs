//! Text processing module
//!
//! Turns a raw transcript into what gets injected:
//! - Undo commands ("scratch that") are recognized on the raw text
//! - Spoken punctuation and formatting via the [`normalize`] grammar
//! - Custom word replacements

pub mod normalize;
pub mod undo;

pub use normalize::{normalize, normalize_with, LINE_BREAK, PARAGRAPH_BREAK};
pub use undo::{detect_undo, rendered_width, undo_extent, UndoKind, UndoRecord};

use crate::config::TextConfig;
use regex::Regex;

/// What an utterance asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    /// Remove part of the last insertion
    Undo(UndoKind),
    /// Insert this text
    Text(String),
}

/// Text processor that applies transformations to transcribed text
pub struct TextProcessor {
    /// Whether voice commands are enabled
    voice_commands: bool,
    /// Custom word replacements, matched case-insensitively on word boundaries
    replacements: Vec<(Regex, String)>,
}

impl TextProcessor {
    /// Create a new text processor from configuration
    pub fn new(config: &TextConfig) -> Self {
        let mut keys: Vec<_> = config.replacements.iter().collect();
        // Longer phrases first so "say type app" wins over "say type"
        keys.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

        let replacements = keys
            .into_iter()
            .filter_map(|(from, to)| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(from.trim()));
                match Regex::new(&pattern) {
                    Ok(re) => Some((re, to.clone())),
                    Err(e) => {
                        tracing::warn!("Ignoring replacement '{}': {}", from, e);
                        None
                    }
                }
            })
            .collect();

        Self {
            voice_commands: config.voice_commands,
            replacements,
        }
    }

    /// Decide what a raw transcript asks for
    ///
    /// Returns `None` when nothing is left to inject.
    pub fn interpret(&self, raw: &str, record: &UndoRecord) -> Option<Utterance> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if self.voice_commands {
            if let Some(kind) = detect_undo(raw) {
                tracing::debug!("Undo command: {}", kind);
                return Some(Utterance::Undo(kind));
            }
        }

        let text = if self.voice_commands {
            normalize_with(raw, record.continue_mid_sentence)
        } else {
            raw.to_string()
        };
        let text = self.apply_replacements(&text);

        if text.trim().is_empty() {
            None
        } else {
            Some(Utterance::Text(text))
        }
    }

    fn apply_replacements(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (re, to) in &self.replacements {
            result = re.replace_all(&result, regex::NoExpand(to)).into_owned();
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn processor(voice_commands: bool, replacements: &[(&str, &str)]) -> TextProcessor {
        TextProcessor::new(&TextConfig {
            voice_commands,
            replacements: replacements
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        })
    }

    #[test]
    fn test_interpret_text() {
        let p = processor(true, &[]);
        assert_eq!(
            p.interpret("hello comma world", &UndoRecord::default()),
            Some(Utterance::Text("Hello, world.".to_string()))
        );
    }

    #[test]
    fn test_interpret_undo_skips_normalization() {
        let p = processor(true, &[]);
        assert_eq!(
            p.interpret("Scratch that.", &UndoRecord::default()),
            Some(Utterance::Undo(UndoKind::Sentence))
        );
    }

    #[test]
    fn test_interpret_continues_open_sentence() {
        let p = processor(true, &[]);
        let record = UndoRecord {
            last_inserted_text: "and so ".to_string(),
            continue_mid_sentence: true,
        };
        assert_eq!(
            p.interpret("the story goes", &record),
            Some(Utterance::Text("the story goes.".to_string()))
        );
    }

    #[test]
    fn test_voice_commands_disabled() {
        let p = processor(false, &[]);
        assert_eq!(
            p.interpret("scratch that comma", &UndoRecord::default()),
            Some(Utterance::Text("scratch that comma".to_string()))
        );
    }

    #[test]
    fn test_empty_transcript() {
        let p = processor(true, &[]);
        assert_eq!(p.interpret("  ", &UndoRecord::default()), None);
        assert_eq!(p.interpret("comma", &UndoRecord::default()), None);
    }

    #[test]
    fn test_replacements_are_word_bounded() {
        let p = processor(true, &[("say type", "saytype"), ("rust", "Rust")]);
        assert_eq!(
            p.interpret("I use say type with rust but not trusty", &UndoRecord::default()),
            Some(Utterance::Text("I use saytype with Rust but not trusty.".to_string()))
        );
    }
}
