//! Undo commands
//!
//! Undo phrases are recognized on the raw transcript, before any voice
//! command rewriting. The amount to delete is computed against the text the
//! injector last inserted, so break markers in that text count.

use super::normalize::{is_break, LINE_BREAK, PARAGRAPH_BREAK, TERMINATORS};

/// How much of the last insertion an undo command removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoKind {
    Word,
    Sentence,
    Paragraph,
    Everything,
}

impl std::fmt::Display for UndoKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UndoKind::Word => "word",
            UndoKind::Sentence => "sentence",
            UndoKind::Paragraph => "paragraph",
            UndoKind::Everything => "everything",
        };
        f.write_str(name)
    }
}

const UNDO_PHRASES: &[(&str, UndoKind)] = &[
    ("undo", UndoKind::Word),
    ("undo word", UndoKind::Word),
    ("undo last word", UndoKind::Word),
    ("undo that word", UndoKind::Word),
    ("delete word", UndoKind::Word),
    ("delete last word", UndoKind::Word),
    ("delete that word", UndoKind::Word),
    ("scratch word", UndoKind::Word),
    ("scratch that", UndoKind::Sentence),
    ("strike that", UndoKind::Sentence),
    ("delete that", UndoKind::Sentence),
    ("undo that", UndoKind::Sentence),
    ("undo sentence", UndoKind::Sentence),
    ("undo last sentence", UndoKind::Sentence),
    ("delete sentence", UndoKind::Sentence),
    ("delete last sentence", UndoKind::Sentence),
    ("scratch sentence", UndoKind::Sentence),
    ("undo paragraph", UndoKind::Paragraph),
    ("undo last paragraph", UndoKind::Paragraph),
    ("delete paragraph", UndoKind::Paragraph),
    ("delete last paragraph", UndoKind::Paragraph),
    ("scratch paragraph", UndoKind::Paragraph),
    ("undo everything", UndoKind::Everything),
    ("undo all", UndoKind::Everything),
    ("delete everything", UndoKind::Everything),
    ("delete all", UndoKind::Everything),
    ("scratch everything", UndoKind::Everything),
    ("clear all", UndoKind::Everything),
    ("start over", UndoKind::Everything),
];

/// Classify a raw transcript as an undo command
///
/// Punctuation is dropped and whitespace collapsed before the phrase is
/// compared, so "Scratch that." and "scratch   that" both match.
pub fn detect_undo(raw: &str) -> Option<UndoKind> {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '\'' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let phrase = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    UNDO_PHRASES
        .iter()
        .find(|(p, _)| *p == phrase)
        .map(|(_, kind)| *kind)
}

/// Number of characters to delete from the end of `last` for `kind`
///
/// A word undo with no space boundary removes the whole text.
pub fn undo_extent(last: &str, kind: UndoKind) -> usize {
    let chars: Vec<char> = last.chars().collect();
    let len = chars.len();

    let keep = match kind {
        UndoKind::Everything => 0,
        UndoKind::Word => {
            let end = trim_end(&chars, |c| c.is_whitespace());
            chars[..end]
                .iter()
                .rposition(|c| c.is_whitespace())
                .map_or(0, |i| i + 1)
        }
        UndoKind::Sentence => {
            let end = trim_end(&chars, |c| c.is_whitespace());
            let end = trim_end(&chars[..end], |c| TERMINATORS.contains(&c) || c == '”');
            match chars[..end].iter().rposition(|c| TERMINATORS.contains(c)) {
                Some(i) => {
                    let mut keep = i + 1;
                    while keep < end && (chars[keep] == '”' || chars[keep].is_whitespace()) {
                        keep += 1;
                    }
                    keep
                }
                None => 0,
            }
        }
        UndoKind::Paragraph => {
            let end = trim_end(&chars, |c| c.is_whitespace());
            chars[..end]
                .iter()
                .rposition(|c| is_break(*c))
                .map_or(0, |i| i + 1)
        }
    };

    len - keep
}

fn trim_end(chars: &[char], strip: impl Fn(char) -> bool) -> usize {
    chars.iter().rposition(|c| !strip(*c)).map_or(0, |i| i + 1)
}

/// Width of `text` as the focused application sees it, in key presses
///
/// A paragraph break replays as two newlines.
pub fn rendered_width(text: &str) -> usize {
    text.chars()
        .map(|c| if c == PARAGRAPH_BREAK { 2 } else { 1 })
        .sum()
}

/// Does the text leave the cursor at the start of a new sentence
pub fn ends_sentence(text: &str) -> bool {
    let text = text.trim_end_matches([' ', '\t']);
    let body = text.trim_end_matches(['”', '"', ')', ']', '}']);
    match text.chars().last() {
        None => true,
        Some(c) if c == LINE_BREAK || c == PARAGRAPH_BREAK || c == '\n' => true,
        Some(_) => body.chars().last().is_some_and(|c| TERMINATORS.contains(&c)),
    }
}

/// The last inserted text, kept for undo and capitalization decisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoRecord {
    /// Text exactly as injected, break markers included
    pub last_inserted_text: String,
    /// The next utterance continues an open sentence
    pub continue_mid_sentence: bool,
}

impl UndoRecord {
    /// Remember a successful injection
    pub fn record_insert(&mut self, text: &str) {
        self.last_inserted_text = text.to_string();
        self.continue_mid_sentence = !ends_sentence(text);
    }

    /// Suffix of the last insertion that an undo of `kind` removes
    pub fn pending_removal(&self, kind: UndoKind) -> &str {
        let extent = undo_extent(&self.last_inserted_text, kind);
        let total = self.last_inserted_text.chars().count();
        let split = self
            .last_inserted_text
            .char_indices()
            .nth(total - extent)
            .map_or(self.last_inserted_text.len(), |(i, _)| i);
        &self.last_inserted_text[split..]
    }

    /// Apply an undo that has been carried out; returns the removed text
    pub fn apply_undo(&mut self, kind: UndoKind) -> String {
        let removed = self.pending_removal(kind).to_string();
        let remaining = self.last_inserted_text.len() - removed.len();
        self.last_inserted_text.truncate(remaining);

        self.continue_mid_sentence =
            !self.last_inserted_text.is_empty() && !ends_sentence(&self.last_inserted_text);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remaining(last: &str, kind: UndoKind) -> String {
        let extent = undo_extent(last, kind);
        last.chars().take(last.chars().count() - extent).collect()
    }

    #[test]
    fn test_detect_undo_phrases() {
        assert_eq!(detect_undo("Scratch that."), Some(UndoKind::Sentence));
        assert_eq!(detect_undo("undo"), Some(UndoKind::Word));
        assert_eq!(detect_undo("  Undo   last WORD!"), Some(UndoKind::Word));
        assert_eq!(detect_undo("Delete paragraph"), Some(UndoKind::Paragraph));
        assert_eq!(detect_undo("undo everything"), Some(UndoKind::Everything));
    }

    #[test]
    fn test_detect_undo_requires_exact_phrase() {
        assert_eq!(detect_undo("please undo that sentence for me"), None);
        assert_eq!(detect_undo("scratch that itch"), None);
        assert_eq!(detect_undo(""), None);
    }

    #[test]
    fn test_word_extent() {
        let last = "The quick fox. ";
        assert_eq!(undo_extent(last, UndoKind::Word), 5);
        assert_eq!(remaining(last, UndoKind::Word), "The quick ");
    }

    #[test]
    fn test_word_extent_without_space_deletes_everything() {
        assert_eq!(undo_extent("Hello.", UndoKind::Word), 6);
        assert_eq!(undo_extent("Hello. ", UndoKind::Word), 7);
    }

    #[test]
    fn test_sentence_extent() {
        assert_eq!(remaining("First. Second", UndoKind::Sentence), "First. ");
        assert_eq!(
            remaining("One. Two? Three!! ", UndoKind::Sentence),
            "One. Two? "
        );
        assert_eq!(remaining("Only one sentence.", UndoKind::Sentence), "");
    }

    #[test]
    fn test_paragraph_extent() {
        let last = "Intro.\u{2029}Body one.\u{2028}Body two. ";
        assert_eq!(remaining(last, UndoKind::Paragraph), "Intro.\u{2029}Body one.\u{2028}");
        assert_eq!(remaining("No breaks here. ", UndoKind::Paragraph), "");
        assert_eq!(remaining("Trailing.\u{2029}", UndoKind::Paragraph), "");
    }

    #[test]
    fn test_everything_extent() {
        assert_eq!(undo_extent("Some text. ", UndoKind::Everything), 11);
        assert_eq!(undo_extent("", UndoKind::Everything), 0);
    }

    #[test]
    fn test_rendered_width_counts_paragraph_twice() {
        assert_eq!(rendered_width("a\u{2029}b"), 4);
        assert_eq!(rendered_width("a\u{2028}b"), 3);
    }

    #[test]
    fn test_full_undo_starts_fresh_sentence() {
        let mut record = UndoRecord::default();
        record.record_insert("hello there ");
        assert!(record.continue_mid_sentence);

        let removed = record.apply_undo(UndoKind::Everything);
        assert_eq!(removed, "hello there ");
        assert!(record.last_inserted_text.is_empty());
        assert!(!record.continue_mid_sentence);
    }

    #[test]
    fn test_partial_undo_tracks_open_sentence() {
        let mut record = UndoRecord::default();
        record.record_insert("First. Second part. ");
        assert!(!record.continue_mid_sentence);

        record.apply_undo(UndoKind::Word);
        assert_eq!(record.last_inserted_text, "First. Second ");
        assert!(record.continue_mid_sentence);

        record.apply_undo(UndoKind::Sentence);
        assert_eq!(record.last_inserted_text, "First. ");
        assert!(!record.continue_mid_sentence);
    }

    #[test]
    fn test_pending_removal_handles_multibyte() {
        let mut record = UndoRecord::default();
        record.record_insert("Café “ok.” ");
        assert_eq!(record.pending_removal(UndoKind::Word), "“ok.” ");
    }
}
