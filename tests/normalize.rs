//! Voice-command grammar through the public text API

use saytype::config::TextConfig;
use saytype::text::{
    detect_undo, normalize, undo_extent, TextProcessor, UndoKind, UndoRecord, Utterance,
    LINE_BREAK, PARAGRAPH_BREAK,
};
use std::collections::HashMap;

#[test]
fn test_spoken_punctuation() {
    assert_eq!(
        normalize("Hello world comma how are you question mark"),
        "Hello world, how are you?"
    );
}

#[test]
fn test_unknown_words_pass_through() {
    assert_eq!(
        normalize("The temperature is 98 point 6 degrees"),
        "The temperature is 98.6 degrees."
    );
}

#[test]
fn test_literal_escape_survives() {
    let out = normalize("say the word period");
    assert!(out.contains("period"), "{:?}", out);
}

#[test]
fn test_quoted_commands_stay_literal() {
    let out = normalize("open quote new paragraph close quote");
    assert!(out.contains("new paragraph"), "{:?}", out);
    assert!(!out.contains(PARAGRAPH_BREAK));
}

#[test]
fn test_breaks_use_markers() {
    let out = normalize("dear team new line thanks new paragraph bye");
    assert!(out.contains(LINE_BREAK));
    assert!(out.contains(PARAGRAPH_BREAK));
    assert!(!out.contains('\n'));
}

#[test]
fn test_idempotent_without_commands() {
    for raw in [
        "Hello world, how are you?",
        "It works. Does it? Yes.",
        "Call me (maybe) tomorrow",
    ] {
        let once = normalize(raw);
        assert_eq!(normalize(&once), once, "not idempotent for {:?}", raw);
    }
}

#[test]
fn test_undo_word_extent() {
    let last = "The quick fox. ";
    let n = undo_extent(last, UndoKind::Word);
    assert_eq!(&last[last.len() - n..], "fox. ");

    assert_eq!(undo_extent("Supercalifragilistic", UndoKind::Word), 20);
}

#[test]
fn test_undo_sentence_extent() {
    let last = "First. Second";
    let n = undo_extent(last, UndoKind::Sentence);
    assert_eq!(&last[..last.len() - n], "First. ");
}

#[test]
fn test_undo_phrases() {
    assert_eq!(detect_undo("Scratch that."), Some(UndoKind::Sentence));
    assert_eq!(detect_undo("undo last word"), Some(UndoKind::Word));
    assert_eq!(detect_undo("Start over!"), Some(UndoKind::Everything));
    assert_eq!(detect_undo("scratch that idea and continue"), None);
}

#[test]
fn test_processor_applies_replacements_after_commands() {
    let config = TextConfig {
        voice_commands: true,
        replacements: HashMap::from([("saytype".to_string(), "Saytype".to_string())]),
    };
    let processor = TextProcessor::new(&config);

    let utterance = processor.interpret("i use saytype daily period", &UndoRecord::default());
    assert_eq!(
        utterance,
        Some(Utterance::Text("I use Saytype daily.".to_string()))
    );
}
