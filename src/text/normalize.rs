//! Voice command grammar
//!
//! Turns a raw transcript into injectable text. The rewrite is an ordered
//! list of pure stages ([`PIPELINE`]); each stage only sees the output of the
//! one before it, so reordering them changes behavior.
//!
//! Spans that must survive untouched (spoken quotations and escaped command
//! words) are swapped for private-use placeholders up front and restored near
//! the end, which keeps later substitutions from re-triggering on them.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Line break marker, replayed as a single Enter press
pub const LINE_BREAK: char = '\u{2028}';

/// Paragraph break marker, replayed as two Enter presses
pub const PARAGRAPH_BREAK: char = '\u{2029}';

const QUOTE_OPEN: char = '\u{E000}';
const QUOTE_CLOSE: char = '\u{E001}';
const LITERAL_OPEN: char = '\u{E002}';
const LITERAL_CLOSE: char = '\u{E003}';

/// Sentence terminators
pub const TERMINATORS: &[char] = &['.', '?', '!', '…'];

const CLOSERS: &[char] = &[')', ']', '}', '”', '"', '\''];
const STRAY_LEADING: &[char] = &[',', ';', ':', '.', '!', '?'];

/// Domain suffixes recognized by the formatting fixups
pub const DOMAIN_SUFFIXES: &[&str] = &["com", "org", "net", "edu", "gov", "io", "dev", "app", "info"];

/// Is `c` a line or paragraph break (marker or plain newline)
pub fn is_break(c: char) -> bool {
    matches!(c, LINE_BREAK | PARAGRAPH_BREAK | '\n')
}

/// How a command symbol joins the words around it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attach {
    /// Glued to the previous word: `word,`
    Left,
    /// Glued to the next word: `(word`
    Right,
    /// Glued on both sides: `well-known`, break markers
    Both,
    /// Surrounding spaces kept
    Keep,
}

struct Command {
    phrase: &'static str,
    symbol: &'static str,
    attach: Attach,
}

const fn cmd(phrase: &'static str, symbol: &'static str, attach: Attach) -> Command {
    Command {
        phrase,
        symbol,
        attach,
    }
}

static MULTI_WORD: &[Command] = &[
    cmd("new paragraph", "\u{2029}", Attach::Both),
    cmd("paragraph break", "\u{2029}", Attach::Both),
    cmd("next paragraph", "\u{2029}", Attach::Both),
    cmd("new line", "\u{2028}", Attach::Both),
    cmd("newline", "\u{2028}", Attach::Both),
    cmd("line break", "\u{2028}", Attach::Both),
    cmd("next line", "\u{2028}", Attach::Both),
    cmd("return", "\u{2028}", Attach::Both),
    cmd("soft break", SOFT_BREAK, Attach::Both),
    cmd("soft line", SOFT_BREAK, Attach::Both),
    cmd("open paren", "(", Attach::Right),
    cmd("open parenthesis", "(", Attach::Right),
    cmd("left paren", "(", Attach::Right),
    cmd("close paren", ")", Attach::Left),
    cmd("close parenthesis", ")", Attach::Left),
    cmd("right paren", ")", Attach::Left),
    cmd("open bracket", "[", Attach::Right),
    cmd("left bracket", "[", Attach::Right),
    cmd("close bracket", "]", Attach::Left),
    cmd("right bracket", "]", Attach::Left),
    cmd("open brace", "{", Attach::Right),
    cmd("left brace", "{", Attach::Right),
    cmd("close brace", "}", Attach::Left),
    cmd("right brace", "}", Attach::Left),
    cmd("open quote", "“", Attach::Right),
    cmd("open quotes", "“", Attach::Right),
    cmd("begin quote", "“", Attach::Right),
    cmd("close quote", "”", Attach::Left),
    cmd("close quotes", "”", Attach::Left),
    cmd("end quote", "”", Attach::Left),
    cmd("unquote", "”", Attach::Left),
    cmd("question mark", "?", Attach::Left),
    cmd("exclamation mark", "!", Attach::Left),
    cmd("exclamation point", "!", Attach::Left),
    cmd("full stop", ".", Attach::Left),
    cmd("dot dot dot", "…", Attach::Left),
    cmd("ellipsis", "…", Attach::Left),
    cmd("em dash", "—", Attach::Both),
    cmd("emdash", "—", Attach::Both),
];

static SINGLE_WORD: &[Command] = &[
    cmd("comma", ",", Attach::Left),
    cmd("semicolon", ";", Attach::Left),
    cmd("colon", ":", Attach::Left),
    cmd("period", ".", Attach::Left),
    cmd("apostrophe", "'", Attach::Both),
    cmd("hyphen", "-", Attach::Both),
    cmd("dash", "-", Attach::Both),
    cmd("tab", "\t", Attach::Both),
    cmd("quote", "\"", Attach::Keep),
];

/// Regex alternation of phrases, longest first, tolerant of extra spacing
fn alternation<'a>(commands: impl Iterator<Item = &'a Command>) -> String {
    let mut phrases: Vec<&str> = commands.map(|c| c.phrase).collect();
    phrases.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    phrases
        .iter()
        .map(|p| {
            p.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[ \t]+")
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn command_regex(table: &[Command]) -> Regex {
    let pattern = format!(
        r"(?i)(?P<pre>[ \t]*)\b(?P<cmd>{})\b[.,;:!?]?(?P<post>[ \t]*)",
        alternation(table.iter())
    );
    Regex::new(&pattern).expect("Invalid command regex")
}

fn tld_alternation() -> String {
    DOMAIN_SUFFIXES.join("|")
}

static QUOTE_SPAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\bopen[ \t]+quotes?\b[.,;:!?]?\s*(.*?)[\s,]*\bclose[ \t]+quotes?\b")
        .expect("Invalid quote regex")
});
static LITERAL_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i)\b(literal|the[ \t]+words?)[ \t]+({})\b",
        alternation(MULTI_WORD.iter().chain(SINGLE_WORD.iter()))
    );
    Regex::new(&pattern).expect("Invalid literal regex")
});
static MULTI_WORD_RE: LazyLock<Regex> = LazyLock::new(|| command_regex(MULTI_WORD));
static SINGLE_WORD_RE: LazyLock<Regex> = LazyLock::new(|| command_regex(SINGLE_WORD));

static SPACE_INSIDE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([(\[{“])[ \t]+").expect("Invalid bracket regex"));
static SPACE_INSIDE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([)\]}”])").expect("Invalid bracket regex"));

static WEAK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,;:])(?:[ \t]*[,;:])+").expect("Invalid punctuation regex"));
static WEAK_BEFORE_STRONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*[,;:][ \t]*([.?!…])").expect("Invalid punctuation regex"));
static STRONG_THEN_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([!?])[ \t]*\.+").expect("Invalid punctuation regex"));

static MISSING_SPACE_STRONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([?!…])([\p{L}\p{N}(\[{“\x{E000}\x{E002}])").expect("Invalid spacing regex")
});
static MISSING_SPACE_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\p{Ll})\.([\p{Lu}(\[{“\x{E000}\x{E002}])").expect("Invalid spacing regex")
});

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([,;:?!…])").expect("Invalid spacing regex"));
static SPACE_BEFORE_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S)[ \t]+\.([^\d.]|$)").expect("Invalid spacing regex"));
static SPACE_RUN_AFTER_TERMINATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.?!…])( {2,})").expect("Invalid spacing regex"));

static SENTENCE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([.?!…][ \t]+[(\[{“"]?)(\p{Ll})"#).expect("Invalid capitalization regex")
});

static QUOTE_THEN_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<before>[^”]?)”(?P<term>[.?!…]+)").expect("Invalid quote regex")
});

static QUOTE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{E000}(\d+)\x{E001}").expect("Invalid placeholder regex"));
static LITERAL_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x{E002}(\d+)\x{E003}").expect("Invalid placeholder regex"));

static SPOKEN_DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)[ \t]+point[ \t]+(\d+)\b").expect("Invalid decimal regex")
});
static SPOKEN_DOT: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b([\w-]+)[ \t]+dot[ \t]+({})\b", tld_alternation());
    Regex::new(&pattern).expect("Invalid domain regex")
});
static DOMAIN_SPACE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i)(\w)\.[ \t]+({})([.?!,;:\x{{2028}}\x{{2029}}\n]|$)",
        tld_alternation()
    );
    Regex::new(&pattern).expect("Invalid domain regex")
});
static SPOKEN_AT: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r"(?i)(^|\s)([\w.+-]+)[ \t]+at[ \t]+([\w-]+(?:\.[\w-]+)*\.(?:{}))\b",
        tld_alternation()
    );
    Regex::new(&pattern).expect("Invalid address regex")
});

/// Words that precede a spoken "at" without being a mailbox name
const AT_STOP_WORDS: &[&str] = &[
    "me", "us", "you", "him", "her", "them", "it", "we", "i", "is", "are", "was", "be",
    "look", "looking", "meet", "find", "visit", "here", "there", "online", "site", "and", "or",
];

/// Side tables and flags for a single `normalize` call
#[derive(Debug, Default)]
pub struct NormalizationContext {
    /// Verbatim text of spoken quotations, by placeholder index
    quotes: Vec<String>,
    /// Command words spoken as plain words, by placeholder index
    literals: Vec<String>,
    /// Leave the first letter alone; the text continues a sentence
    continue_sentence: bool,
}

type Stage = fn(&str, &mut NormalizationContext) -> String;

/// The rewrite stages, in application order
pub(crate) const PIPELINE: &[(&str, Stage)] = &[
    ("quote protection", protect_quotes),
    ("literal escapes", escape_literals),
    ("multi-word commands", substitute_multi_word),
    ("single-word commands", substitute_single_word),
    ("bracket spacing", tidy_brackets),
    ("punctuation combinations", combine_punctuation),
    ("sentence spacing", space_after_terminators),
    ("line cleanup", clean_lines),
    ("quote terminators", reorder_quote_terminators),
    ("restoration", restore_placeholders),
    // restored quotations can put a terminator right after a closing quote
    ("restored quote terminators", reorder_quote_terminators),
    ("formatting fixups", formatting_fixups),
];

/// Normalize a raw transcript that starts a new sentence
pub fn normalize(raw: &str) -> String {
    normalize_with(raw, false)
}

/// Normalize a raw transcript
///
/// With `continue_sentence` set the first letter is not capitalized, since the
/// text is appended to a sentence that is still open.
pub fn normalize_with(raw: &str, continue_sentence: bool) -> String {
    let mut ctx = NormalizationContext {
        continue_sentence,
        ..Default::default()
    };

    // break markers are content, so only plain whitespace is trimmed
    let mut text = raw.trim_matches([' ', '\t', '\r', '\n']).to_string();
    for (name, stage) in PIPELINE {
        text = stage(&text, &mut ctx);
        tracing::trace!(stage = name, "{:?}", text);
    }
    text
}

fn protect_quotes(text: &str, ctx: &mut NormalizationContext) -> String {
    QUOTE_SPAN
        .replace_all(text, |caps: &Captures| {
            let index = ctx.quotes.len();
            ctx.quotes.push(caps[1].trim().to_string());
            format!("{QUOTE_OPEN}{index}{QUOTE_CLOSE}")
        })
        .into_owned()
}

fn escape_literals(text: &str, ctx: &mut NormalizationContext) -> String {
    LITERAL_ESCAPE
        .replace_all(text, |caps: &Captures| {
            let index = ctx.literals.len();
            ctx.literals.push(caps[2].to_string());
            let placeholder = format!("{LITERAL_OPEN}{index}{LITERAL_CLOSE}");
            if caps[1].eq_ignore_ascii_case("literal") {
                placeholder
            } else {
                format!("{} {}", &caps[1], placeholder)
            }
        })
        .into_owned()
}

fn substitute(re: &Regex, table: &[Command], text: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        let spoken = caps["cmd"]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let Some(command) = table.iter().find(|c| c.phrase == spoken) else {
            return caps[0].to_string();
        };

        let (pre, post) = (&caps["pre"], &caps["post"]);
        match command.attach {
            Attach::Left => format!("{}{}", command.symbol, post),
            Attach::Right => format!("{}{}", pre, command.symbol),
            Attach::Both => command.symbol.to_string(),
            Attach::Keep => format!("{}{}{}", pre, command.symbol, post),
        }
    })
    .into_owned()
}

fn substitute_multi_word(text: &str, _ctx: &mut NormalizationContext) -> String {
    substitute(&MULTI_WORD_RE, MULTI_WORD, text)
}

fn substitute_single_word(text: &str, _ctx: &mut NormalizationContext) -> String {
    substitute(&SINGLE_WORD_RE, SINGLE_WORD, text)
}

fn tidy_brackets(text: &str, _ctx: &mut NormalizationContext) -> String {
    let text = SPACE_INSIDE_OPEN.replace_all(text, "$1");
    let text = SPACE_INSIDE_CLOSE.replace_all(&text, "$1");
    hug_straight_quotes(&text)
}

/// Straight quotes pair up in order: odd ones open, even ones close
fn hug_straight_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }
        if open {
            out.truncate(out.trim_end_matches([' ', '\t']).len());
            out.push(c);
        } else {
            out.push(c);
            while chars.next_if(|c| matches!(c, ' ' | '\t')).is_some() {}
        }
        open = !open;
    }
    out
}

fn combine_punctuation(text: &str, _ctx: &mut NormalizationContext) -> String {
    let text = WEAK_RUN.replace_all(text, "$1");
    let text = WEAK_BEFORE_STRONG.replace_all(&text, "$1");
    let text = STRONG_THEN_PERIOD.replace_all(&text, "$1");
    collapse_runs(&text)
}

/// Collapse repeated terminators; period runs map 2 -> `.`, 3 -> `...`, 4+ -> `…`
fn collapse_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '.' {
            let mut run = 1;
            while chars.next_if_eq(&'.').is_some() {
                run += 1;
            }
            out.push_str(match run {
                1 | 2 => ".",
                3 => "...",
                _ => "…",
            });
        } else if matches!(c, '?' | '!' | '…' | ',' | ';' | ':') && out.ends_with(c) {
            continue;
        } else {
            out.push(c);
        }
    }
    out
}

/// A soft break after a terminator is the only run of spaces kept there
const SOFT_BREAK: &str = "   ";

fn space_after_terminators(text: &str, _ctx: &mut NormalizationContext) -> String {
    let text = SPACE_BEFORE_PUNCT.replace_all(text, "$1");
    let text = SPACE_BEFORE_PERIOD.replace_all(&text, "$1.$2");
    let text = SPACE_RUN_AFTER_TERMINATOR.replace_all(&text, |caps: &Captures| {
        if &caps[2] == SOFT_BREAK {
            caps[0].to_string()
        } else {
            format!("{} ", &caps[1])
        }
    });
    let text = MISSING_SPACE_STRONG.replace_all(&text, "$1 $2");
    MISSING_SPACE_PERIOD.replace_all(&text, "$1. $2").into_owned()
}

fn clean_lines(text: &str, ctx: &mut NormalizationContext) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    let mut line = String::new();
    let mut first = true;

    for c in text.chars() {
        if is_break(c) {
            out.push_str(&finish_line(&line, first && ctx.continue_sentence));
            out.push(c);
            line.clear();
            first = false;
        } else {
            line.push(c);
        }
    }
    out.push_str(&finish_line(&line, first && ctx.continue_sentence));
    out
}

fn finish_line(line: &str, continues: bool) -> String {
    let mut line = line.trim_matches([' ', '\t']);
    if !(line.starts_with("...") || line.starts_with('…')) {
        line = line.trim_start_matches(|c: char| STRAY_LEADING.contains(&c) || c == ' ' || c == '\t');
    }
    if line.is_empty() {
        return String::new();
    }

    let mut line = line.to_string();
    if line.ends_with([',', ';']) {
        line.pop();
        line.push('.');
    }
    if !ends_with_terminal(&line) {
        line.push('.');
    }

    let line = if continues { line } else { capitalize_first(&line) };
    SENTENCE_START
        .replace_all(&line, |caps: &Captures| {
            format!("{}{}", &caps[1], caps[2].to_uppercase())
        })
        .into_owned()
}

/// A line ends acceptably on a terminator or colon, possibly inside closers
fn ends_with_terminal(line: &str) -> bool {
    let body = line.trim_end_matches(CLOSERS);
    match body.chars().last() {
        Some(':') => body.len() == line.len(),
        Some(c) => TERMINATORS.contains(&c),
        None => false,
    }
}

fn capitalize_first(line: &str) -> String {
    let first = line
        .char_indices()
        .find(|(_, c)| c.is_alphanumeric() || matches!(*c, QUOTE_OPEN | LITERAL_OPEN));

    match first {
        Some((idx, c)) if c.is_lowercase() => {
            let mut out = String::with_capacity(line.len() + 2);
            out.push_str(&line[..idx]);
            out.extend(c.to_uppercase());
            out.push_str(&line[idx + c.len_utf8()..]);
            out
        }
        _ => line.to_string(),
    }
}

fn reorder_quote_terminators(text: &str, _ctx: &mut NormalizationContext) -> String {
    QUOTE_THEN_TERMINATOR
        .replace_all(text, |caps: &Captures| {
            let before = &caps["before"];
            let quoted_ends_sentence = before.chars().last().is_some_and(|c| TERMINATORS.contains(&c));
            if quoted_ends_sentence {
                format!("{before}”")
            } else {
                format!("{before}{}”", &caps["term"])
            }
        })
        .into_owned()
}

/// Does a placeholder preceded by `before` open a line or sentence
///
/// Line and sentence capitalization ran while the placeholder was still
/// opaque, so a restored word in that position is capitalized here.
fn opens_sentence(before: &str, continue_sentence: bool) -> bool {
    let lead = before.trim_end_matches(['(', '[', '{', '“', '"']);
    let body = lead.trim_end_matches([' ', '\t']);
    match body.chars().last() {
        None => !continue_sentence,
        Some(c) if is_break(c) => true,
        Some(c) => TERMINATORS.contains(&c) && body.len() < lead.len(),
    }
}

fn restore_placeholders(text: &str, ctx: &mut NormalizationContext) -> String {
    let text = LITERAL_PLACEHOLDER.replace_all(text, |caps: &Captures| {
        let Some(word) = caps[1].parse::<usize>().ok().and_then(|i| ctx.literals.get(i)) else {
            return caps[0].to_string();
        };
        let start = caps.get(0).map_or(0, |m| m.start());
        if opens_sentence(&text[..start], ctx.continue_sentence) {
            capitalize_first(word)
        } else {
            word.clone()
        }
    });
    QUOTE_PLACEHOLDER
        .replace_all(&text, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| ctx.quotes.get(i))
                .map(|q| format!("“{q}”"))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn formatting_fixups(text: &str, _ctx: &mut NormalizationContext) -> String {
    let text = SPOKEN_DECIMAL.replace_all(text, "$1.$2");
    let text = SPOKEN_DOT.replace_all(&text, |caps: &Captures| {
        format!("{}.{}", &caps[1], caps[2].to_lowercase())
    });
    let text = DOMAIN_SPACE.replace_all(&text, |caps: &Captures| {
        format!("{}.{}{}", &caps[1], caps[2].to_lowercase(), &caps[3])
    });
    SPOKEN_AT
        .replace_all(&text, |caps: &Captures| {
            let local = caps[2].to_lowercase();
            if AT_STOP_WORDS.contains(&local.as_str()) {
                caps[0].to_string()
            } else {
                format!("{}{}@{}", &caps[1], &caps[2], &caps[3])
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(stage: Stage, text: &str) -> String {
        stage(text, &mut NormalizationContext::default())
    }

    #[test]
    fn test_spoken_punctuation() {
        assert_eq!(
            normalize("Hello world comma how are you question mark"),
            "Hello world, how are you?"
        );
    }

    #[test]
    fn test_point_is_not_a_command_word() {
        assert_eq!(
            normalize("The temperature is 98 point 6 degrees"),
            "The temperature is 98.6 degrees."
        );
    }

    #[test]
    fn test_literal_escape_keeps_word() {
        let out = normalize("say the word period");
        assert_eq!(out, "Say the word period.");

        let out = normalize("type literal comma here");
        assert_eq!(out, "Type comma here.");
    }

    #[test]
    fn test_quote_protection() {
        let out = normalize("open quote new paragraph close quote");
        assert!(out.contains("“new paragraph"));
        assert!(!out.contains(PARAGRAPH_BREAK));
        assert_eq!(out, "“new paragraph.”");
    }

    #[test]
    fn test_quote_protection_inside_sentence() {
        let out = normalize("she said open quote stop comma now close quote and left");
        assert_eq!(out, "She said “stop comma now” and left.");
    }

    #[test]
    fn test_whisper_punctuation_around_commands() {
        assert_eq!(
            normalize("Hello world, comma, how are you? Question mark."),
            "Hello world, how are you?"
        );
    }

    #[test]
    fn test_line_and_paragraph_breaks() {
        let out = normalize("first line new line second line new paragraph third");
        assert_eq!(out, "First line.\u{2028}Second line.\u{2029}Third.");
    }

    #[test]
    fn test_trailing_comma_before_break() {
        let out = normalize("dear team comma new line thanks");
        assert_eq!(out, "Dear team.\u{2028}Thanks.");
    }

    #[test]
    fn test_brackets_hug_their_content() {
        assert_eq!(
            normalize("call me open paren maybe close paren tomorrow"),
            "Call me (maybe) tomorrow."
        );
    }

    #[test]
    fn test_joining_commands() {
        assert_eq!(normalize("a well hyphen known fact"), "A well-known fact.");
        assert_eq!(normalize("I don apostrophe t know"), "I don't know.");
    }

    #[test]
    fn test_capitalizes_after_terminators() {
        assert_eq!(
            normalize("it works period does it question mark yes"),
            "It works. Does it? Yes."
        );
    }

    #[test]
    fn test_continue_sentence_keeps_lowercase_start() {
        assert_eq!(normalize_with("and then some", true), "and then some.");
    }

    #[test]
    fn test_colon_is_an_acceptable_line_end() {
        assert_eq!(normalize("as follows colon"), "As follows:");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        for raw in [
            "hello world",
            "Is this working? yes it is",
            "The meeting moved to 3.30 tomorrow",
            "(aside) we should talk",
            "wait... what happened",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn test_trailing_break_is_a_fixed_point() {
        let once = normalize("hello comma new paragraph");
        assert_eq!(once, "Hello.\u{2029}");
        assert_eq!(normalize(&once), once);

        let once = normalize("sincerely new line");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_restored_literal_capitalized_at_line_start() {
        assert_eq!(normalize("literal period is a word"), "Period is a word.");
        assert_eq!(
            normalize("first new line literal comma is fine"),
            "First.\u{2028}Comma is fine."
        );
    }

    #[test]
    fn test_restored_literal_capitalized_after_terminator() {
        assert_eq!(
            normalize("done period literal comma is fine"),
            "Done. Comma is fine."
        );
    }

    #[test]
    fn test_restored_literal_follows_continuation() {
        assert_eq!(
            normalize_with("literal comma is fine", true),
            "comma is fine."
        );
    }

    #[test]
    fn test_one_space_after_terminators() {
        assert_eq!(normalize("Done.  Next one"), "Done. Next one.");
        assert_eq!(normalize("Done.    Next"), "Done. Next.");
        assert_eq!(normalize("hello , world"), "Hello, world.");
        assert_eq!(normalize("wait ? really"), "Wait? Really.");
    }

    #[test]
    fn test_soft_break_survives_after_terminator() {
        let once = normalize("done period soft break next");
        assert_eq!(once, "Done.   Next.");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_spoken_at_skips_pronouns() {
        assert_eq!(
            normalize("meet me at example dot com"),
            "Meet me at example.com."
        );
        assert_eq!(normalize("write to sales at example dot com"), "Write to sales@example.com.");
    }

    #[test]
    fn test_straight_quotes_hug_their_content() {
        assert_eq!(normalize("he said quote hi quote"), "He said \"hi\".");
        assert_eq!(run(tidy_brackets, "a \" b \" c \" d \""), "a \"b\" c \"d\"");
    }

    #[test]
    fn test_weak_before_strong() {
        assert_eq!(run(combine_punctuation, "hello,."), "hello.");
        assert_eq!(run(combine_punctuation, "hello ; ?"), "hello?");
        assert_eq!(run(combine_punctuation, "hello, , world"), "hello, world");
    }

    #[test]
    fn test_period_runs() {
        assert_eq!(run(combine_punctuation, "a.."), "a.");
        assert_eq!(run(combine_punctuation, "a..."), "a...");
        assert_eq!(run(combine_punctuation, "a...."), "a…");
        assert_eq!(run(combine_punctuation, "really?."), "really?");
        assert_eq!(run(combine_punctuation, "what??!!"), "what?!");
    }

    #[test]
    fn test_space_after_terminators() {
        assert_eq!(run(space_after_terminators, "what?yes"), "what? yes");
        assert_eq!(run(space_after_terminators, "done.Next"), "done. Next");
        assert_eq!(run(space_after_terminators, "3.14"), "3.14");
        assert_eq!(run(space_after_terminators, "file.txt"), "file.txt");
        assert_eq!(run(space_after_terminators, "end?)"), "end?)");
    }

    #[test]
    fn test_bracket_tidy() {
        assert_eq!(run(tidy_brackets, "( hi ) and “ quoted ”"), "(hi) and “quoted”");
    }

    #[test]
    fn test_quote_terminator_reorder() {
        assert_eq!(run(reorder_quote_terminators, "He said “go”!"), "He said “go!”");
        assert_eq!(run(reorder_quote_terminators, "He said “go.”."), "He said “go.”");
    }

    #[test]
    fn test_email_and_domains() {
        assert_eq!(
            normalize("mail john at example dot com"),
            "Mail john@example.com."
        );
        assert_eq!(normalize("visit example period com"), "Visit example.com.");
    }

    #[test]
    fn test_domain_fixup_leaves_sentences_alone() {
        assert_eq!(
            normalize("we grew period net profit rose"),
            "We grew. Net profit rose."
        );
    }

    #[test]
    fn test_ellipsis_command() {
        assert_eq!(normalize("and so dot dot dot"), "And so…");
    }

    #[test]
    fn test_stray_leading_punctuation() {
        assert_eq!(normalize("comma hello there"), "Hello there.");
        assert_eq!(normalize("... and then"), "... And then.");
    }
}
