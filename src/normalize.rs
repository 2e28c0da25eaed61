//! Email body normalization
//!
//! Turns a raw plain-text or HTML body into clean prose: markup, reply
//! headers, quoted lines, signatures (English, German, Russian), URLs and
//! email addresses are removed.
//!
//! The stages run in a fixed order. Structural removal (HTML, reply headers,
//! signature truncation) happens before line filtering because quote markers
//! and signature cues are only recognizable in their original multi-line
//! context.
//!
//! # Example
//!
//! ```rust
//! use mail_normalize::clean;
//!
//! let text = clean("Hi team,\nthe build is green.\n\nBest regards,\nAnna");
//! assert_eq!(text, "Hi team,\nthe build is green");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::html;

/// Closing salutations that open a signature block.
pub const SALUTATIONS: &[&str] = &[
    // English
    "regards",
    "best regards",
    "kind regards",
    "best",
    "cheers",
    "sincerely",
    "yours sincerely",
    "yours truly",
    "thanks",
    "thank you",
    // Russian
    "с уважением",
    "с наилучшими пожеланиями",
    "спасибо",
    // German
    "mit freundlichen grüßen",
    "viele grüße",
    "beste grüße",
    "herzliche grüße",
    "liebe grüße",
    "grüße",
    "danke",
];

/// Signature delimiters; the earliest occurrence truncates the body.
const SIGNATURE_DELIMITERS: &[&str] = &["\n--", "\n—", " -- ", " — "];

fn salutation_alternation() -> String {
    let mut words: Vec<&str> = SALUTATIONS.to_vec();
    // Longest first so "best regards" wins over "best".
    words.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));
    words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|")
}

static REPLY_HEADER_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)(?:^|[\r\n>]\s*)(?:on\s+.+?wrote:?.*$|am\s+.+?schrieb:?.*$)").unwrap()
});

static SIGNATURE_ANYWHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?mi)(?:^|[\r\n]|[.!?]\s)(?:{})[\s,.\-]*",
        salutation_alternation()
    ))
    .unwrap()
});

static REPLY_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^(?:on\s+.+wrote:.*$|am\s+.+schrieb:.*$)").unwrap()
});

static FORWARD_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?mi)^(?:begin forwarded message:|forwarded message:|weitergeleitete nachricht:?).*$",
    )
    .unwrap()
});

static ORIGINAL_MESSAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-----Original Message-----|-----Forwarded message-----|-----Ursprüngliche Nachricht-----",
    )
    .unwrap()
});

static QUOTE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[>|]").unwrap());

static DELIMITER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:--|__|-)\s*$").unwrap());

static HEADER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:from|sent|to|subject|date|cc|von|an|betreff|gesendet):\s+").unwrap()
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://\S+|\bwww\.\S+").unwrap());

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").unwrap()
});

static SALUTATION_LINE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?mi)^(?:{})[\s,.\-]*", salutation_alternation())).unwrap()
});

static MULTI_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

static MULTI_NEWLINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalize a raw email body into clean text.
///
/// Never fails: the worst case is an empty string.
#[must_use]
pub fn clean(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut text = if html::looks_like_html(raw) {
        html::to_text(raw)
    } else {
        raw.to_string()
    };

    text = REPLY_HEADER_ANYWHERE.replace_all(&text, "\n").into_owned();

    if let Some(idx) = signature_index(&text) {
        text.truncate(idx);
    }

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = REPLY_HEADER.replace_all(&text, "\n");
    let text = FORWARD_HEADER.replace_all(&text, "\n");
    let text = ORIGINAL_MESSAGE.replace_all(&text, "\n");

    let text = filter_lines(&text);

    let text = URL_REGEX.replace_all(&text, " ");
    let text = EMAIL_REGEX.replace_all(&text, " ");
    let text = SALUTATION_LINE_START.replace_all(&text, " ");

    let text = MULTI_WS.replace_all(&text, " ");
    let text = trim_non_alphanumeric(text.trim());
    let text = MULTI_NEWLINES.replace_all(text, "\n\n");
    text.trim().to_string()
}

/// Byte offset where the signature starts: the earliest of a salutation cue
/// and a delimiter.
fn signature_index(text: &str) -> Option<usize> {
    let salutation = SIGNATURE_ANYWHERE.find(text).map(|m| m.start());
    let delimiter = SIGNATURE_DELIMITERS
        .iter()
        .filter_map(|d| text.find(d))
        .min();

    match (salutation, delimiter) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn filter_lines(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !QUOTE_LINE.is_match(line)
                && !DELIMITER_LINE.is_match(line)
                && !HEADER_LIKE.is_match(line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn trim_non_alphanumeric(s: &str) -> &str {
    s.trim_matches(|c: char| !c.is_alphanumeric())
}
