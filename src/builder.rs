//! Entity assembly: decoded envelope + normalized body + language tag

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::Result;
use crate::language::{LanguageDetector, ScriptDetector};
use crate::normalize::clean;
use crate::types::{EmailEntity, MessageId, Metrics};

/// Default cap on the HTML body fed to the normalizer (1 MiB)
pub const DEFAULT_HTML_TO_TEXT_LIMIT: usize = 1 << 20;

/// Turns raw message bytes into an [`EmailEntity`]
pub trait EmailParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<EmailEntity>;
}

/// Options controlling entity assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Keep the raw HTML part on the entity
    pub include_html: bool,

    /// Maximum HTML bytes normalized when there is no text part
    pub html_to_text_limit: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            include_html: false,
            html_to_text_limit: DEFAULT_HTML_TO_TEXT_LIMIT,
        }
    }
}

/// Builds entities from decoded envelopes
#[derive(Clone, Default)]
pub struct EntityBuilder {
    options: ParserOptions,
    detector: Option<Arc<dyn LanguageDetector>>,
}

impl EntityBuilder {
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            detector: None,
        }
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    #[must_use]
    pub const fn options(&self) -> ParserOptions {
        self.options
    }

    /// Assemble an entity from an already decoded envelope.
    #[must_use]
    pub fn build(&self, envelope: &Envelope, raw_size: usize) -> EmailEntity {
        let headers = envelope.flattened_headers();
        let message_id = MessageId::from_header(envelope.header("Message-ID"));
        let subject = envelope.header("Subject").unwrap_or_default().to_string();
        let from = extract_from(envelope);
        let to = extract_to(envelope);
        let date = extract_date(envelope);

        let text = clean(self.select_body(envelope));

        let detection = match &self.detector {
            Some(detector) if !text.trim().is_empty() => detector.detect(&text),
            _ => None,
        };

        let metrics = Metrics::compute(
            &text,
            &subject,
            headers.len(),
            envelope.attachments.len(),
        );

        let html = (self.options.include_html && !envelope.html.is_empty())
            .then(|| envelope.html.clone());

        debug!(
            message_id = %message_id,
            words = metrics.word_count,
            language = detection.as_ref().map_or("-", |d| d.code.as_str()),
            "built email entity"
        );

        EmailEntity {
            id: Uuid::new_v4().to_string(),
            message_id,
            from,
            to,
            subject,
            date,
            text,
            html,
            language: detection.as_ref().map(|d| d.code.clone()),
            language_confidence: detection.map(|d| d.confidence),
            metrics,
            headers,
            created_at: Utc::now(),
            raw_size,
        }
    }

    /// Text part when present, otherwise the (capped) HTML part.
    fn select_body<'a>(&self, envelope: &'a Envelope) -> &'a str {
        let text = envelope.text.trim();
        if !text.is_empty() {
            return text;
        }

        let end = snap_to_char_boundary(&envelope.html, self.options.html_to_text_limit);
        &envelope.html[..end]
    }
}

impl EmailParser for EntityBuilder {
    fn parse(&self, raw: &[u8]) -> Result<EmailEntity> {
        let envelope = Envelope::decode(raw)?;
        Ok(self.build(&envelope, raw.len()))
    }
}

/// Parse raw email bytes with default options and the bundled detector
pub fn parse_email(raw: &[u8]) -> Result<EmailEntity> {
    EntityBuilder::default()
        .with_detector(Arc::new(ScriptDetector))
        .parse(raw)
}

fn extract_from(envelope: &Envelope) -> String {
    let first = |name: &str| {
        envelope
            .first_address_list(name)
            .and_then(|list| list.first().cloned())
    };

    match envelope.header("From") {
        Some(raw) => first("From").unwrap_or_else(|| raw.trim().to_string()),
        None => first("Sender").unwrap_or_default(),
    }
}

fn extract_to(envelope: &Envelope) -> Vec<String> {
    envelope.all_addresses("To")
}

/// RFC 2822 first, then the lenient `mailparse` parser. The lenient parser
/// yields the epoch for text without date parts, so only positive
/// timestamps from input carrying digits are accepted.
fn extract_date(envelope: &Envelope) -> Option<DateTime<Utc>> {
    let value = envelope.header("Date")?.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }

    if !value.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    mailparse::dateparse(value)
        .ok()
        .filter(|ts| *ts > 0)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
}

/// Snap a byte index to the nearest valid UTF-8 char boundary (backwards)
const fn snap_to_char_boundary(s: &str, idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    let mut i = idx;
    while !s.is_char_boundary(i) && i > 0 {
        i -= 1;
    }
    i
}
