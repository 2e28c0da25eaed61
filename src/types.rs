//! Core types for parsed emails and batch results

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parsed email, ready to be handed to the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailEntity {
    /// Identifier generated for this parse
    pub id: String,

    /// Message-ID without angle brackets (dedup key in storage)
    pub message_id: MessageId,

    /// Sender address
    pub from: String,

    /// Recipients from every `To` header, in header order
    pub to: Vec<String>,

    /// Decoded subject line
    pub subject: String,

    /// Date header, if it could be parsed
    pub date: Option<DateTime<Utc>>,

    /// Normalized body text
    pub text: String,

    /// Raw HTML body (only when HTML retention is enabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,

    /// ISO 639-1 language code of `text`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Classifier confidence for `language`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_confidence: Option<f64>,

    /// Counters derived from `text` and the decoded envelope
    pub metrics: Metrics,

    /// Lower-cased header name to joined values
    pub headers: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,

    /// Size of the raw message in bytes
    pub raw_size: usize,
}

/// Message ID wrapper type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build from a raw header value, stripping `<`, `>` and whitespace.
    /// Falls back to a generated id when nothing is left.
    #[must_use]
    pub fn from_header(raw: Option<&str>) -> Self {
        let stripped = raw
            .map(|v| v.trim_matches(|c: char| c == '<' || c == '>' || c.is_whitespace()))
            .unwrap_or_default();

        if stripped.is_empty() {
            Self::generate()
        } else {
            Self::new(stripped)
        }
    }

    /// Generate a fresh unique message ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Counters computed from the cleaned body and the decoded envelope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Unicode scalar values in the cleaned text
    pub char_count: usize,

    /// Whitespace-separated tokens
    pub word_count: usize,

    /// Lines in the cleaned text (0 when empty)
    pub line_count: usize,

    /// Subject length in characters
    pub subject_len: usize,

    /// Number of distinct header names
    #[serde(rename = "headers_size")]
    pub header_count: usize,

    /// Number of attachments
    #[serde(rename = "attachments")]
    pub attachment_count: usize,
}

impl Metrics {
    /// Compute metrics for a cleaned body.
    #[must_use]
    pub fn compute(text: &str, subject: &str, header_count: usize, attachment_count: usize) -> Self {
        let line_count = if text.is_empty() {
            0
        } else {
            text.matches('\n').count() + 1
        };

        Self {
            char_count: text.chars().count(),
            word_count: text.split_whitespace().count(),
            line_count,
            subject_len: subject.chars().count(),
            header_count,
            attachment_count,
        }
    }
}

/// Outcome of a single batch item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Ok,
    Error,
}

/// Result slot for one input of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// Position of the item in the original input
    pub index: usize,

    pub status: BatchStatus,

    /// Id of the persisted entity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,

    /// Human-readable failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_ms: u64,
}

impl BatchItemResult {
    #[must_use]
    pub fn succeeded(index: usize, email_id: String, duration: Duration) -> Self {
        Self {
            index,
            status: BatchStatus::Ok,
            email_id: Some(email_id),
            error: None,
            duration_ms: millis(duration),
        }
    }

    #[must_use]
    pub fn failed(index: usize, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            index,
            status: BatchStatus::Error,
            email_id: None,
            error: Some(error.into()),
            duration_ms: millis(duration),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == BatchStatus::Ok
    }
}

/// Aggregated outcome of a batch call, ordered by input index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

impl BatchResult {
    /// Build the aggregate from index-ordered slots.
    #[must_use]
    pub fn from_results(results: Vec<BatchItemResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        Self {
            processed: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
