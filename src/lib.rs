// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

//! Email normalization and ingestion
//!
//! Turns raw RFC 5322 messages into normalized, language-tagged entities and
//! persists them, one at a time or in bounded-concurrency batches.
//!
//! # Features
//!
//! - Body normalization: HTML to text, quoted replies, signatures, URLs
//! - Language tagging (`en`, `de`, `ru`)
//! - Per-item timeouts and failure isolation in batches
//! - Pluggable repository with an optional cache-aside layer
//!
//! # Example
//!
//! ```rust
//! use mail_normalize::{clean, parse_email};
//!
//! let raw = b"From: anna@example.com\r\nSubject: Hello\r\n\r\nThe build is green.\r\n\r\nBest regards,\r\nAnna";
//! let email = parse_email(raw).unwrap();
//!
//! assert_eq!(email.from, "anna@example.com");
//! assert_eq!(email.text, "The build is green");
//! assert_eq!(clean("<p>Hello <b>there</b></p>"), "Hello there");
//! ```

mod batch;
mod builder;
mod config;
mod envelope;
mod error;
mod html;
mod language;
mod logging;
mod normalize;
mod repository;
mod service;
mod types;

pub use batch::{BatchOptions, BatchSupervisor, DEFAULT_ITEM_TIMEOUT, DEFAULT_MAX_WORKERS, MAX_WORKERS_LIMIT};
pub use builder::{DEFAULT_HTML_TO_TEXT_LIMIT, EmailParser, EntityBuilder, ParserOptions, parse_email};
pub use config::{BatchConfig, CacheConfig, Config, LoggerConfig, ParserConfig, parse_duration};
pub use envelope::{Attachment, Envelope};
pub use error::{ConfigError, ParseError, RepoError, Result};
pub use html::{looks_like_html, strip_tags, to_text as html_to_text};
pub use language::{Detection, LanguageDetector, ScriptDetector};
pub use logging::init_tracing;
pub use normalize::{SALUTATIONS, clean};
pub use repository::{CachedRepository, DEFAULT_LIST_LIMIT, EmailRepository, MemoryRepository};
pub use service::{DEFAULT_PAGE_SIZE, EmailService};
pub use types::*;
