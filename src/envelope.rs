//! MIME envelope decoding backed by `mailparse`

use mailparse::{DispositionType, MailAddr, MailAddrList, MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ParseError, Result};

/// Decoded representation of a raw message
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    /// Top-level headers in message order, values already RFC 2047 decoded
    pub headers: Vec<(String, String)>,

    /// First `text/plain` part
    pub text: String,

    /// First `text/html` part
    pub html: String,

    pub attachments: Vec<Attachment>,

    /// Address headers parsed from their raw form, in message order.
    /// `None` marks a header whose list could not be parsed.
    pub address_lists: Vec<(String, Option<Vec<String>>)>,
}

const ADDRESS_HEADERS: &[&str] = &["From", "Sender", "To"];

/// Descriptor of a non-body MIME part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: Option<String>,
    pub size: usize,
    pub content_type: String,
}

impl Envelope {
    /// Decode raw message bytes. Fails only on structurally malformed input.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| ParseError::Decode(e.to_string()))?;

        let headers = parsed
            .headers
            .iter()
            .map(|h| (h.get_key(), h.get_value()))
            .collect();

        // Encoded display names may decode to text containing commas, so the
        // lists are parsed before decoding.
        let address_lists = parsed
            .headers
            .iter()
            .filter_map(|h| {
                let key = h.get_key();
                ADDRESS_HEADERS
                    .iter()
                    .any(|name| key.eq_ignore_ascii_case(name))
                    .then(|| {
                        let list = mailparse::addrparse_header(h).ok().map(|l| bare_addresses(&l));
                        (key, list)
                    })
            })
            .collect();

        let mut envelope = Self {
            headers,
            address_lists,
            ..Self::default()
        };

        if parsed.subparts.is_empty() {
            envelope.take_leaf(&parsed);
        } else {
            envelope.walk(&parsed);
        }

        Ok(envelope)
    }

    /// First value of a header, compared case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in message order
    #[must_use]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Addresses of the first parseable occurrence of an address header
    #[must_use]
    pub fn first_address_list(&self, name: &str) -> Option<&[String]> {
        self.address_lists
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .find_map(|(_, list)| list.as_deref())
    }

    /// Addresses across every parseable occurrence of an address header
    #[must_use]
    pub fn all_addresses(&self, name: &str) -> Vec<String> {
        self.address_lists
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .filter_map(|(_, list)| list.as_ref())
            .flatten()
            .cloned()
            .collect()
    }

    /// Lower-cased header names mapped to their values joined with `", "`
    #[must_use]
    pub fn flattened_headers(&self) -> BTreeMap<String, String> {
        let mut out: BTreeMap<String, String> = BTreeMap::new();
        for (key, value) in &self.headers {
            out.entry(key.to_lowercase())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(value);
                })
                .or_insert_with(|| value.clone());
        }
        out
    }

    fn walk(&mut self, parsed: &ParsedMail) {
        for part in &parsed.subparts {
            if part.subparts.is_empty() {
                self.take_leaf(part);
            } else {
                self.walk(part);
            }
        }
    }

    fn take_leaf(&mut self, part: &ParsedMail) {
        let content_type = part.ctype.mimetype.to_lowercase();
        let disposition = part.get_content_disposition();

        let is_attachment = disposition.disposition == DispositionType::Attachment
            || !content_type.starts_with("text/");

        if is_attachment {
            let filename = disposition
                .params
                .get("filename")
                .or_else(|| part.ctype.params.get("name"))
                .cloned()
                .or_else(|| part.headers.get_first_value("Content-Description"));
            let size = part.get_body_raw().map(|b| b.len()).unwrap_or_default();

            self.attachments.push(Attachment {
                filename,
                size,
                content_type,
            });
            return;
        }

        let Ok(body) = part.get_body() else {
            return;
        };

        if content_type.contains("text/html") {
            if self.html.is_empty() {
                self.html = body;
            }
        } else if self.text.is_empty() {
            self.text = body;
        }
    }
}

/// Bare addresses of a parsed list, group members included
fn bare_addresses(list: &MailAddrList) -> Vec<String> {
    list.iter()
        .flat_map(|addr| match addr {
            MailAddr::Single(info) => vec![info.addr.clone()],
            MailAddr::Group(group) => group.addrs.iter().map(|i| i.addr.clone()).collect(),
        })
        .filter(|addr| !addr.is_empty())
        .collect()
}
