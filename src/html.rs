//! HTML detection and HTML-to-text conversion.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "table", "tr", "td", "th", "header", "footer", "section",
    "article", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "template", "noscript"];

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static HORIZONTAL_WS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());

static MULTI_WS_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Heuristic check for HTML content.
#[must_use]
pub fn looks_like_html(s: &str) -> bool {
    let lower = s.to_lowercase();
    ["<html", "<body", "<div", "<span", "<p", "&nbsp;"]
        .iter()
        .any(|marker| lower.contains(marker))
        || (s.contains('<') && s.contains('>'))
}

/// Convert HTML to text, falling back to a blunt tag strip when the
/// structural walk produces nothing.
#[must_use]
pub fn to_text(html: &str) -> String {
    let text = structural_text(html);
    if text.is_empty() {
        strip_tags(html)
    } else {
        text
    }
}

/// Remove every tag, including ones spanning line breaks, and collapse whitespace.
#[must_use]
pub fn strip_tags(html: &str) -> String {
    let out = TAG_REGEX.replace_all(html, " ");
    let out = MULTI_WS_REGEX.replace_all(&out, " ");
    out.trim()
        .lines()
        .map(blank_angle_brackets)
        .collect::<Vec<_>>()
        .join("\n")
}

enum Step<'a> {
    Open(ElementRef<'a>),
    Close(bool),
    Text(&'a str),
}

fn structural_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    let mut stack = vec![Step::Open(document.root_element())];

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => push_inline(&mut out, text),
            Step::Close(block) => {
                if block {
                    push_break(&mut out);
                }
            }
            Step::Open(element) => {
                let name = element.value().name().to_ascii_lowercase();
                if SKIPPED_TAGS.contains(&name.as_str()) {
                    continue;
                }

                let block = BLOCK_TAGS.contains(&name.as_str());
                if block {
                    push_break(&mut out);
                }
                stack.push(Step::Close(block));

                let children: Vec<_> = element.children().collect();
                for child in children.into_iter().rev() {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        stack.push(Step::Open(child_element));
                    } else if let Some(text) = child.value().as_text() {
                        stack.push(Step::Text(&**text));
                    }
                }
            }
        }
    }

    collapse(&out)
}

fn push_inline(out: &mut String, text: &str) {
    let text = text.replace('\u{a0}', " ");
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if let Some(last) = out.chars().last()
        && last != '\n'
        && last != ' '
    {
        out.push(' ');
    }
    out.push_str(text);
}

fn push_break(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn collapse(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for line in text.lines() {
        let line = HORIZONTAL_WS_REGEX.replace_all(line, " ");
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(blank_angle_brackets(line));
    }

    lines.join("\n").trim().to_string()
}

/// Decoded `&lt;`/`&gt;` must not survive as markup-looking text. A leading
/// `>` is kept because it marks a quoted line.
fn blank_angle_brackets(line: &str) -> String {
    let (quote, rest) = if line.starts_with('>') {
        let end = line
            .find(|c: char| c != '>' && !c.is_whitespace())
            .unwrap_or(line.len());
        line.split_at(end)
    } else {
        ("", line)
    };

    if !rest.contains(['<', '>']) {
        return line.to_string();
    }

    let cleaned: String = rest
        .chars()
        .map(|c| if c == '<' || c == '>' { ' ' } else { c })
        .collect();
    format!("{quote}{}", cleaned.trim_end())
}
