//! Body normalization: extracted markup in, display-ready lines out.
//!
//! The HTML path walks the body fragment once and turns it into a flat token
//! stream of text, line breaks, and block boundaries. Emphasis tags become
//! inline markers (`*em*`, `**strong**`, `__u__`, `~~s~~`) on the way.
//!
//! Line breaks are then resolved by run length. The source wraps each verse
//! line with a single `<br>` and separates stanzas with two or more, so:
//!
//! ```text
//! a<br>b            -> ["a", "b"]
//! a<br><br>b        -> ["a", "", "b"]
//! a<br><br><br>b    -> ["a", "", "b"]
//! ```
//!
//! Whitespace-only text between two breaks does not end a run. The edge of a
//! block element (`<p>`, `<div>`, ...) adds one break to the run, and
//! back-to-back edges (`</div><div>`) count once:
//!
//! ```text
//! <div>a</div><div>b</div>      -> ["a", "b"]
//! <div>a</div><br><div>b</div>  -> ["a", "", "b"]
//! ```
//!
//! Every path then goes through the same line cleanup: non-breaking spaces
//! become spaces, each line is trimmed, runs of blank lines collapse to one,
//! and leading/trailing blank lines are dropped.

use crate::models::BodyMarkup;
use crate::utils::{NBSP, replace_nbsp};
use itertools::Itertools;
use scraper::{ElementRef, Html, Node};

/// Result of normalizing a body.
///
/// An empty body is an expected outcome rather than an error; the caller
/// decides what to tell the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// At least one line; blank entries are stanza breaks.
    Lines(Vec<String>),
    Empty,
}

impl Normalized {
    pub fn into_lines(self) -> Option<Vec<String>> {
        match self {
            Normalized::Lines(lines) => Some(lines),
            Normalized::Empty => None,
        }
    }
}

/// Normalize any extracted body.
pub fn normalize(body: &BodyMarkup) -> Normalized {
    match body {
        BodyMarkup::Html(fragment) => normalize_html(fragment),
        BodyMarkup::Lines(lines) => normalize_lines(lines.iter().map(String::as_str)),
        BodyMarkup::Text(text) => normalize_lines(std::iter::once(text.as_str())),
    }
}

/// Normalize an HTML fragment (the inner HTML of the body container).
pub fn normalize_html(fragment: &str) -> Normalized {
    let document = Html::parse_fragment(fragment);
    let mut tokens = Vec::new();
    collect_tokens(document.root_element(), &mut tokens);
    finish(resolve_breaks(tokens))
}

/// Normalize lines that already encode line structure. Entries containing
/// `\n` are split further.
pub fn normalize_lines<'a, I>(lines: I) -> Normalized
where
    I: IntoIterator<Item = &'a str>,
{
    finish(
        lines
            .into_iter()
            .flat_map(|line| line.split('\n'))
            .map(str::to_string)
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Break,
    Block,
}

fn emphasis_marker(tag: &str) -> Option<&'static str> {
    match tag {
        "i" | "em" => Some("*"),
        "b" | "strong" => Some("**"),
        "u" | "ins" => Some("__"),
        "s" | "strike" | "del" => Some("~~"),
        _ => None,
    }
}

fn is_block(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "blockquote"
            | "section"
            | "article"
            | "ul"
            | "ol"
            | "li"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

fn collect_tokens(element: ElementRef<'_>, out: &mut Vec<Token>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text: &str = text;
                // Source newlines are layout, not content.
                let text = text.replace(['\n', '\r'], " ").replace(NBSP, " ");
                out.push(Token::Text(text));
            }
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let tag = el.name();
                if tag == "br" {
                    out.push(Token::Break);
                } else if matches!(tag, "script" | "style" | "template") {
                    continue;
                } else if let Some(marker) = emphasis_marker(tag) {
                    let mut inner = Vec::new();
                    collect_tokens(child_ref, &mut inner);
                    out.extend(wrap_emphasis(inner, marker));
                } else if is_block(tag) {
                    out.push(Token::Block);
                    collect_tokens(child_ref, out);
                    out.push(Token::Block);
                } else {
                    collect_tokens(child_ref, out);
                }
            }
            _ => {}
        }
    }
}

/// Wrap each line-sized group of text in `marker`.
///
/// Markers never span a line break, and whitespace at the edges of the group
/// stays outside them (`<em>word </em>` gives `*word* `).
fn wrap_emphasis(inner: Vec<Token>, marker: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut group = String::new();

    let flush = |group: &mut String, out: &mut Vec<Token>| {
        if group.is_empty() {
            return;
        }
        let trimmed = group.trim();
        if trimmed.is_empty() {
            out.push(Token::Text(std::mem::take(group)));
            return;
        }
        let lead = &group[..group.len() - group.trim_start().len()];
        let trail = &group[group.trim_end().len()..];
        out.push(Token::Text(format!("{lead}{marker}{trimmed}{marker}{trail}")));
        group.clear();
    };

    for token in inner {
        match token {
            Token::Text(text) => group.push_str(&text),
            other => {
                flush(&mut group, &mut out);
                out.push(other);
            }
        }
    }
    flush(&mut group, &mut out);
    out
}

/// Turn the token stream into lines, resolving break runs.
fn resolve_breaks(tokens: Vec<Token>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut breaks = 0usize;
    // set while the run ends in a block edge
    let mut at_edge = false;

    for token in tokens {
        match token {
            Token::Break => {
                breaks += 1;
                at_edge = false;
            }
            Token::Block => {
                if !at_edge {
                    breaks += 1;
                    at_edge = true;
                }
            }
            Token::Text(text) => {
                if breaks == 0 {
                    current.push_str(&text);
                    continue;
                }
                if text.trim().is_empty() {
                    continue;
                }
                lines.push(std::mem::take(&mut current));
                if breaks >= 2 {
                    lines.push(String::new());
                }
                breaks = 0;
                at_edge = false;
                current.push_str(&text);
            }
        }
    }
    lines.push(current);
    lines
}

/// Line cleanup shared by every path.
fn finish(lines: Vec<String>) -> Normalized {
    let mut cleaned: Vec<String> = lines
        .into_iter()
        .map(|line| replace_nbsp(&line).trim().to_string())
        .coalesce(|a, b| {
            if a.is_empty() && b.is_empty() {
                Ok(a)
            } else {
                Err((a, b))
            }
        })
        .skip_while(String::is_empty)
        .collect();

    let end = cleaned
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(0, |i| i + 1);
    cleaned.truncate(end);

    if cleaned.is_empty() {
        Normalized::Empty
    } else {
        Normalized::Lines(cleaned)
    }
}
