//! Data models that flow through the poem pipeline.
//!
//! - [`SourceDocument`]: raw upstream response, discarded after extraction
//! - [`RawFields`]: title/author/body as located in the document, not yet cleaned
//! - [`BodyMarkup`]: the unresolved body, either markup or pre-split lines
//! - [`PoemRecord`]: the normalized, immutable result that gets cached

use serde::Serialize;

/// Title used when the source has no title node.
pub const UNTITLED: &str = "Untitled";
/// Author used when the source has no author node.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Shape of an upstream response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Html,
    Json,
}

impl DocumentKind {
    /// Guess the document kind from a `Content-Type` header value.
    ///
    /// Anything that does not announce JSON is treated as HTML.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("json") => DocumentKind::Json,
            _ => DocumentKind::Html,
        }
    }
}

/// A raw upstream response.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// The URL the document was fetched from.
    pub url: String,
    /// HTML or JSON, from the response's content type.
    pub kind: DocumentKind,
    /// The response body as text.
    pub body: String,
}

/// Unresolved poem body as located by an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyMarkup {
    /// Inner HTML of the body container.
    Html(String),
    /// Lines as delivered by a JSON source; each entry is one logical line.
    Lines(Vec<String>),
    /// A single joined string with `\n` separators.
    Text(String),
}

/// Fields located by an extractor. Optional fields fall back to sentinels
/// during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFields {
    pub title: Option<String>,
    pub author: Option<String>,
    pub body: BodyMarkup,
}

/// A normalized poem, ready for chunking and delivery.
///
/// `body_lines` is never empty: a record is only built after normalization
/// produced at least one line. Blank entries are stanza breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoemRecord {
    pub title: String,
    pub author: String,
    pub body_lines: Vec<String>,
    pub source_url: Option<String>,
}

impl PoemRecord {
    /// The body as one string, lines joined with `\n`.
    pub fn body_text(&self) -> String {
        self.body_lines.join("\n")
    }

    /// The intro message sent ahead of the body.
    ///
    /// `**{title}** by *{author}*`, with the source URL on a second line in
    /// angle brackets when `with_url` is set and a URL is known.
    pub fn intro(&self, with_url: bool) -> String {
        let mut intro = format!("**{}** by *{}*", self.title, self.author);
        if with_url {
            if let Some(url) = &self.source_url {
                intro.push_str(&format!("\n<{}>", url));
            }
        }
        intro
    }
}
