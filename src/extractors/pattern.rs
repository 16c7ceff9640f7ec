//! Regular-expression scraping for pages whose markup defeats selectors.
//!
//! Each pattern is matched against the raw body; capture group 1 is the
//! value. Title and author captures are reduced to their text content, the
//! body capture is handed on as an HTML fragment.

use crate::config::PatternSet;
use crate::error::{ConfigError, PipelineError};
use crate::models::{BodyMarkup, RawFields, SourceDocument};
use crate::utils::clean_inline;
use regex::Regex;
use scraper::Html;

#[derive(Debug)]
pub struct PatternExtractor {
    title: Option<Regex>,
    author: Option<Regex>,
    body: Regex,
}

fn compile(field: &'static str, raw: &str) -> Result<Regex, ConfigError> {
    Regex::new(raw).map_err(|source| ConfigError::Pattern { field, source })
}

fn capture<'h>(pattern: &Regex, haystack: &'h str) -> Option<&'h str> {
    pattern
        .captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Text content of a markup snippet, with entities decoded.
fn fragment_text(snippet: &str) -> Option<String> {
    let fragment = Html::parse_fragment(snippet);
    clean_inline(&fragment.root_element().text().collect::<String>())
}

impl PatternExtractor {
    pub fn new(patterns: &PatternSet) -> Result<Self, ConfigError> {
        Ok(Self {
            title: patterns
                .title
                .as_deref()
                .map(|p| compile("title", p))
                .transpose()?,
            author: patterns
                .author
                .as_deref()
                .map(|p| compile("author", p))
                .transpose()?,
            body: compile("body", &patterns.body)?,
        })
    }

    pub fn extract(&self, doc: &SourceDocument) -> Result<RawFields, PipelineError> {
        let field = |pattern: &Option<Regex>| {
            pattern
                .as_ref()
                .and_then(|p| capture(p, &doc.body))
                .and_then(fragment_text)
        };

        let body = capture(&self.body, &doc.body)
            .ok_or_else(|| PipelineError::Extraction("body not found".to_string()))?;

        Ok(RawFields {
            title: field(&self.title),
            author: field(&self.author),
            body: BodyMarkup::Html(body.to_string()),
        })
    }
}
