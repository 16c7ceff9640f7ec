//! Field extraction strategies.
//!
//! Each strategy locates the title, author, and body of a poem in one kind of
//! upstream document. The strategy is picked by the `source.extractor.kind`
//! config key:
//!
//! | Kind | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | `html` | [`html`] | CSS selectors | Optional `link` selector to follow an index page |
//! | `json` | [`json`] | JSON pointer + field names | Body as an array of lines or one string |
//! | `regex` | [`pattern`] | Regular expressions | Capture group 1; body treated as HTML |
//!
//! Extractors never normalize. They return the body markup as found, and
//! fail with [`PipelineError::Extraction`] when the body is missing, which
//! usually means the upstream page layout changed.

pub mod html;
pub mod json;
pub mod pattern;

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, PipelineError};
use crate::models::{DocumentKind, RawFields, SourceDocument};
use tracing::warn;

pub use html::HtmlExtractor;
pub use json::JsonExtractor;
pub use pattern::PatternExtractor;

/// A configured extraction strategy.
#[derive(Debug)]
pub enum Extractor {
    Html(HtmlExtractor),
    Json(JsonExtractor),
    Pattern(PatternExtractor),
}

impl Extractor {
    /// Build the strategy named by the config, validating its selectors or
    /// patterns up front.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Ok(match config {
            ExtractorConfig::Html(selectors) => Extractor::Html(HtmlExtractor::new(selectors)?),
            ExtractorConfig::Json(fields) => Extractor::Json(JsonExtractor::new(fields)?),
            ExtractorConfig::Regex(patterns) => {
                Extractor::Pattern(PatternExtractor::new(patterns)?)
            }
        })
    }

    /// Identifier for logging
    pub fn name(&self) -> &'static str {
        match self {
            Extractor::Html(_) => "html",
            Extractor::Json(_) => "json",
            Extractor::Pattern(_) => "regex",
        }
    }

    /// Resolve the URL of the poem page when the endpoint is an index page.
    ///
    /// Returns `Ok(None)` when the strategy reads the endpoint document
    /// directly.
    pub fn poem_link(&self, doc: &SourceDocument) -> Result<Option<String>, PipelineError> {
        match self {
            Extractor::Html(html) => html.poem_link(doc),
            Extractor::Json(_) | Extractor::Pattern(_) => Ok(None),
        }
    }

    /// Locate title, author, and body in `doc`.
    pub fn extract(&self, doc: &SourceDocument) -> Result<RawFields, PipelineError> {
        if matches!(self, Extractor::Json(_)) && doc.kind != DocumentKind::Json {
            warn!(url = %doc.url, "Source did not announce JSON; parsing anyway");
        }
        match self {
            Extractor::Html(html) => html.extract(doc),
            Extractor::Json(json) => json.extract(doc),
            Extractor::Pattern(pattern) => pattern.extract(doc),
        }
    }
}
