//! CSS-selector extraction for HTML pages.
//!
//! Defaults target the Poetry Foundation layout: the poem-of-the-day page
//! links to the poem page, where the title is `h4.type-gamma`, the author is
//! the last `span` inside `div.type-kappa`, and the body is `div.rich-text`.

use crate::config::HtmlSelectors;
use crate::error::{ConfigError, PipelineError};
use crate::models::{BodyMarkup, RawFields, SourceDocument};
use crate::utils::clean_inline;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug)]
pub struct HtmlExtractor {
    link: Option<Selector>,
    title: Selector,
    author: Selector,
    author_inner: Option<Selector>,
    body: Selector,
}

fn parse_selector(field: &'static str, raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|e| ConfigError::Selector {
        field,
        reason: e.to_string(),
    })
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_inline(&element.text().collect::<String>())
}

impl HtmlExtractor {
    pub fn new(selectors: &HtmlSelectors) -> Result<Self, ConfigError> {
        Ok(Self {
            link: selectors
                .link
                .as_deref()
                .map(|s| parse_selector("link", s))
                .transpose()?,
            title: parse_selector("title", &selectors.title)?,
            author: parse_selector("author", &selectors.author)?,
            author_inner: selectors
                .author_inner
                .as_deref()
                .map(|s| parse_selector("author_inner", s))
                .transpose()?,
            body: parse_selector("body", &selectors.body)?,
        })
    }

    /// Find the poem link on an index page and resolve it against the page URL.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Extraction`] if the link node is missing, has no
    /// `href`, or the `href` cannot be resolved.
    #[instrument(level = "debug", skip_all, fields(url = %doc.url))]
    pub fn poem_link(&self, doc: &SourceDocument) -> Result<Option<String>, PipelineError> {
        let Some(link) = &self.link else {
            return Ok(None);
        };
        let not_found = || PipelineError::Extraction("poem link not found".to_string());

        let document = Html::parse_document(&doc.body);
        let href = document
            .select(link)
            .next()
            .and_then(|el| el.value().attr("href"))
            .ok_or_else(not_found)?;

        let resolved = Url::parse(&doc.url)
            .and_then(|base| base.join(href))
            .map_err(|_| not_found())?;
        debug!(%resolved, "Resolved poem link");
        Ok(Some(resolved.to_string()))
    }

    pub fn extract(&self, doc: &SourceDocument) -> Result<RawFields, PipelineError> {
        let document = Html::parse_document(&doc.body);

        let title = document.select(&self.title).next().and_then(element_text);

        let author = document.select(&self.author).next().and_then(|node| {
            let inner = self
                .author_inner
                .as_ref()
                .and_then(|inner| node.select(inner).last());
            element_text(inner.unwrap_or(node))
        });

        let body = document
            .select(&self.body)
            .next()
            .ok_or_else(|| PipelineError::Extraction("body not found".to_string()))?;

        Ok(RawFields {
            title,
            author,
            body: BodyMarkup::Html(body.inner_html()),
        })
    }
}
