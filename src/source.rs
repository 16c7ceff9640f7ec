//! The poem source: fetch, extract, normalize.
//!
//! [`PoemSource`] is the seam the dispatcher depends on; [`Pipeline`] is the
//! real implementation built from [`SourceConfig`]. Each call makes one or
//! two upstream requests (two when the endpoint is an index page that links
//! to the poem) and no retries.

use crate::config::SourceConfig;
use crate::error::{ConfigError, PipelineError};
use crate::extractors::Extractor;
use crate::fetcher::Fetcher;
use crate::models::{PoemRecord, RawFields, UNKNOWN_AUTHOR, UNTITLED};
use crate::normalizer::normalize;
use tracing::{info, instrument};
use url::Url;

/// Something that can produce today's poem.
pub trait PoemSource {
    async fn fetch_poem(&self) -> Result<PoemRecord, PipelineError>;
}

/// Fetcher, extractor, and normalizer for one configured endpoint.
#[derive(Debug)]
pub struct Pipeline {
    endpoint: String,
    fetcher: Fetcher,
    extractor: Extractor,
}

impl Pipeline {
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        Url::parse(&config.endpoint).map_err(|_| ConfigError::Endpoint(config.endpoint.clone()))?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            fetcher: Fetcher::new(config)?,
            extractor: Extractor::from_config(&config.extractor)?,
        })
    }
}

impl PoemSource for Pipeline {
    #[instrument(level = "info", skip(self), fields(endpoint = %self.endpoint, extractor = self.extractor.name()))]
    async fn fetch_poem(&self) -> Result<PoemRecord, PipelineError> {
        let first = self.fetcher.fetch(&self.endpoint).await?;

        let (doc, source_url) = match self.extractor.poem_link(&first)? {
            Some(link) => (self.fetcher.fetch(&link).await?, Some(link)),
            None => (first, None),
        };

        let raw = self.extractor.extract(&doc)?;
        let record = build_record(raw, source_url)?;
        info!(
            title = %record.title,
            author = %record.author,
            lines = record.body_lines.len(),
            "Poem ready"
        );
        Ok(record)
    }
}

/// Normalize extracted fields into a record, filling sentinel title/author.
///
/// # Errors
///
/// [`PipelineError::EmptyBody`] when normalization leaves no lines.
pub fn build_record(raw: RawFields, source_url: Option<String>) -> Result<PoemRecord, PipelineError> {
    let body_lines = normalize(&raw.body)
        .into_lines()
        .ok_or(PipelineError::EmptyBody)?;
    Ok(PoemRecord {
        title: raw.title.unwrap_or_else(|| UNTITLED.to_string()),
        author: raw.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        body_lines,
        source_url,
    })
}
