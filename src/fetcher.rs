//! Upstream HTTP fetcher.
//!
//! One GET per call, bounded by the configured timeout. There is no retry
//! here: a failed fetch is cached for the day by [`crate::cache::DailyCache`].

use crate::config::SourceConfig;
use crate::error::{ConfigError, PipelineError};
use crate::models::{DocumentKind, SourceDocument};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone)]
pub struct Fetcher {
    http: Client,
    timeout: Duration,
}

impl Fetcher {
    /// Build a fetcher with the source's timeout and User-Agent.
    pub fn new(config: &SourceConfig) -> Result<Self, ConfigError> {
        let timeout = config.timeout();
        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self { http, timeout })
    }

    /// Fetch `url` and return its body tagged with the document kind.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Timeout`] if no complete response arrives within the timeout
    /// - [`PipelineError::Network`] on connection failure or a non-2xx status
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<SourceDocument, PipelineError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Network(format!("{} returned HTTP {}", url, status)));
        }

        let kind = DocumentKind::from_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::from_reqwest(e, self.timeout))?;

        info!(bytes = body.len(), ?kind, "Fetched source document");
        debug!(preview = %crate::utils::truncate_for_log(&body, 200), "Source body");

        Ok(SourceDocument {
            url: url.to_string(),
            kind,
            body,
        })
    }
}
