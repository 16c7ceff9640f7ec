//! Delivery of the day's poem to a chat destination.
//!
//! The dispatcher is the only place pipeline failures are turned into a
//! user-facing message. A delivery is either the intro plus every body chunk,
//! in order, or the single apology message. Nothing here returns an error:
//! a missed poem is logged, never fatal.

use crate::cache::DailyCache;
use crate::chunker::chunk;
use crate::config::DeliveryConfig;
use crate::error::PipelineError;
use crate::models::PoemRecord;
use crate::sinks::ChatSink;
use crate::source::PoemSource;
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// What a delivery ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Intro and all chunks were sent.
    Delivered { messages: usize },
    /// The pipeline failed and the apology was sent instead.
    Apologized { cause: PipelineError },
    /// The chat transport failed; `sent` messages went out before it did.
    SendFailed { sent: usize, planned: usize },
}

pub struct Dispatcher<S, P> {
    sink: S,
    source: P,
    cache: Arc<DailyCache>,
    settings: DeliveryConfig,
}

impl<S, P> Dispatcher<S, P>
where
    S: ChatSink,
    P: PoemSource,
{
    pub fn new(sink: S, source: P, cache: Arc<DailyCache>, settings: DeliveryConfig) -> Self {
        Self {
            sink,
            source,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &DailyCache {
        &self.cache
    }

    pub fn source(&self) -> &P {
        &self.source
    }

    pub fn settings(&self) -> &DeliveryConfig {
        &self.settings
    }

    /// Deliver today's poem. `None` sends to the configured default
    /// destination; scheduled jobs use that, manual triggers name one.
    pub async fn deliver(&self, destination: Option<&str>) -> DeliveryOutcome {
        self.deliver_on(Local::now().date_naive(), destination).await
    }

    /// Deliver the poem cached under `date`, fetching it on first use.
    #[instrument(level = "info", skip_all, fields(%date, destination = tracing::field::Empty))]
    pub async fn deliver_on(&self, date: NaiveDate, destination: Option<&str>) -> DeliveryOutcome {
        let destination = destination.unwrap_or(&self.settings.default_destination);
        tracing::Span::current().record("destination", destination);

        let entry = self
            .cache
            .get_or_fetch(date, || self.source.fetch_poem())
            .await;

        match entry {
            Ok(poem) => {
                let messages = compose(&poem, &self.settings);
                let planned = messages.len();
                match self.send_all(destination, &messages).await {
                    Ok(()) => {
                        info!(messages = planned, title = %poem.title, "Poem delivered");
                        DeliveryOutcome::Delivered { messages: planned }
                    }
                    Err(sent) => DeliveryOutcome::SendFailed { sent, planned },
                }
            }
            Err(cause) => {
                log_failure(&cause);
                let apology = [self.settings.apology.clone()];
                match self.send_all(destination, &apology).await {
                    Ok(()) => DeliveryOutcome::Apologized { cause },
                    Err(sent) => DeliveryOutcome::SendFailed { sent, planned: 1 },
                }
            }
        }
    }

    /// Send messages in order with the pacing delay between them.
    ///
    /// Stops at the first transport error and returns how many were sent.
    async fn send_all(&self, destination: &str, messages: &[String]) -> Result<(), usize> {
        for (i, message) in messages.iter().enumerate() {
            if i > 0 {
                sleep(self.settings.pacing()).await;
            }
            if let Err(e) = self.sink.send(destination, message).await {
                error!(
                    error = %e,
                    sent = i,
                    planned = messages.len(),
                    "Chat send failed; abandoning delivery"
                );
                return Err(i);
            }
        }
        Ok(())
    }
}

/// Intro line followed by the body, both split to the platform limit.
pub fn compose(poem: &PoemRecord, settings: &DeliveryConfig) -> Vec<String> {
    let limit = settings.max_message_len;
    let mut messages = chunk(&poem.intro(settings.include_source_url), limit);
    messages.extend(chunk(&poem.body_text(), limit));
    messages
}

fn log_failure(cause: &PipelineError) {
    match cause {
        PipelineError::Extraction(reason) => {
            error!(%reason, "Upstream page layout changed; poem could not be extracted")
        }
        PipelineError::Network(_) | PipelineError::Timeout(_) => {
            warn!(error = %cause, "Failed to fetch poem")
        }
        PipelineError::EmptyBody => warn!("Poem body was empty after normalization"),
    }
}
