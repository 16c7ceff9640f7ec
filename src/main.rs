//! # Daily Verse
//!
//! Fetches the poem of the day from a configured source, normalizes its
//! markup into plain-text lines, and posts it to chat destinations through
//! incoming webhooks.
//!
//! ## Usage
//!
//! ```sh
//! daily_verse --config verse.yaml run
//! daily_verse --dry-run deliver --to general
//! daily_verse preview
//!
//! # ask a running scheduler to refetch and redeliver today's poem
//! kill -USR2 "$(pidof daily_verse)"
//! ```
//!
//! ## Architecture
//!
//! 1. **Fetching**: download the source page, following the poem link when
//!    the endpoint is an index page
//! 2. **Extraction**: pull title, author, and body out of HTML, JSON, or text
//! 3. **Normalization**: turn body markup into lines with stanza breaks
//! 4. **Caching**: one fetch per calendar day, shared by every caller
//! 5. **Delivery**: intro plus chunked body, paced, or a single apology

use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cache;
mod chunker;
mod cli;
mod config;
mod dispatcher;
mod error;
mod extractors;
mod fetcher;
mod models;
mod normalizer;
mod scheduler;
mod sinks;
mod source;
mod utils;

use cache::DailyCache;
use cli::{Cli, Command};
use config::Config;
use config::DeliveryConfig;
use dispatcher::{DeliveryOutcome, Dispatcher, compose};
use scheduler::Schedule;
use sinks::{ChatSink, StdoutSink, WebhookSink};
use source::{Pipeline, PoemSource};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "daily_verse starting up");

    let args = Cli::parse();
    let command = args.command();
    debug!(?command, dry_run = args.dry_run, config = ?args.config, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            info!("No config file given; using built-in defaults");
            Config::default()
        }
    };
    if let Some(url) = &args.webhook_url {
        config
            .destinations
            .insert(config.delivery.default_destination.clone(), url.clone());
    }

    let pipeline = Pipeline::from_config(&config.source)?;
    // Validate the schedule up front so a bad timezone fails even for one-shot runs.
    let schedule = Schedule::from_config(&config.schedule)?;
    let cache = Arc::new(DailyCache::new());

    if args.dry_run {
        info!("Dry run; messages go to stdout");
        let dispatcher = Dispatcher::new(StdoutSink, pipeline, cache, config.delivery);
        execute(&command, &schedule, &dispatcher).await?;
    } else {
        if config.destinations.is_empty() && command != Command::Preview {
            warn!("No destinations configured; pass --webhook-url or add `destinations` to the config");
        }
        let sink = WebhookSink::new(config.destinations, config.source.timeout())?;
        let dispatcher = Dispatcher::new(sink, pipeline, cache, config.delivery);
        execute(&command, &schedule, &dispatcher).await?;
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Run one subcommand against a dispatcher with any sink.
async fn execute<S, P>(
    command: &Command,
    schedule: &Schedule,
    dispatcher: &Dispatcher<S, P>,
) -> Result<(), Box<dyn Error>>
where
    S: ChatSink,
    P: PoemSource,
{
    match command {
        Command::Run => {
            let triggers = scheduler::signal_triggers()?;
            scheduler::run(schedule, dispatcher, triggers).await;
            Ok(())
        }
        Command::Deliver { to } => {
            let outcome = dispatcher.deliver(to.as_deref()).await;
            debug!(cached_days = dispatcher.cache().len().await, "Cache state");
            match outcome {
                DeliveryOutcome::Delivered { messages } => {
                    info!(messages, "Delivery finished");
                    Ok(())
                }
                DeliveryOutcome::Apologized { cause } => {
                    warn!(error = %cause, "Delivered apology instead of poem");
                    Ok(())
                }
                DeliveryOutcome::SendFailed { sent, planned } => {
                    Err(format!("chat send failed after {sent} of {planned} messages").into())
                }
            }
        }
        Command::Preview => preview(dispatcher.source(), dispatcher.settings()).await,
    }
}

/// Fetch the poem directly, bypassing the cache, and print the messages a
/// delivery would send.
async fn preview<P: PoemSource>(source: &P, settings: &DeliveryConfig) -> Result<(), Box<dyn Error>> {
    let poem = match source.fetch_poem().await {
        Ok(poem) => poem,
        Err(e) => {
            if e.is_structural() {
                error!(error = %e, "Extraction failed; check the extractor settings against the page");
            }
            return Err(e.into());
        }
    };
    for message in compose(&poem, settings) {
        StdoutSink.send("preview", &message).await?;
    }
    Ok(())
}
