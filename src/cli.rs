//! Command-line interface definitions for Daily Verse.
//!
//! Flags that carry deployment secrets or paths can also be supplied through
//! environment variables.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Daily Verse application.
///
/// # Examples
///
/// ```sh
/// # Run the daily scheduler with a config file
/// daily_verse --config verse.yaml run
///
/// # Post today's poem to one destination right now
/// daily_verse --webhook-url https://discord.com/api/webhooks/... deliver
///
/// # See what would be sent without posting anything
/// daily_verse --dry-run deliver --to general
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "DAILY_VERSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Webhook URL for the default destination (overrides the config file)
    #[arg(long, env = "DAILY_VERSE_WEBHOOK")]
    pub webhook_url: Option<String>,

    /// Print messages to stdout instead of posting them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The subcommand to run; `run` when none was given.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the daily scheduler until interrupted
    ///
    /// While running, SIGUSR1 delivers today's poem to the default
    /// destination and SIGUSR2 refetches it first.
    Run,
    /// Deliver today's poem once and exit
    Deliver {
        /// Destination name (defaults to the configured default destination)
        #[arg(long)]
        to: Option<String>,
    },
    /// Fetch and print today's poem without caching or posting it
    Preview,
}
