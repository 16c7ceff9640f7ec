//! YAML configuration.
//!
//! Every section has defaults that reproduce the original deployment (Poetry
//! Foundation poem of the day, delivered at 06:05 America/New_York), so an
//! empty file, or no file at all, is a valid configuration. A typical file
//! only names destinations:
//!
//! ```yaml
//! destinations:
//!   poems: https://discord.com/api/webhooks/123/abc
//! delivery:
//!   default_destination: poems
//! ```
//!
//! Selectors, patterns, timezones and job times are validated when the
//! pipeline components are built at startup, not here.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Default User-Agent sent with upstream requests
pub const DEFAULT_USER_AGENT: &str = concat!("daily_verse/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub delivery: DeliveryConfig,
    /// Destination name to incoming-webhook URL.
    pub destinations: BTreeMap<String, String>,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    #[instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(
            endpoint = %config.source.endpoint,
            destinations = config.destinations.len(),
            jobs = config.schedule.jobs.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from a YAML string. Missing keys take defaults.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

/// Where the poem comes from and how to read it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub extractor: ExtractorConfig,
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.poetryfoundation.org/poems/poem-of-the-day".to_string(),
            timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Extraction strategy, selected by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractorConfig {
    Html(HtmlSelectors),
    Json(JsonFields),
    Regex(PatternSet),
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig::Html(HtmlSelectors::default())
    }
}

/// CSS selectors for the HTML strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HtmlSelectors {
    /// Anchor to follow from the endpoint page to the poem page.
    pub link: Option<String>,
    pub title: String,
    pub author: String,
    /// Elements inside the author node; the last match holds the name.
    pub author_inner: Option<String>,
    pub body: String,
}

impl Default for HtmlSelectors {
    fn default() -> Self {
        Self {
            link: Some(r#"a[href^="/poetrymagazine/poems/"]"#.to_string()),
            title: "h4.type-gamma".to_string(),
            author: "div.type-kappa".to_string(),
            author_inner: Some("span".to_string()),
            body: "div.rich-text".to_string(),
        }
    }
}

/// Field lookups for the JSON strategy.
///
/// `collection` is a JSON pointer (RFC 6901) to the poem object, e.g. `/0`
/// for a top-level array. The other fields are keys inside that object.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JsonFields {
    pub collection: Option<String>,
    pub title: String,
    pub author: String,
    pub lines: String,
}

impl Default for JsonFields {
    fn default() -> Self {
        Self {
            collection: Some("/0".to_string()),
            title: "title".to_string(),
            author: "author".to_string(),
            lines: "lines".to_string(),
        }
    }
}

/// Regular expressions for the regex strategy. Capture group 1 is the value.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternSet {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    pub body: String,
}

/// How poems are delivered.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Destination used when a trigger does not name one.
    pub default_destination: String,
    /// Platform message-size limit, in characters.
    pub max_message_len: NonZeroUsize,
    /// Delay between consecutive messages of one delivery.
    pub pacing_ms: u64,
    /// Sent instead of the poem when the pipeline fails.
    pub apology: String,
    pub include_source_url: bool,
}

impl DeliveryConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_destination: "poems".to_string(),
            max_message_len: NonZeroUsize::new(1900).unwrap_or(NonZeroUsize::MIN),
            pacing_ms: 1000,
            apology: "An error occurred while fetching the poem.".to_string(),
            include_source_url: true,
        }
    }
}

/// Daily jobs, evaluated in a named timezone.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: String,
    pub jobs: Vec<JobConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            jobs: vec![JobConfig {
                at: Some("06:05".to_string()),
                cron: None,
                destination: None,
            }],
        }
    }
}

/// One scheduled delivery. Give either `at` or `cron`; `cron` wins if both
/// are set.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Daily wall-clock time as `HH:MM`.
    #[serde(default)]
    pub at: Option<String>,
    /// Cron expression, five fields (`30 7 * * MON-FRI`) or the six/seven
    /// field form with seconds.
    #[serde(default)]
    pub cron: Option<String>,
    /// Overrides the default destination for this job.
    #[serde(default)]
    pub destination: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(
            config.source.endpoint,
            "https://www.poetryfoundation.org/poems/poem-of-the-day"
        );
        assert_eq!(config.delivery.max_message_len.get(), 1900);
        assert_eq!(config.schedule.timezone, "America/New_York");
        assert_eq!(config.schedule.jobs.len(), 1);
        assert_eq!(config.schedule.jobs[0].at.as_deref(), Some("06:05"));
        assert!(matches!(config.source.extractor, ExtractorConfig::Html(ref s) if s.link.is_some()));
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml(
            r#"
destinations:
  poems: https://chat.example.com/hooks/1
delivery:
  pacing_ms: 250
"#,
        )
        .unwrap();
        assert_eq!(
            config.destinations.get("poems").map(String::as_str),
            Some("https://chat.example.com/hooks/1")
        );
        assert_eq!(config.delivery.pacing(), Duration::from_millis(250));
        assert_eq!(config.delivery.default_destination, "poems");
        assert_eq!(config.source.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_json_extractor_config() {
        let config = Config::from_yaml(
            r#"
source:
  endpoint: https://poetrydb.org/random
  extractor:
    kind: json
    lines: verses
"#,
        )
        .unwrap();
        match config.source.extractor {
            ExtractorConfig::Json(fields) => {
                assert_eq!(fields.collection.as_deref(), Some("/0"));
                assert_eq!(fields.title, "title");
                assert_eq!(fields.lines, "verses");
            }
            other => panic!("expected json extractor, got {other:?}"),
        }
    }

    #[test]
    fn test_schedule_jobs_yaml() {
        let config = Config::from_yaml(
            r#"
schedule:
  timezone: Europe/London
  jobs:
    - at: "07:00"
    - cron: "30 7 * * MON-FRI"
      destination: general
"#,
        )
        .unwrap();
        let jobs = &config.schedule.jobs;
        assert_eq!(config.schedule.timezone, "Europe/London");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].at.as_deref(), Some("07:00"));
        assert!(jobs[0].cron.is_none());
        assert_eq!(jobs[1].cron.as_deref(), Some("30 7 * * MON-FRI"));
        assert_eq!(jobs[1].destination.as_deref(), Some("general"));
    }

    #[test]
    fn test_regex_extractor_requires_body() {
        let result = Config::from_yaml(
            r#"
source:
  extractor:
    kind: regex
    title: "<h1>(.*?)</h1>"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_zero_message_len_is_rejected() {
        let result = Config::from_yaml("delivery:\n  max_message_len: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/daily_verse.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
