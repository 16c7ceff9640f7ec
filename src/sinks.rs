//! Chat transports.
//!
//! The dispatcher only needs "send this text to that destination". Two
//! transports are provided:
//!
//! - [`WebhookSink`]: posts `{"content": ...}` to an incoming-webhook URL
//!   per destination name (Discord and Slack-compatible endpoints accept this)
//! - [`StdoutSink`]: prints messages, for `--dry-run` and local previews

use crate::error::{ConfigError, SendError};
use crate::utils::truncate_for_log;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;
use tracing::{debug, instrument};

/// A destination-addressed text transport.
pub trait ChatSink {
    /// Send one message. Text length is the caller's responsibility.
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Posts messages to incoming webhooks, one URL per destination name.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: Client,
    webhooks: BTreeMap<String, String>,
}

impl WebhookSink {
    pub fn new(webhooks: BTreeMap<String, String>, timeout: Duration) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ConfigError::Client)?;
        Ok(Self { http, webhooks })
    }
}

impl ChatSink for WebhookSink {
    #[instrument(level = "debug", skip(self, text), fields(len = text.len()))]
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError> {
        let url = self
            .webhooks
            .get(destination)
            .ok_or_else(|| SendError::UnknownDestination(destination.to_string()))?;

        let response = self
            .http
            .post(url)
            .json(&WebhookPayload { content: text })
            .send()
            .await
            .map_err(SendError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Rejected(status.as_u16()));
        }
        debug!(preview = %truncate_for_log(text, 60), "Message posted");
        Ok(())
    }
}

/// Prints each message to stdout, prefixed with its destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl ChatSink for StdoutSink {
    async fn send(&self, destination: &str, text: &str) -> Result<(), SendError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "--- [{}] ---", destination)?;
        writeln!(handle, "{}", text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn sink_for(server: &MockServer) -> WebhookSink {
        let webhooks = BTreeMap::from([(
            "poems".to_string(),
            format!("{}/hooks/poems", server.uri()),
        )]);
        WebhookSink::new(webhooks, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_posts_content() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/poems"))
            .and(body_json(serde_json::json!({"content": "**Ode** by *Jane Doe*"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = sink_for(&mock_server).await;
        sink.send("poems", "**Ode** by *Jane Doe*").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_unknown_destination() {
        let mock_server = MockServer::start().await;
        let sink = sink_for(&mock_server).await;
        let err = sink.send("general", "hi").await.unwrap_err();
        assert!(matches!(err, SendError::UnknownDestination(ref d) if d == "general"));
    }

    #[tokio::test]
    async fn test_webhook_rejected_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let sink = sink_for(&mock_server).await;
        let err = sink.send("poems", "hi").await.unwrap_err();
        assert!(matches!(err, SendError::Rejected(429)));
    }

    #[tokio::test]
    async fn test_stdout_sink_succeeds() {
        StdoutSink.send("poems", "hello").await.unwrap();
    }
}
