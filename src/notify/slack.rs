//! Slack notification support via Incoming Webhooks.

use std::time::Duration;

use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::poll::retry;

const SEND_ATTEMPTS: u32 = 3;
const SEND_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Structured Slack message for Block Kit rendering.
#[derive(Debug, Clone)]
pub struct SlackMessage {
    pub header: String,
    pub fields: Vec<(String, String)>,
    pub context: String,
}

/// Slack webhook client.
pub struct SlackNotifier {
    webhook_url: SecretString,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: SecretString) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Send a Block Kit message to Slack. Errors are logged but not propagated.
    pub async fn send(&self, cluster: &str, message: &SlackMessage) {
        let payload = build_blocks_payload(message);
        let result = retry(SEND_ATTEMPTS, SEND_RETRY_INTERVAL, || self.post(&payload)).await;
        match result {
            Ok(()) => info!(
                cluster,
                header = message.header.as_str(),
                "Slack notification sent"
            ),
            Err(e) => warn!(cluster, error = %e, "Failed to send Slack notification"),
        }
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let resp = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(payload)
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Slack webhook returned {}", resp.status());
        }
        Ok(())
    }
}

/// Slack limits a section block to ten fields.
const MAX_SECTION_FIELDS: usize = 10;

/// Block Kit payload with a plain text fallback.
fn build_blocks_payload(message: &SlackMessage) -> Value {
    let header = json!({
        "type": "header",
        "text": {"type": "plain_text", "text": message.header, "emoji": true}
    });

    let fields: Vec<Value> = message
        .fields
        .iter()
        .map(|(label, value)| json!({"type": "mrkdwn", "text": format!("*{label}*\n{value}")}))
        .collect();
    let sections = fields
        .chunks(MAX_SECTION_FIELDS)
        .map(|chunk| json!({"type": "section", "fields": chunk}));

    let footer = [
        json!({"type": "divider"}),
        json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": message.context}]
        }),
    ];

    let blocks: Vec<Value> = std::iter::once(header)
        .chain(sections)
        .chain(footer)
        .collect();

    json!({
        "text": format!("{}\n{}", message.header, message.context),
        "blocks": blocks
    })
}
