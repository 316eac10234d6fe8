use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
}

/// A Discord embed block
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    /// Always serialized, even when empty
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    pub timestamp: DateTime<Utc>,
}

/// A file uploaded alongside the embed
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Everything sent to the webhook for one relayed message
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingPayload {
    pub embed: Embed,
    pub attachment: Option<Attachment>,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    embeds: [&'a Embed; 1],
}

impl OutgoingPayload {
    /// JSON body as Discord expects it (`payload_json` when uploading files)
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&WebhookBody {
            embeds: [&self.embed],
        })
        .context("Failed to serialize webhook payload")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Delivered,
    Rejected { status: StatusCode, body: String },
}

/// Executes a Discord webhook
pub struct WebhookClient {
    client: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(webhook_url: &str) -> Result<Self> {
        let mut url = Url::parse(webhook_url.trim())
            .with_context(|| format!("Invalid webhook URL: {webhook_url}"))?;
        // Discord answers 204 unless asked to wait for the created message
        url.query_pairs_mut().append_pair("wait", "true");

        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    pub async fn deliver(&self, payload: &OutgoingPayload) -> Result<DeliveryOutcome> {
        let body = payload.to_json()?;
        let request = self.client.post(self.url.clone());

        let request = match &payload.attachment {
            None => request
                .header("Content-Type", "application/json")
                .body(body),
            Some(attachment) => {
                let file =
                    Part::bytes(attachment.data.clone()).file_name(attachment.file_name.clone());
                let form = Form::new()
                    .text("payload_json", body)
                    .part("files[0]", file);
                request.multipart(form)
            }
        };

        debug!("Executing webhook {}", self.url.path());

        let response = request
            .send()
            .await
            .context("Failed to send webhook request")?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(DeliveryOutcome::Delivered);
        }

        let body = response.text().await.unwrap_or_default();
        Ok(DeliveryOutcome::Rejected { status, body })
    }
}
