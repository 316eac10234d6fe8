use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use crate::discord::{DeliveryOutcome, WebhookClient};
use crate::platform::{IncomingMessage, MediaFetcher};
use crate::transform::Transformer;

/// Forwards source messages to the webhook, one at a time
pub struct Relay {
    transformer: Transformer,
    webhook: WebhookClient,
    fetcher: Arc<dyn MediaFetcher>,
}

impl Relay {
    pub fn new(
        transformer: Transformer,
        webhook: WebhookClient,
        fetcher: Arc<dyn MediaFetcher>,
    ) -> Self {
        Self {
            transformer,
            webhook,
            fetcher,
        }
    }

    /// Transform and deliver one message.
    pub async fn forward(&self, msg: IncomingMessage) -> Result<DeliveryOutcome> {
        let payload = self
            .transformer
            .transform(&msg, self.fetcher.as_ref())
            .await?;
        self.webhook.deliver(&payload).await
    }

    /// Forward one message and log the outcome. Failures stay contained to this message.
    pub async fn handle(&self, msg: IncomingMessage) {
        match self.forward(msg).await {
            Ok(DeliveryOutcome::Delivered) => {
                info!("Message forwarded successfully to Discord");
            }
            Ok(DeliveryOutcome::Rejected { status, body }) => {
                error!("Failed to forward message: {} {}", status, body);
            }
            Err(e) => {
                error!("Error forwarding message: {:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediaPolicy;
    use crate::discord::testing;
    use crate::platform::testing::FakeFetcher;
    use crate::platform::{MediaKind, MediaRef, SenderInfo};
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;

    fn message(text: &str, media: Option<MediaRef>) -> IncomingMessage {
        IncomingMessage {
            text: text.to_string(),
            media,
            sender: Some(SenderInfo::User {
                first_name: "Ann".into(),
                last_name: None,
            }),
            timestamp: Utc.timestamp_opt(1700000000, 0).unwrap(),
        }
    }

    fn photo() -> Option<MediaRef> {
        Some(MediaRef {
            kind: MediaKind::Photo,
            file_id: Some("photo-id".into()),
            file_name: None,
        })
    }

    fn relay(url: &str, fetcher: Arc<FakeFetcher>) -> Relay {
        Relay::new(
            Transformer::new(MediaPolicy::Photos),
            WebhookClient::new(url).unwrap(),
            fetcher,
        )
    }

    #[tokio::test]
    async fn test_forward_delivers_embed() {
        let hook = testing::spawn(vec![StatusCode::OK]).await;
        let relay = relay(&hook.url, Arc::new(FakeFetcher::new()));

        let outcome = relay.forward(message("Hello world", None)).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        let body: serde_json::Value = serde_json::from_slice(&hook.requests()[0].body).unwrap();
        let embed = &body["embeds"][0];
        assert_eq!(embed["title"], "Telegram Message");
        assert_eq!(embed["description"], "Hello world");
        assert_eq!(embed["author"]["name"], "Ann");
    }

    #[tokio::test]
    async fn test_rejection_does_not_stop_next_message() {
        let hook = testing::spawn(vec![StatusCode::BAD_REQUEST, StatusCode::OK]).await;
        let relay = relay(&hook.url, Arc::new(FakeFetcher::new()));

        let first = relay.forward(message("first", None)).await.unwrap();
        assert!(matches!(
            first,
            DeliveryOutcome::Rejected {
                status: StatusCode::BAD_REQUEST,
                ..
            }
        ));

        relay.handle(message("second", None)).await;
        relay.handle(message("third", None)).await;

        let requests = hook.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests[2].body_text().contains("third"));
    }

    #[tokio::test]
    async fn test_photo_temp_file_removed_even_when_delivery_fails() {
        let hook = testing::spawn(vec![StatusCode::INTERNAL_SERVER_ERROR]).await;
        let fetcher = Arc::new(FakeFetcher::new());
        let relay = relay(&hook.url, Arc::clone(&fetcher));

        relay.handle(message("pic", photo())).await;

        let fetched = fetcher.fetched();
        assert_eq!(fetched.len(), 1);
        assert!(!fetched[0].exists());

        let requests = hook.requests();
        let request = &requests[0];
        assert!(request.content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_download_failure_skips_delivery() {
        let hook = testing::spawn(vec![StatusCode::OK]).await;
        let relay = relay(&hook.url, Arc::new(FakeFetcher::failing()));

        assert!(relay.forward(message("pic", photo())).await.is_err());
        relay.handle(message("pic", photo())).await;
        assert!(hook.requests().is_empty());

        relay.handle(message("text only", None)).await;
        assert_eq!(hook.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_contained() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let relay = relay(&format!("http://{addr}/hook"), Arc::new(FakeFetcher::new()));
        assert!(relay.forward(message("x", None)).await.is_err());
        // Logged, not propagated
        relay.handle(message("x", None)).await;
    }
}
