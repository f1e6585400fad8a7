// src/connectors/discord.rs
use crate::connectors::traits::Notifier;
use crate::error::SentinelError;
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 3;

/// Posts notifications to a Discord webhook. Each message is wrapped with a
/// header and timestamp before sending. Delivery is retried with linear
/// backoff; exhausting the attempts is a `Delivery` error the caller logs
/// and moves past.
pub struct DiscordNotifier {
    webhook_url: String,
    http_client: Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String) -> Result<Self, SentinelError> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SentinelError::Delivery(e.to_string()))?;
        Ok(Self {
            webhook_url,
            http_client,
        })
    }

    fn format_payload(text: &str) -> serde_json::Value {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let formatted = format!("\n\n🔔 New notification 🔔\n🕒 {}\n{}", timestamp, text);
        serde_json::json!({ "content": formatted })
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, text: &str) -> Result<(), SentinelError> {
        let payload = Self::format_payload(text);

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            match self
                .http_client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_error = format!("webhook returned {}", response.status());
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            if attempt < MAX_ATTEMPTS {
                warn!(
                    "Delivery attempt {}/{} failed: {}",
                    attempt, MAX_ATTEMPTS, last_error
                );
                tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
            }
        }

        Err(SentinelError::Delivery(last_error))
    }
}
