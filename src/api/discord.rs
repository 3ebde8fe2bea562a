use crate::config::HttpConfig;
use crate::error::NotifyError;
use crate::utils::report::{split_message, DISCORD_CONTENT_LIMIT};
use crate::utils::retry::{retry_with, RetryPolicy};
use serde::Serialize;
use tracing::{debug, info};

/// Body of a webhook execute request
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts prediction messages to a Discord channel webhook
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, http: &HttpConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(http.timeout).build()?;

        Ok(Self {
            url: url.into(),
            client,
            retry: RetryPolicy::with_retries(http.max_retries),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Send `content`, split into as many messages as the content limit requires.
    /// Returns the number of messages posted.
    pub async fn send(&self, content: &str) -> Result<usize, NotifyError> {
        let chunks = split_message(content, DISCORD_CONTENT_LIMIT);
        for (i, chunk) in chunks.iter().enumerate() {
            debug!("Posting webhook message {}/{}", i + 1, chunks.len());
            retry_with(&self.retry, "Discord webhook", NotifyError::is_transient, || {
                self.post_once(chunk)
            })
            .await?;
        }

        info!("Sent {} message(s) to Discord", chunks.len());
        Ok(chunks.len())
    }

    async fn post_once(&self, content: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookMessage { content })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status { status, body });
        }
        Ok(())
    }
}
