//! Outbound webhook client.

use reqwest::Client;
use url::Url;

use super::{ClientError, DEFAULT_TIMEOUT, http_client};
use crate::objects::discord::DiscordWebhookPayload;

/// Posts payloads to a Discord-compatible webhook URL.
///
/// One request per call; retrying is the caller's decision.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(url: Url) -> Self {
        Self {
            http: http_client(DEFAULT_TIMEOUT),
            url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST {url}` with the JSON payload. Any non-2xx status is an error.
    pub async fn post(&self, payload: &DiscordWebhookPayload) -> Result<(), ClientError> {
        let resp = self.http.post(self.url.clone()).json(payload).send().await?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ClientError::Api { status, body })
        }
    }
}
