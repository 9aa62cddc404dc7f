//! Curated-projects feed client.

use reqwest::Client;
use url::Url;

use super::{ClientError, DEFAULT_TIMEOUT, http_client, parse_response};
use crate::objects::feed::FeedPage;

/// Reads the most recent items from the curated-projects endpoint.
///
/// The endpoint is queried with `sortBy=createdAt&sortDirection=desc`, so
/// a page always holds the newest `limit` items.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: Client,
    endpoint: Url,
}

impl FeedClient {
    /// Create a new `FeedClient` for the given endpoint (without query).
    pub fn new(endpoint: Url) -> Self {
        Self {
            http: http_client(DEFAULT_TIMEOUT),
            endpoint,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET {endpoint}?limit=N&sortBy=createdAt&sortDirection=desc`
    ///
    /// Returns the raw page items; decoding individual items is left to the
    /// caller so that a single malformed item does not fail the whole page.
    pub async fn fetch_latest(&self, limit: usize) -> Result<Vec<serde_json::Value>, ClientError> {
        let limit = limit.to_string();
        let resp = self
            .http
            .get(self.endpoint.clone())
            .query(&[
                ("limit", limit.as_str()),
                ("sortBy", "createdAt"),
                ("sortDirection", "desc"),
            ])
            .send()
            .await?;

        let page: FeedPage = parse_response(resp).await?;
        Ok(page.into_items())
    }
}
