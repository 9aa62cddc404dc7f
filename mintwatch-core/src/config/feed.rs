//! Curated-feed source configuration.

use std::time::Duration;
use url::Url;

pub const DEFAULT_FEED_ENDPOINT: &str = "https://api.launchonsoar.com/app/projects/curated";
pub const DEFAULT_PROJECT_LINK_BASE: &str = "https://app.launchonsoar.com/project/";

#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Endpoint without query; paging parameters are added per request.
    pub endpoint: Url,
    /// Number of most recent items requested per poll.
    pub page_size: usize,
    /// Fixed period between polls. Also the retry interval after a failure.
    pub poll_interval: Duration,
    /// Prefix of the per-project "view" link; the slug is appended.
    pub project_link_base: String,
}

impl FeedConfig {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            page_size: 10,
            poll_interval: Duration::from_secs(5),
            project_link_base: DEFAULT_PROJECT_LINK_BASE.to_string(),
        }
    }
}
