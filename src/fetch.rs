use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use url::Url;

/// Identifies the crawler to the campus sites.
pub const USER_AGENT: &str = "KITBot/2.0 (campus notice crawler)";

/// HTTP fetcher with a fixed timeout and a minimum interval between requests
/// to the same host. Keeping the interval here means every call site is
/// polite by construction.
pub struct PageFetcher {
    client: reqwest::Client,
    delay: Duration,
    last_request: HashMap<String, Instant>,
}

impl PageFetcher {
    pub fn new(timeout: Duration, delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            delay,
            last_request: HashMap::new(),
        })
    }

    /// Fetch a page's HTML. Non-2xx statuses and transport failures are
    /// errors; the caller counts them and moves on.
    pub async fn get(&mut self, url: &str) -> Result<String> {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_default();

        if let Some(last) = self.last_request.get(&host) {
            let since = last.elapsed();
            if since < self.delay {
                tokio::time::sleep(self.delay - since).await;
            }
        }

        let result = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request failed: {}", url))?
            .error_for_status()
            .with_context(|| format!("error status: {}", url))?
            .text()
            .await
            .with_context(|| format!("failed to read body: {}", url));

        self.last_request.insert(host, Instant::now());
        result
    }
}
