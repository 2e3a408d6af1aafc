//! Proxy candidate providers
//!
//! Providers fetch raw candidate lists from the network. Two kinds exist:
//! free plaintext list sources and authenticated paid endpoints. Both return
//! the same shape: deduplicated `host:port` strings.

use crate::config::PaidProviderConfig;
use crate::error::{Error, Result};
use crate::pool::parse;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

/// Timeout for free list fetches in seconds
const FREE_FETCH_TIMEOUT_SECS: u64 = 10;

/// Timeout for paid endpoint fetches in seconds
const PAID_FETCH_TIMEOUT_SECS: u64 = 15;

/// A source of raw proxy candidates
///
/// Closed set of provider kinds; adding a new kind means adding a variant
/// here and handling it in [`ProxyProvider::fetch`].
pub enum ProxyProvider {
    FreeList(FreeListProvider),
    Paid(PaidProvider),
}

impl ProxyProvider {
    /// Fetch candidates from this provider
    pub async fn fetch(&self) -> Result<Vec<String>> {
        match self {
            ProxyProvider::FreeList(p) => p.fetch().await,
            ProxyProvider::Paid(p) => p.fetch().await,
        }
    }

    /// Human-readable provider name for logging
    pub fn name(&self) -> String {
        match self {
            ProxyProvider::FreeList(_) => "free-list".to_string(),
            ProxyProvider::Paid(p) => format!("paid({})", p.endpoint),
        }
    }
}

/// Free proxy list provider scraping plaintext list URLs
pub struct FreeListProvider {
    urls: Vec<String>,
    client: Client,
}

impl FreeListProvider {
    pub fn new(urls: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(FREE_FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { urls, client })
    }

    /// Fetch every configured URL, concatenate and deduplicate
    ///
    /// A URL that fails to fetch contributes nothing; the remaining URLs are
    /// still queried.
    pub async fn fetch(&self) -> Result<Vec<String>> {
        let mut all = Vec::new();

        for url in &self.urls {
            match self.fetch_url(url).await {
                Ok(candidates) => {
                    info!("Fetched {} proxies from {}", candidates.len(), url);
                    all.extend(candidates);
                }
                Err(e) => {
                    warn!("Failed to fetch from {}: {}", url, e);
                }
            }
        }

        all.sort();
        all.dedup();
        Ok(all)
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<String>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::provider(
                "free-list",
                format!("{} returned {}", url, response.status()),
            ));
        }
        let body = response.text().await?;
        Ok(parse::parse_candidates(&body))
    }
}

/// Paid proxy service provider with bearer authentication
pub struct PaidProvider {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl PaidProvider {
    pub fn new(config: &PaidProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PAID_FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            client,
        })
    }

    /// Fetch the endpoint once; same output shape as the free provider
    pub async fn fetch(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "paid",
                format!("{} returned {}", self.endpoint, response.status()),
            ));
        }

        let body = response.text().await?;
        let candidates = parse::parse_candidates(&body);
        info!("Fetched {} paid proxies from {}", candidates.len(), self.endpoint);
        Ok(candidates)
    }
}
