//! Proxy validation
//!
//! Confirms candidate liveness by issuing GET requests through the proxy
//! against well-known echo endpoints, measuring latency along the way.
//! Validation never returns an error: an unreachable, slow or misbehaving
//! candidate is simply reported as invalid.

use crate::config::PoolConfig;
use futures::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;

/// Realistic user agents rotated across validation requests to reduce
/// provider-side fingerprinting bias
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/121.0",
];

/// Pick a random user agent from the rotation pool
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .expect("user agent pool is non-empty")
}

/// Outcome of validating one candidate
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Candidate in `host:port` form
    pub proxy: String,
    pub is_valid: bool,
    /// Measured latency in seconds; infinite when invalid
    pub latency: f64,
}

/// Validator probing candidates against live test endpoints
#[derive(Clone)]
pub struct ProxyValidator {
    test_urls: Vec<String>,
    timeout: Duration,
    batch_size: usize,
}

impl ProxyValidator {
    pub fn new(config: &PoolConfig) -> Self {
        Self {
            test_urls: config.test_urls.clone(),
            timeout: Duration::from_secs(config.validation_timeout),
            batch_size: config.validation_batch_size.max(1),
        }
    }

    /// Validate a single candidate
    ///
    /// Tries each test endpoint in order; the first 2xx response wins and
    /// reports elapsed seconds. Each attempt is individually time-bounded; a
    /// timeout counts as a failed attempt, not an error. Exhausting all
    /// endpoints yields `(false, +inf)`.
    pub async fn validate(&self, proxy: &str) -> (bool, f64) {
        let client = match self.build_client(proxy) {
            Ok(client) => client,
            Err(e) => {
                debug!("Could not build client for {}: {}", proxy, e);
                return (false, f64::INFINITY);
            }
        };

        for test_url in &self.test_urls {
            let start = Instant::now();
            match tokio::time::timeout(self.timeout, client.get(test_url).send()).await {
                Ok(Ok(response)) if response.status().is_success() => {
                    let latency = start.elapsed().as_secs_f64();
                    debug!("Validated {} via {} in {:.2}s", proxy, test_url, latency);
                    return (true, latency);
                }
                Ok(Ok(response)) => {
                    debug!(
                        "Validation of {} on {} returned {}",
                        proxy,
                        test_url,
                        response.status()
                    );
                }
                Ok(Err(e)) => {
                    debug!("Validation of {} on {} failed: {}", proxy, test_url, e);
                }
                Err(_) => {
                    debug!("Validation of {} on {} timed out", proxy, test_url);
                }
            }
        }

        (false, f64::INFINITY)
    }

    /// Validate candidates concurrently in a bounded batch
    ///
    /// Concurrency is capped at the configured batch size so downstream test
    /// endpoints are not hammered. Each candidate's outcome is independent.
    pub async fn validate_batch(&self, candidates: Vec<String>) -> Vec<ValidationResult> {
        let semaphore = Arc::new(Semaphore::new(self.batch_size));

        stream::iter(candidates)
            .map(|proxy| {
                let sem = Arc::clone(&semaphore);
                let validator = self.clone();
                async move {
                    // The semaphore is only closed when dropped, and we hold
                    // the Arc for the whole batch.
                    let _permit = sem.acquire().await.expect("Semaphore closed unexpectedly");
                    let (is_valid, latency) = validator.validate(&proxy).await;
                    ValidationResult {
                        proxy,
                        is_valid,
                        latency,
                    }
                }
            })
            .buffer_unordered(self.batch_size)
            .collect::<Vec<_>>()
            .await
    }

    fn build_client(&self, proxy: &str) -> crate::error::Result<Client> {
        let reqwest_proxy = ReqwestProxy::all(format!("http://{}", proxy))?;
        let client = Client::builder()
            .proxy(reqwest_proxy)
            .user_agent(random_user_agent())
            .timeout(self.timeout)
            .build()?;
        Ok(client)
    }
}
