//! Pool configuration
//!
//! All durations are expressed in whole seconds, matching the shape of the
//! JSON configuration file consumed by the CLI.

use serde::{Deserialize, Serialize};

/// Default test endpoints used to probe candidate proxies
pub const DEFAULT_TEST_URLS: [&str; 3] = [
    "http://httpbin.org/ip",
    "http://icanhazip.com",
    "https://api.ipify.org",
];

/// Authenticated proxy provider endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaidProviderConfig {
    /// API endpoint returning a newline-delimited proxy list
    pub endpoint: String,
    /// Bearer credential sent with the fetch request
    pub api_key: String,
}

/// Configuration for the proxy pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Plaintext proxy-list URLs to scrape
    pub free_sources: Vec<String>,
    /// Authenticated providers
    pub paid_providers: Vec<PaidProviderConfig>,
    /// Seconds between automatic refreshes
    pub fetch_interval: u64,
    /// Pool size below which a warning is logged
    pub min_pool_size: usize,
    /// Failure count that triggers quarantine
    pub max_failures: u32,
    /// Seconds a proxy stays quarantined
    pub quarantine_duration: u64,
    /// Per-attempt validation timeout in seconds
    pub validation_timeout: u64,
    /// Ring-buffer capacity for response-time history
    pub max_response_time_history: usize,
    /// Number of candidates validated concurrently
    pub validation_batch_size: usize,
    /// Endpoints used for liveness probes
    pub test_urls: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            free_sources: Vec::new(),
            paid_providers: Vec::new(),
            fetch_interval: 300,
            min_pool_size: 10,
            max_failures: 3,
            quarantine_duration: 600,
            validation_timeout: 5,
            max_response_time_history: 50,
            validation_batch_size: 20,
            test_urls: DEFAULT_TEST_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_free_sources(mut self, urls: Vec<String>) -> Self {
        self.free_sources = urls;
        self
    }

    pub fn with_paid_providers(mut self, providers: Vec<PaidProviderConfig>) -> Self {
        self.paid_providers = providers;
        self
    }

    pub fn with_fetch_interval(mut self, seconds: u64) -> Self {
        self.fetch_interval = seconds;
        self
    }

    pub fn with_min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = size;
        self
    }

    pub fn with_max_failures(mut self, count: u32) -> Self {
        self.max_failures = count;
        self
    }

    pub fn with_quarantine_duration(mut self, seconds: u64) -> Self {
        self.quarantine_duration = seconds;
        self
    }

    pub fn with_validation_timeout(mut self, seconds: u64) -> Self {
        self.validation_timeout = seconds;
        self
    }

    pub fn with_max_response_time_history(mut self, capacity: usize) -> Self {
        self.max_response_time_history = capacity;
        self
    }

    pub fn with_validation_batch_size(mut self, size: usize) -> Self {
        self.validation_batch_size = size;
        self
    }

    pub fn with_test_urls(mut self, urls: Vec<String>) -> Self {
        self.test_urls = urls;
        self
    }
}
