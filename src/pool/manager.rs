//! Pool manager: fetch cycles, weighted rotation and quarantine
//!
//! [`ProxyPool`] orchestrates the providers and the validator, owns the
//! per-proxy metrics, and serves weighted-random selections. Construct one at
//! process start and share it (e.g. behind an `Arc`) with every consumer; a
//! pool configured with no providers degenerates gracefully into a disabled
//! pool whose `select` always returns `None`.

use crate::config::PoolConfig;
use crate::error::Result;
use crate::pool::metrics::ProxyMetrics;
use crate::pool::provider::{FreeListProvider, PaidProvider, ProxyProvider};
use crate::pool::validator::ProxyValidator;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Read-only snapshot of pool health
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub total_proxies: usize,
    pub available_proxies: usize,
    pub quarantined_proxies: usize,
    pub rotation_pool_size: usize,
    /// Mean latency in seconds over every recorded sample
    pub avg_response_time: f64,
    pub last_refresh: Option<DateTime<Utc>>,
}

/// Mutable pool state, guarded by a single lock
#[derive(Default)]
struct PoolState {
    /// Metrics keyed by `host:port`; an entry exists iff the proxy passed
    /// validation at least once
    proxies: HashMap<String, ProxyMetrics>,
    /// Normalized (proxy, weight) pairs covering the non-quarantined proxies
    /// at last rebuild; weights sum to 1.0
    weighted_pool: Vec<(String, f64)>,
    last_fetch: Option<Instant>,
    last_refresh_at: Option<DateTime<Utc>>,
}

/// Rotating proxy pool with reliability-weighted selection
pub struct ProxyPool {
    config: PoolConfig,
    providers: Vec<ProxyProvider>,
    validator: ProxyValidator,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    /// Build a pool from configuration
    ///
    /// Providers are derived from `free_sources` and `paid_providers`; a
    /// configuration naming neither yields a disabled pool.
    pub fn new(config: PoolConfig) -> Result<Self> {
        let mut providers = Vec::new();

        if !config.free_sources.is_empty() {
            providers.push(ProxyProvider::FreeList(FreeListProvider::new(
                config.free_sources.clone(),
            )?));
        }
        for paid in &config.paid_providers {
            providers.push(ProxyProvider::Paid(PaidProvider::new(paid)?));
        }

        let validator = ProxyValidator::new(&config);

        Ok(Self {
            config,
            providers,
            validator,
            state: Mutex::new(PoolState::default()),
        })
    }

    /// Fetch candidates from all providers, validate them, and grow the pool
    ///
    /// No-op unless `fetch_interval` has elapsed since the last successful
    /// refresh or `force` is set. Provider and validation faults are absorbed
    /// and logged; a cycle yielding zero valid proxies leaves the existing
    /// rotation pool untouched. Returns the number of candidates that passed
    /// validation this cycle.
    pub async fn refresh(&self, force: bool) -> Result<usize> {
        {
            let state = self.state.lock();
            if !force {
                if let Some(last) = state.last_fetch {
                    if last.elapsed() < Duration::from_secs(self.config.fetch_interval) {
                        debug!("Refresh interval not elapsed, skipping");
                        return Ok(0);
                    }
                }
            }
        }

        if self.providers.is_empty() {
            debug!("No providers configured, pool refresh is a no-op");
            return Ok(0);
        }

        info!("Starting proxy fetch and validation");

        let mut candidates = Vec::new();
        for provider in &self.providers {
            match provider.fetch().await {
                Ok(list) => {
                    info!("{} provided {} proxies", provider.name(), list.len());
                    candidates.extend(list);
                }
                Err(e) => {
                    error!("Error fetching from {}: {}", provider.name(), e);
                }
            }
        }

        candidates.sort();
        candidates.dedup();
        info!("Total unique proxies to validate: {}", candidates.len());

        let results = self.validator.validate_batch(candidates).await;

        let mut state = self.state.lock();
        let mut valid_count = 0;
        let mut new_count = 0;
        for result in results {
            if !result.is_valid {
                continue;
            }
            valid_count += 1;
            // Re-validation of a known proxy does not touch its history; the
            // refresh cycle only expands the pool.
            if !state.proxies.contains_key(&result.proxy) {
                let mut metrics = ProxyMetrics::new();
                metrics.push_response_time(result.latency, self.config.max_response_time_history);
                state.proxies.insert(result.proxy.clone(), metrics);
                new_count += 1;
                debug!("Added valid proxy: {}", result.proxy);
            }
        }

        if valid_count > 0 {
            state.last_fetch = Some(Instant::now());
            state.last_refresh_at = Some(Utc::now());
            self.rebuild_locked(&mut state);
            info!(
                "Refresh complete: {} valid proxies ({} new)",
                valid_count, new_count
            );
        } else {
            warn!("No valid proxies found during refresh, keeping existing pool");
        }

        Ok(valid_count)
    }

    /// Rebuild the weighted rotation pool from current metrics
    pub fn rebuild_pool(&self) {
        let mut state = self.state.lock();
        self.rebuild_locked(&mut state);
    }

    /// Recompute scores and swap in a fresh rotation pool
    ///
    /// Runs entirely under the already-held lock so a rebuild triggered from
    /// `report_failure` is visible to the very next `select` call.
    fn rebuild_locked(&self, state: &mut PoolState) {
        let now = Instant::now();
        let mut available: Vec<(String, f64)> = Vec::new();

        for (proxy, metrics) in state.proxies.iter_mut() {
            if metrics.is_quarantined {
                if metrics.quarantine_expired(now) {
                    metrics.is_quarantined = false;
                    metrics.quarantine_end = None;
                    metrics.failures = 0;
                    info!("Released {} from quarantine", proxy);
                } else {
                    continue;
                }
            }

            metrics.reliability_score = metrics.score();
            available.push((proxy.clone(), metrics.reliability_score));
        }

        if available.is_empty() {
            warn!("No available proxies in pool");
            state.weighted_pool.clear();
            return;
        }

        let count = available.len();
        let total: f64 = available.iter().map(|(_, score)| score).sum();
        let mut weighted: Vec<(String, f64)> = if total > 0.0 {
            available
                .into_iter()
                .map(|(proxy, score)| (proxy, score / total))
                .collect()
        } else {
            available
                .into_iter()
                .map(|(proxy, _)| (proxy, 1.0 / count as f64))
                .collect()
        };

        // Break positional patterns while preserving weight proportions
        weighted.shuffle(&mut rand::thread_rng());
        state.weighted_pool = weighted;

        info!("Updated rotation pool with {} proxies", count);
        if count < self.config.min_pool_size {
            warn!(
                "Proxy pool below minimum size: {}/{}",
                count, self.config.min_pool_size
            );
        }
    }

    /// Draw a proxy by weighted random selection
    ///
    /// Returns `None` when the rotation pool is empty; callers should proceed
    /// without a proxy or retry later, never treat this as fatal.
    pub fn select(&self) -> Option<String> {
        let mut state = self.state.lock();
        if state.weighted_pool.is_empty() {
            warn!("No proxies available in rotation pool");
            return None;
        }

        let draw: f64 = rand::thread_rng().gen();
        let mut cumulative = 0.0;
        let mut selected = None;
        for (proxy, weight) in &state.weighted_pool {
            cumulative += weight;
            if draw <= cumulative {
                selected = Some(proxy.clone());
                break;
            }
        }

        // Rounding can leave the cumulative sum just short of 1.0; fall back
        // to the last entry rather than failing the draw.
        let proxy = selected.unwrap_or_else(|| {
            state
                .weighted_pool
                .last()
                .expect("pool checked non-empty")
                .0
                .clone()
        });

        if let Some(metrics) = state.proxies.get_mut(&proxy) {
            metrics.last_used = Some(Instant::now());
        }
        Some(proxy)
    }

    /// Stamp a proxy as used; observational only, not part of scoring
    pub fn mark_used(&self, proxy: &str) {
        let mut state = self.state.lock();
        if let Some(metrics) = state.proxies.get_mut(proxy) {
            metrics.last_used = Some(Instant::now());
        }
    }

    /// Record a successful request through `proxy`
    ///
    /// Decrements the failure count (floored at zero) and immediately clears
    /// quarantine if set.
    pub fn report_success(&self, proxy: &str, latency: f64) {
        let mut state = self.state.lock();
        if let Some(metrics) = state.proxies.get_mut(proxy) {
            metrics.successes += 1;
            metrics.total_requests += 1;
            metrics.push_response_time(latency, self.config.max_response_time_history);
            metrics.failures = metrics.failures.saturating_sub(1);

            if metrics.is_quarantined {
                metrics.is_quarantined = false;
                metrics.quarantine_end = None;
                info!("Removed {} from quarantine after success", proxy);
            }
        }
    }

    /// Record a failed request through `proxy`
    ///
    /// Crossing `max_failures` quarantines the proxy and rebuilds the
    /// rotation pool in the same critical section, so the quarantine is
    /// visible to the next `select` call.
    pub fn report_failure(&self, proxy: &str, reason: &str) {
        let mut state = self.state.lock();
        let quarantined = match state.proxies.get_mut(proxy) {
            Some(metrics) => {
                metrics.failures += 1;
                metrics.total_requests += 1;
                debug!(
                    "Failure reported for {}: {} ({} total failures)",
                    proxy, reason, metrics.failures
                );

                if metrics.failures >= self.config.max_failures {
                    metrics.is_quarantined = true;
                    metrics.quarantine_end = Some(
                        Instant::now() + Duration::from_secs(self.config.quarantine_duration),
                    );
                    warn!(
                        "Quarantined {} for {}s after {} failures",
                        proxy, self.config.quarantine_duration, metrics.failures
                    );
                    true
                } else {
                    false
                }
            }
            None => false,
        };

        if quarantined {
            self.rebuild_locked(&mut state);
        }
    }

    /// Snapshot of current pool health
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        let total_proxies = state.proxies.len();
        let available_proxies = state
            .proxies
            .values()
            .filter(|m| !m.is_quarantined)
            .count();

        let all_times: Vec<f64> = state
            .proxies
            .values()
            .flat_map(|m| m.response_times.iter().copied())
            .collect();
        let avg_response_time = if all_times.is_empty() {
            0.0
        } else {
            let mean = all_times.iter().sum::<f64>() / all_times.len() as f64;
            (mean * 1000.0).round() / 1000.0
        };

        PoolStats {
            total_proxies,
            available_proxies,
            quarantined_proxies: total_proxies - available_proxies,
            rotation_pool_size: state.weighted_pool.len(),
            avg_response_time,
            last_refresh: state.last_refresh_at,
        }
    }

    /// Whether the pool currently has proxies to serve
    pub fn is_enabled(&self) -> bool {
        !self.state.lock().weighted_pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROXY_A: &str = "1.2.3.4:8080";
    const PROXY_B: &str = "5.6.7.8:3128";

    fn pool_with(config: PoolConfig) -> ProxyPool {
        ProxyPool::new(config).unwrap()
    }

    /// Insert a proxy as if it had just passed validation
    fn admit(pool: &ProxyPool, proxy: &str, latency: f64) {
        let mut state = pool.state.lock();
        let mut metrics = ProxyMetrics::new();
        metrics.push_response_time(latency, pool.config.max_response_time_history);
        state.proxies.insert(proxy.to_string(), metrics);
    }

    fn failures_of(pool: &ProxyPool, proxy: &str) -> u32 {
        pool.state.lock().proxies[proxy].failures
    }

    fn is_quarantined(pool: &ProxyPool, proxy: &str) -> bool {
        pool.state.lock().proxies[proxy].is_quarantined
    }

    fn pool_contains(pool: &ProxyPool, proxy: &str) -> bool {
        pool.state
            .lock()
            .weighted_pool
            .iter()
            .any(|(p, _)| p == proxy)
    }

    #[test]
    fn test_select_on_empty_pool_returns_none() {
        let pool = pool_with(PoolConfig::default());
        assert_eq!(pool.select(), None);
        assert!(!pool.is_enabled());
    }

    #[test]
    fn test_admitted_proxy_is_selectable_after_rebuild() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();
        assert!(pool.is_enabled());
        assert_eq!(pool.select(), Some(PROXY_A.to_string()));
    }

    #[test]
    fn test_quarantine_triggers_at_max_failures() {
        let pool = pool_with(PoolConfig::new().with_max_failures(3));
        admit(&pool, PROXY_A, 0.8);
        admit(&pool, PROXY_B, 0.8);
        pool.rebuild_pool();

        pool.report_failure(PROXY_A, "connect timeout");
        pool.report_failure(PROXY_A, "connect timeout");
        assert!(!is_quarantined(&pool, PROXY_A));
        assert!(pool_contains(&pool, PROXY_A));

        pool.report_failure(PROXY_A, "connect timeout");
        assert!(is_quarantined(&pool, PROXY_A));
        // Rebuild happened inside report_failure: the quarantined proxy is
        // already gone from the rotation pool.
        assert!(!pool_contains(&pool, PROXY_A));
        assert!(pool_contains(&pool, PROXY_B));
    }

    #[test]
    fn test_quarantined_proxy_never_selected() {
        let pool = pool_with(PoolConfig::new().with_max_failures(1));
        admit(&pool, PROXY_A, 0.8);
        admit(&pool, PROXY_B, 0.8);
        pool.rebuild_pool();
        pool.report_failure(PROXY_A, "blocked");

        for _ in 0..100 {
            assert_eq!(pool.select(), Some(PROXY_B.to_string()));
        }
    }

    #[test]
    fn test_success_clears_quarantine_immediately() {
        let pool = pool_with(PoolConfig::new().with_max_failures(1));
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();
        pool.report_failure(PROXY_A, "blocked");
        assert!(is_quarantined(&pool, PROXY_A));

        pool.report_success(PROXY_A, 0.5);
        assert!(!is_quarantined(&pool, PROXY_A));
    }

    #[test]
    fn test_quarantine_release_resets_failures() {
        let pool = pool_with(
            PoolConfig::new()
                .with_max_failures(3)
                .with_quarantine_duration(1),
        );
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();

        for _ in 0..3 {
            pool.report_failure(PROXY_A, "rate limited");
        }
        assert!(is_quarantined(&pool, PROXY_A));
        assert!(!pool_contains(&pool, PROXY_A));

        std::thread::sleep(Duration::from_millis(1100));
        pool.rebuild_pool();

        assert!(!is_quarantined(&pool, PROXY_A));
        assert!(pool_contains(&pool, PROXY_A));
        assert_eq!(failures_of(&pool, PROXY_A), 0);
    }

    #[test]
    fn test_success_decrements_failures_with_floor() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.report_failure(PROXY_A, "slow");
        assert_eq!(failures_of(&pool, PROXY_A), 1);
        pool.report_success(PROXY_A, 0.5);
        assert_eq!(failures_of(&pool, PROXY_A), 0);
        pool.report_success(PROXY_A, 0.5);
        assert_eq!(failures_of(&pool, PROXY_A), 0);
    }

    #[test]
    fn test_weighted_selection_is_proportional() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.5);
        admit(&pool, PROXY_B, 0.5);
        {
            // Strong proxy: perfect record, fast. Weak proxy: all failures.
            let mut state = pool.state.lock();
            let a = state.proxies.get_mut(PROXY_A).unwrap();
            a.successes = 100;
            a.total_requests = 100;
            let b = state.proxies.get_mut(PROXY_B).unwrap();
            b.successes = 0;
            b.total_requests = 100;
            b.response_times.clear();
        }
        pool.rebuild_pool();

        // Scores: A = 1.0, B = 0.1 (floor); expected A share ~0.909
        let draws = 20_000;
        let mut a_count = 0;
        for _ in 0..draws {
            if pool.select() == Some(PROXY_A.to_string()) {
                a_count += 1;
            }
        }
        let ratio = a_count as f64 / draws as f64;
        assert!(
            (0.87..=0.95).contains(&ratio),
            "expected ~0.909 share for the strong proxy, got {}",
            ratio
        );
    }

    #[test]
    fn test_select_stamps_last_used() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();
        assert!(pool.state.lock().proxies[PROXY_A].last_used.is_none());
        pool.select();
        assert!(pool.state.lock().proxies[PROXY_A].last_used.is_some());
    }

    #[test]
    fn test_mark_used() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.mark_used(PROXY_A);
        assert!(pool.state.lock().proxies[PROXY_A].last_used.is_some());
    }

    #[test]
    fn test_reports_on_unknown_proxy_are_ignored() {
        let pool = pool_with(PoolConfig::default());
        pool.report_success("9.9.9.9:9999", 0.5);
        pool.report_failure("9.9.9.9:9999", "unknown");
        assert_eq!(pool.stats().total_proxies, 0);
    }

    #[test]
    fn test_stats_snapshot() {
        let pool = pool_with(PoolConfig::new().with_max_failures(1));
        admit(&pool, PROXY_A, 1.0);
        admit(&pool, PROXY_B, 3.0);
        pool.rebuild_pool();
        pool.report_failure(PROXY_B, "blocked");

        let stats = pool.stats();
        assert_eq!(stats.total_proxies, 2);
        assert_eq!(stats.available_proxies, 1);
        assert_eq!(stats.quarantined_proxies, 1);
        assert_eq!(stats.rotation_pool_size, 1);
        assert_eq!(stats.avg_response_time, 2.0);
        assert!(stats.last_refresh.is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_providers_leaves_pool_untouched() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        admit(&pool, PROXY_B, 0.8);
        pool.rebuild_pool();
        assert_eq!(pool.stats().rotation_pool_size, 2);

        let valid = pool.refresh(true).await.unwrap();
        assert_eq!(valid, 0);
        // Stale-but-available beats empty: the old pool survives a bad cycle
        assert_eq!(pool.stats().rotation_pool_size, 2);
    }

    #[tokio::test]
    async fn test_refresh_with_failing_provider_keeps_pool() {
        let config = PoolConfig::new().with_free_sources(vec!["not a url".to_string()]);
        let pool = pool_with(config);
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();

        let valid = pool.refresh(true).await.unwrap();
        assert_eq!(valid, 0);
        assert_eq!(pool.stats().rotation_pool_size, 1);
    }

    #[test]
    fn test_existing_metrics_survive_readmission() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.report_success(PROXY_A, 0.5);
        pool.report_success(PROXY_A, 0.6);

        // A later refresh cycle re-validating the same proxy must not reset
        // its history; apply the same insert guard refresh uses.
        {
            let mut state = pool.state.lock();
            if !state.proxies.contains_key(PROXY_A) {
                state.proxies.insert(PROXY_A.to_string(), ProxyMetrics::new());
            }
        }
        let state = pool.state.lock();
        assert_eq!(state.proxies[PROXY_A].successes, 2);
        assert_eq!(state.proxies[PROXY_A].total_requests, 2);
    }

    #[test]
    fn test_uniform_fallback_when_single_proxy() {
        let pool = pool_with(PoolConfig::default());
        admit(&pool, PROXY_A, 0.8);
        pool.rebuild_pool();
        let state = pool.state.lock();
        assert_eq!(state.weighted_pool.len(), 1);
        assert!((state.weighted_pool[0].1 - 1.0).abs() < f64::EPSILON);
    }
}
