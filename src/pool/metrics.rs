//! Per-proxy performance metrics and reliability scoring

use std::collections::VecDeque;
use std::time::Instant;

/// Weight of the success rate in the blended reliability score
const SUCCESS_WEIGHT: f64 = 0.7;

/// Weight of the latency component in the blended reliability score
const TIME_WEIGHT: f64 = 0.3;

/// Latency in seconds considered fully acceptable for scraping workloads
const LATENCY_BASELINE_SECS: f64 = 2.0;

/// Seconds of extra latency over the baseline that drive the time score to zero
const LATENCY_RANGE_SECS: f64 = 10.0;

/// Floor of the reliability score; keeps poor proxies selectable so they can
/// recover instead of being starved
const SCORE_FLOOR: f64 = 0.1;

/// Performance metrics for a single proxy
///
/// An entry exists only for proxies that passed validation at least once.
#[derive(Debug, Clone)]
pub struct ProxyMetrics {
    /// Failure count since the last reset
    pub failures: u32,
    pub successes: u64,
    pub total_requests: u64,
    /// Bounded latency history in seconds, oldest evicted first
    pub response_times: VecDeque<f64>,
    pub last_used: Option<Instant>,
    pub is_quarantined: bool,
    /// Meaningful only while quarantined
    pub quarantine_end: Option<Instant>,
    /// Cached score from the last pool rebuild
    pub reliability_score: f64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self {
            failures: 0,
            successes: 0,
            total_requests: 0,
            response_times: VecDeque::new(),
            last_used: None,
            is_quarantined: false,
            quarantine_end: None,
            reliability_score: 1.0,
        }
    }

    /// Append a latency sample, evicting the oldest beyond `capacity`
    pub fn push_response_time(&mut self, latency: f64, capacity: usize) {
        self.response_times.push_back(latency);
        while self.response_times.len() > capacity {
            self.response_times.pop_front();
        }
    }

    /// Mean latency over the recorded history
    pub fn avg_response_time(&self) -> Option<f64> {
        if self.response_times.is_empty() {
            return None;
        }
        Some(self.response_times.iter().sum::<f64>() / self.response_times.len() as f64)
    }

    /// Blended reliability score in `[0.1, 1.0]`
    ///
    /// Success rate dominates (70%) since outright failure costs more than
    /// slowness; the latency component treats anything under the 2s baseline
    /// as fully acceptable. An untested-but-validated proxy gets the
    /// optimistic prior of 1.0.
    pub fn score(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }

        let success_rate = self.successes as f64 / self.total_requests as f64;
        let time_score = match self.avg_response_time() {
            Some(avg) => (1.0 - (avg - LATENCY_BASELINE_SECS) / LATENCY_RANGE_SECS).max(0.0),
            None => 0.0,
        };

        (SUCCESS_WEIGHT * success_rate + TIME_WEIGHT * time_score).clamp(SCORE_FLOOR, 1.0)
    }

    /// Whether the quarantine window has elapsed
    pub fn quarantine_expired(&self, now: Instant) -> bool {
        match self.quarantine_end {
            Some(end) => now > end,
            None => true,
        }
    }
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn metrics_with(successes: u64, total: u64, latencies: &[f64]) -> ProxyMetrics {
        let mut m = ProxyMetrics::new();
        m.successes = successes;
        m.total_requests = total;
        for &l in latencies {
            m.push_response_time(l, 50);
        }
        m
    }

    #[test]
    fn test_untested_proxy_gets_optimistic_prior() {
        let m = metrics_with(0, 0, &[1.5]);
        assert_eq!(m.score(), 1.0);
    }

    #[test]
    fn test_score_clamped_to_floor() {
        // All failures, no latency history: raw score would be 0
        let m = metrics_with(0, 10, &[]);
        assert_eq!(m.score(), SCORE_FLOOR);
    }

    #[test]
    fn test_score_clamped_to_one() {
        // Perfect success rate and sub-baseline latency overshoots before clamping
        let m = metrics_with(10, 10, &[0.1]);
        assert_eq!(m.score(), 1.0);
    }

    #[test]
    fn test_score_monotonic_in_success_rate() {
        let latencies = [3.0, 3.0];
        let mut prev = f64::MIN;
        for successes in 0..=10 {
            let m = metrics_with(successes, 10, &latencies);
            let score = m.score();
            assert!(
                score >= prev,
                "score dropped from {} to {} at {} successes",
                prev,
                score,
                successes
            );
            prev = score;
        }
    }

    #[test]
    fn test_score_monotonic_in_latency() {
        let mut prev = f64::MAX;
        for latency in [1.0, 3.0, 5.0, 8.0, 12.0, 20.0] {
            let m = metrics_with(5, 10, &[latency]);
            let score = m.score();
            assert!(
                score <= prev,
                "score rose from {} to {} at {}s latency",
                prev,
                score,
                latency
            );
            prev = score;
        }
    }

    #[test]
    fn test_response_time_history_bounded_fifo() {
        let mut m = ProxyMetrics::new();
        for i in 0..60 {
            m.push_response_time(i as f64, 50);
        }
        assert_eq!(m.response_times.len(), 50);
        // Oldest samples evicted first
        assert_eq!(m.response_times.front(), Some(&10.0));
        assert_eq!(m.response_times.back(), Some(&59.0));
    }

    #[test]
    fn test_avg_response_time() {
        let m = metrics_with(0, 0, &[1.0, 2.0, 3.0]);
        assert_eq!(m.avg_response_time(), Some(2.0));
        assert_eq!(ProxyMetrics::new().avg_response_time(), None);
    }

    #[test]
    fn test_quarantine_expiry() {
        let mut m = ProxyMetrics::new();
        let now = Instant::now();
        m.is_quarantined = true;
        m.quarantine_end = Some(now + Duration::from_secs(600));
        assert!(!m.quarantine_expired(now));
        assert!(m.quarantine_expired(now + Duration::from_secs(601)));
    }
}
