//! Proxy pool subsystem
//!
//! This module provides functionality for:
//! - Fetching candidate proxies from free-list and paid providers
//! - Validating candidates against live test endpoints with bounded concurrency
//! - Tracking per-proxy reliability metrics with time-based quarantine
//! - Serving weighted-random selections from a rotation pool

pub mod manager;
pub mod metrics;
pub mod parse;
pub mod provider;
pub mod validator;

pub use manager::{PoolStats, ProxyPool};
pub use metrics::ProxyMetrics;
pub use provider::{FreeListProvider, PaidProvider, ProxyProvider};
pub use validator::{random_user_agent, ProxyValidator, ValidationResult};
