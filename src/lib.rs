//! Proxy Rotor - Rotating proxy pool
//!
//! A concurrent proxy pool manager that fetches candidate proxies from
//! pluggable providers, validates them against live test endpoints, scores
//! them by a blended reliability metric, quarantines failing proxies with
//! time-based release, and serves weighted-random selections.

pub mod config;
pub mod error;
pub mod pool;

pub use config::{PaidProviderConfig, PoolConfig};
pub use error::{Error, Result};
pub use pool::{PoolStats, ProxyPool};
