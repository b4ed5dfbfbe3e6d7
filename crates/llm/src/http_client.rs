//! HTTP Client Factory
//!
//! Provides a factory function for building reqwest clients with the fixed
//! request timeout the investigation's resource model requires: model calls
//! are blocking network operations, so every request carries the same
//! deadline instead of waiting indefinitely.

use std::time::Duration;

/// Build a `reqwest::Client` with a fixed per-request timeout.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build reqwest client")
}
