// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use crate::error::GateError;

/// Install the ring-backed rustls provider. Idempotent.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Shared HTTP client for token and session endpoints.
pub fn client(timeout: Duration) -> Result<reqwest::Client, GateError> {
    install_crypto_provider();
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GateError::Config(format!("http client: {e}")))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
