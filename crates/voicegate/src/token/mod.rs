// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted OAuth tokens, one record per provider.

pub mod persist;
pub mod store;

use serde::{Deserialize, Serialize};

/// Tokens expiring within this window are treated as already expired.
pub const EXPIRY_MARGIN_MS: u64 = 30_000;

/// A provider's stored OAuth grant. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub updated_at: u64,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

/// Fields written by a token exchange or refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenPayload {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_at: Option<u64>,
}

/// Whether `token` can still be presented at `now_ms`.
///
/// A token with no expiry is always usable.
pub fn is_usable(token: &StoredToken, now_ms: u64) -> bool {
    match token.expires_at {
        None => true,
        Some(expires_at) => expires_at.saturating_sub(EXPIRY_MARGIN_MS) > now_ms,
    }
}

/// Current time as epoch milliseconds.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
