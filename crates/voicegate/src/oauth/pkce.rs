// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth authorization code + PKCE (RFC 7636) helpers.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::Url;
use sha2::{Digest, Sha256};

use super::provider::ProviderConfig;
use crate::error::GateError;

/// Verifier, challenge and CSRF state for one login attempt. Never reused.
#[derive(Debug, Clone)]
pub struct PkceSession {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl PkceSession {
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = compute_code_challenge(&code_verifier);
        Self { code_verifier, code_challenge, state: generate_state() }
    }
}

/// Generate a PKCE code verifier (43-128 char URL-safe random string).
pub fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute code_challenge = base64url_nopad(sha256(verifier)).
pub fn compute_code_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state parameter (32 bytes, 43 chars).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the authorization URL with PKCE parameters and provider extras.
pub fn build_auth_url(config: &ProviderConfig, session: &PkceSession) -> Result<String, GateError> {
    let mut url = Url::parse(&config.authorize_url).map_err(|e| {
        GateError::Validation(format!("bad authorize url {}: {e}", config.authorize_url))
    })?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", &config.redirect_uri())
            .append_pair("scope", &config.scope())
            .append_pair("state", &session.state)
            .append_pair("code_challenge", &session.code_challenge)
            .append_pair("code_challenge_method", "S256");
        for (key, value) in &config.extra_params {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

#[cfg(test)]
#[path = "pkce_tests.rs"]
mod tests;
