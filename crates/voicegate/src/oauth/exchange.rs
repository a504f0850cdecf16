// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Form-encoded token endpoint calls: code exchange and refresh.

use serde::Deserialize;
use serde_json::Value;

use super::provider::ProviderConfig;
use crate::error::GateError;
use crate::redact;
use crate::token::TokenPayload;

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Seconds. Some providers send this as a string.
    #[serde(default)]
    pub expires_in: Option<Value>,
}

impl TokenResponse {
    /// Convert to a store payload with an absolute expiry.
    pub fn into_payload(self, now_ms: u64) -> TokenPayload {
        let expires_at = self
            .expires_in
            .as_ref()
            .and_then(lossy_u64)
            .filter(|secs| *secs > 0)
            .map(|secs| now_ms.saturating_add(secs.saturating_mul(1000)));
        TokenPayload {
            access_token: self.access_token.trim().to_owned(),
            refresh_token: self.refresh_token.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty()),
            token_type: self.token_type,
            expires_at,
        }
    }
}

/// OAuth error body (`{"error": ..., "error_description": ...}`).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange an authorization code for tokens using the attempt's verifier.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ProviderConfig,
    code: &str,
    code_verifier: &str,
) -> Result<TokenResponse, GateError> {
    let redirect_uri = config.redirect_uri();
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("client_id", config.client_id.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri.as_str()),
        ("code_verifier", code_verifier),
    ];
    if let Some(ref secret) = config.client_secret {
        form.push(("client_secret", secret.as_str()));
    }
    post_token_form(client, &config.token_url, &form).await
}

/// Trade a refresh token for a new access token.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &ProviderConfig,
    refresh_token: &str,
) -> Result<TokenResponse, GateError> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("client_id", config.client_id.as_str()),
        ("refresh_token", refresh_token),
    ];
    if let Some(ref secret) = config.client_secret {
        form.push(("client_secret", secret.as_str()));
    }
    post_token_form(client, &config.token_url, &form).await
}

async fn post_token_form(
    client: &reqwest::Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, GateError> {
    let resp = client
        .post(token_url)
        .header("Accept", "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| GateError::ExchangeFailure {
            status: None,
            message: redact::redact(&format!("{e:#}")),
        })?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(GateError::ExchangeFailure {
            status: Some(status.as_u16()),
            message: error_message(&text),
        });
    }

    let token: TokenResponse =
        serde_json::from_str(&text).map_err(|e| GateError::ExchangeFailure {
            status: Some(status.as_u16()),
            message: format!("unreadable token response: {e}"),
        })?;
    if token.access_token.trim().is_empty() {
        return Err(GateError::ExchangeFailure {
            status: Some(status.as_u16()),
            message: "token response missing access_token".to_owned(),
        });
    }
    Ok(token)
}

/// Human-readable, secret-free summary of a token endpoint error body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(desc) if !desc.is_empty() => redact::redact(&format!("{}: {desc}", err.error)),
            _ => redact::redact(&err.error),
        },
        Err(_) if body.trim().is_empty() => "empty response body".to_owned(),
        Err(_) => redact::snippet(body),
    }
}

fn lossy_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f.max(0.0) as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
