// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential precedence for realtime candidates.
//!
//! API-key connections: connection key, then environment, then the global
//! provider default. OAuth connections: connection key, then an environment
//! access token, then the stored OAuth token (silently refreshed when stale).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::GateError;
use crate::oauth::login::LoginCoordinator;
use crate::provider::Provider;
use crate::realtime::candidate::RealtimeCandidate;
use crate::redact::mask_token;
use crate::token::{epoch_ms, is_usable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthSource {
    #[default]
    #[serde(rename = "api_key")]
    ApiKey,
    #[serde(rename = "oauth")]
    OAuth,
}

/// Where a resolved secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    Connection,
    Environment,
    ProviderDefault,
    OAuthToken,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredential {
    pub secret: String,
    pub source: AuthSource,
    pub origin: CredentialOrigin,
}

impl fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("secret", &mask_token(&self.secret))
            .field("source", &self.source)
            .field("origin", &self.origin)
            .finish()
    }
}

/// `VOICEGATE_*` and vendor environment variables, captured once.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    vars: HashMap<String, String>,
}

impl EnvOverrides {
    /// Snapshot the relevant variables of the current process.
    pub fn from_process() -> Self {
        let vars = std::env::vars()
            .filter(|(key, _)| {
                key.starts_with("VOICEGATE_")
                    || Provider::ALL.iter().any(|p| p.vendor_env_key() == key.as_str())
            })
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn scoped(&self, provider: Provider, suffix: &str) -> Option<&str> {
        self.lookup(&format!("{}_{suffix}", provider.env_prefix()))
    }

    /// `VOICEGATE_<P>_API_KEY`, then the vendor's own variable.
    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        self.scoped(provider, "API_KEY").or_else(|| self.lookup(provider.vendor_env_key()))
    }

    /// `VOICEGATE_<P>_ACCESS_TOKEN`, an OAuth bearer supplied out of band.
    pub fn access_token(&self, provider: Provider) -> Option<&str> {
        self.scoped(provider, "ACCESS_TOKEN")
    }

    pub fn endpoint(&self, provider: Provider) -> Option<&str> {
        self.scoped(provider, "ENDPOINT")
    }

    pub fn deployment(&self, provider: Provider) -> Option<&str> {
        self.scoped(provider, "DEPLOYMENT")
    }

    pub fn model(&self, provider: Provider) -> Option<&str> {
        self.scoped(provider, "MODEL")
    }
}

/// Resolves the secret a candidate would present.
pub struct CredentialResolver {
    env: EnvOverrides,
    default_keys: RwLock<BTreeMap<Provider, String>>,
    login: Arc<LoginCoordinator>,
}

impl CredentialResolver {
    pub fn new(env: EnvOverrides, login: Arc<LoginCoordinator>) -> Self {
        Self { env, default_keys: RwLock::new(BTreeMap::new()), login }
    }

    pub fn env(&self) -> &EnvOverrides {
        &self.env
    }

    /// Replace the global per-provider keys (from settings).
    pub async fn set_default_keys(&self, keys: BTreeMap<Provider, String>) {
        *self.default_keys.write().await = keys;
    }

    /// The candidate's secret, or `None` if it has no usable credential.
    ///
    /// May refresh a stale OAuth token over the network. A failed refresh or
    /// an unreadable token store is an error, not a missing credential.
    pub async fn resolve(
        &self,
        candidate: &RealtimeCandidate,
    ) -> Result<Option<ResolvedCredential>, GateError> {
        if let Some(cred) = self.resolve_static(candidate).await {
            return Ok(Some(cred));
        }
        if candidate.auth_source != AuthSource::OAuth {
            return Ok(None);
        }
        match self.login.ensure_fresh(candidate.provider).await {
            Ok(token) => Ok(token.map(|token| ResolvedCredential {
                secret: token.access_token,
                source: AuthSource::OAuth,
                origin: CredentialOrigin::OAuthToken,
            })),
            Err(GateError::NoRefreshToken(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Cheap availability check: never touches the network. A stale token
    /// with a refresh token counts as available.
    pub async fn is_available(&self, candidate: &RealtimeCandidate) -> bool {
        if self.resolve_static(candidate).await.is_some() {
            return true;
        }
        if candidate.auth_source != AuthSource::OAuth {
            return false;
        }
        match self.login.stored_token(candidate.provider).await {
            Ok(Some(token)) => is_usable(&token, epoch_ms()) || token.refresh_token.is_some(),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(provider = %candidate.provider, err = %e, "token store unreadable");
                false
            }
        }
    }

    /// Sources that need no token store: connection key, environment, global default.
    async fn resolve_static(&self, candidate: &RealtimeCandidate) -> Option<ResolvedCredential> {
        let provider = candidate.provider;
        let source = candidate.auth_source;
        let found = |secret: &str, origin| ResolvedCredential { secret: secret.to_owned(), source, origin };

        if let Some(key) = candidate.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            return Some(found(key, CredentialOrigin::Connection));
        }
        match source {
            AuthSource::ApiKey => {
                if let Some(key) = self.env.api_key(provider) {
                    return Some(found(key, CredentialOrigin::Environment));
                }
                let defaults = self.default_keys.read().await;
                let default_key = defaults
                    .get(&provider)
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty())
                    .map(|k| found(k, CredentialOrigin::ProviderDefault));
                default_key
            }
            AuthSource::OAuth => {
                self.env.access_token(provider).map(|t| found(t, CredentialOrigin::Environment))
            }
        }
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
