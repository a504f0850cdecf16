// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memoized runtime view: settings, environment overrides and offline credential checks.
//!
//! The view is rebuilt wholesale when its TTL lapses, when the token store is
//! written (tracked through the store generation), or on `invalidate()`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::credential::{AuthSource, CredentialResolver, EnvOverrides};
use crate::error::GateError;
use crate::oauth::login::{LoginCoordinator, LoginPhase};
use crate::provider::Provider;
use crate::realtime::candidate::{order_candidates, RealtimeCandidate};
use crate::realtime::negotiator::FailoverPolicy;
use crate::settings::VoiceSettings;
use crate::token::store::TokenStore;

/// Per-provider summary for a setup UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: Provider,
    /// At least one candidate for the provider has a usable credential.
    pub configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_source: Option<AuthSource>,
    pub oauth_supported: bool,
    pub login: LoginPhase,
    /// A usable OAuth token is stored.
    pub connected: bool,
}

/// Snapshot of everything session negotiation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRuntimeConfig {
    /// Usable candidates in failover order.
    pub candidates: Vec<RealtimeCandidate>,
    pub failover: FailoverPolicy,
    pub instructions: Option<String>,
    pub providers: Vec<ProviderStatus>,
}

struct CachedView {
    built_at: Instant,
    generation: u64,
    view: Arc<VoiceRuntimeConfig>,
}

pub struct RuntimeConfigCache {
    settings_path: PathBuf,
    resolver: Arc<CredentialResolver>,
    login: Arc<LoginCoordinator>,
    store: Arc<TokenStore>,
    ttl: Duration,
    cached: Mutex<Option<CachedView>>,
}

impl RuntimeConfigCache {
    pub fn new(
        settings_path: impl Into<PathBuf>,
        resolver: Arc<CredentialResolver>,
        login: Arc<LoginCoordinator>,
        store: Arc<TokenStore>,
        ttl: Duration,
    ) -> Self {
        Self { settings_path: settings_path.into(), resolver, login, store, ttl, cached: Mutex::new(None) }
    }

    /// The cached view, rebuilding it if stale.
    pub async fn current(&self) -> Result<Arc<VoiceRuntimeConfig>, GateError> {
        let mut cached = self.cached.lock().await;
        let generation = self.store.generation();
        if let Some(ref entry) = *cached {
            if entry.generation == generation && entry.built_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.view));
            }
        }

        let view = Arc::new(self.build().await?);
        // Building may itself refresh tokens; key on the generation seen afterwards.
        *cached = Some(CachedView {
            built_at: Instant::now(),
            generation: self.store.generation(),
            view: Arc::clone(&view),
        });
        Ok(view)
    }

    /// Drop the cached view so the next `current()` rebuilds.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn build(&self) -> Result<VoiceRuntimeConfig, GateError> {
        let settings = VoiceSettings::load(&self.settings_path)
            .map_err(|e| GateError::Config(format!("{}: {e:#}", self.settings_path.display())))?;
        self.resolver.set_default_keys(settings.provider_keys.clone()).await;

        let env = self.resolver.env();
        let mut candidates: Vec<RealtimeCandidate> =
            settings.connections.iter().cloned().map(|c| apply_env(c, env)).collect();
        for provider in Provider::ALL {
            if candidates.iter().any(|c| c.provider == provider) {
                continue;
            }
            if let Some(implicit) = self.implicit_candidate(provider).await {
                tracing::debug!(provider = %provider, auth = ?implicit.auth_source, "implicit connection");
                candidates.push(implicit);
            }
        }

        let mut usable = Vec::with_capacity(candidates.len());
        for candidate in order_candidates(candidates) {
            if candidate.is_complete() && self.resolver.is_available(&candidate).await {
                usable.push(candidate);
            }
        }

        let mut providers = Vec::with_capacity(Provider::ALL.len());
        for provider in Provider::ALL {
            let login = self.login.status(provider).await?;
            let first = usable.iter().find(|c| c.provider == provider);
            providers.push(ProviderStatus {
                provider,
                configured: first.is_some(),
                auth_source: first.map(|c| c.auth_source),
                oauth_supported: self.login.registry().supports(provider),
                login: login.phase,
                connected: login.connected,
            });
        }

        tracing::debug!(candidates = usable.len(), "runtime config rebuilt");
        Ok(VoiceRuntimeConfig {
            candidates: usable,
            failover: settings.failover,
            instructions: settings.instructions,
            providers,
        })
    }

    /// A connection synthesized from environment, default keys or a stored
    /// OAuth token for a provider with no configured connection.
    async fn implicit_candidate(&self, provider: Provider) -> Option<RealtimeCandidate> {
        let env = self.resolver.env();
        let api_key = apply_env(RealtimeCandidate::new(provider, AuthSource::ApiKey), env);
        if api_key.is_complete() && self.resolver.is_available(&api_key).await {
            return Some(api_key);
        }
        if !self.login.registry().supports(provider) && env.access_token(provider).is_none() {
            return None;
        }
        let oauth = apply_env(RealtimeCandidate::new(provider, AuthSource::OAuth), env);
        (oauth.is_complete() && self.resolver.is_available(&oauth).await).then_some(oauth)
    }
}

/// Fill fields the connection leaves unset from `VOICEGATE_<P>_*`.
fn apply_env(mut candidate: RealtimeCandidate, env: &EnvOverrides) -> RealtimeCandidate {
    let provider = candidate.provider;
    fill(&mut candidate.endpoint, env.endpoint(provider));
    fill(&mut candidate.deployment_name, env.deployment(provider));
    fill(&mut candidate.model, env.model(provider));
    candidate
}

fn fill(slot: &mut Option<String>, value: Option<&str>) {
    if !slot.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        if let Some(value) = value {
            *slot = Some(value.to_owned());
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
