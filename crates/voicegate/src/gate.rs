// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::GateConfig;
use crate::credential::{CredentialResolver, EnvOverrides};
use crate::error::GateError;
use crate::http;
use crate::oauth::browser::{BrowserOpener, SystemBrowser};
use crate::oauth::login::{LoginCoordinator, LoginStatus};
use crate::oauth::provider::ProviderRegistry;
use crate::provider::Provider;
use crate::realtime::client::{HttpBootstrapper, SessionBootstrapper};
use crate::realtime::negotiator::{RealtimeSessionNegotiator, SessionDescriptor};
use crate::realtime::{CallContext, SessionRequest, ToolSpec};
use crate::runtime::{ProviderStatus, RuntimeConfigCache, VoiceRuntimeConfig};
use crate::settings::VoiceSettings;
use crate::token::store::TokenStore;
use crate::token::StoredToken;

/// Collaborators for [`VoiceGate::assemble`].
pub struct GateParts {
    pub settings_path: PathBuf,
    pub store: Arc<TokenStore>,
    pub registry: ProviderRegistry,
    pub browser: Arc<dyn BrowserOpener>,
    pub env: EnvOverrides,
    pub http: reqwest::Client,
    pub bootstrapper: Arc<dyn SessionBootstrapper>,
    pub login_timeout: Duration,
    pub runtime_ttl: Duration,
}

/// Owns the token store, login registry, runtime cache and negotiator.
pub struct VoiceGate {
    store: Arc<TokenStore>,
    login: Arc<LoginCoordinator>,
    runtime: RuntimeConfigCache,
    negotiator: RealtimeSessionNegotiator,
}

impl VoiceGate {
    /// Wire the production collaborators from process configuration.
    pub fn new(config: &GateConfig) -> Result<Self, GateError> {
        let settings_path = config.voice_config_path();
        let settings = VoiceSettings::load(&settings_path)
            .map_err(|e| GateError::Config(format!("{}: {e:#}", settings_path.display())))?;
        let http = http::client(config.http_timeout())?;

        Ok(Self::assemble(GateParts {
            settings_path,
            store: Arc::new(TokenStore::new(config.token_path(), config.token_cache_ttl())),
            registry: ProviderRegistry::with_overrides(&settings.oauth_clients),
            browser: Arc::new(SystemBrowser),
            env: EnvOverrides::from_process(),
            http: http.clone(),
            bootstrapper: Arc::new(HttpBootstrapper::new(http)),
            login_timeout: config.login_timeout(),
            runtime_ttl: config.runtime_cache_ttl(),
        }))
    }

    pub fn assemble(parts: GateParts) -> Self {
        let login = LoginCoordinator::new(
            parts.registry,
            Arc::clone(&parts.store),
            parts.http,
            parts.browser,
            parts.login_timeout,
        );
        let resolver = Arc::new(CredentialResolver::new(parts.env, Arc::clone(&login)));
        let runtime = RuntimeConfigCache::new(
            parts.settings_path,
            Arc::clone(&resolver),
            Arc::clone(&login),
            Arc::clone(&parts.store),
            parts.runtime_ttl,
        );
        let negotiator = RealtimeSessionNegotiator::new(resolver, parts.bootstrapper);
        Self { store: parts.store, login, runtime, negotiator }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Begin a browser sign-in; returns the authorize URL.
    pub async fn start_login(&self, provider: Provider) -> Result<String, GateError> {
        self.login.start(provider).await
    }

    pub async fn login_status(&self, provider: Provider) -> Result<LoginStatus, GateError> {
        self.login.status(provider).await
    }

    pub async fn wait_login(&self, provider: Provider, timeout: Duration) -> Result<LoginStatus, GateError> {
        self.login.wait(provider, timeout).await
    }

    pub async fn cancel_login(&self, provider: Provider) -> bool {
        self.login.cancel(provider).await
    }

    pub async fn logout(&self, provider: Provider) -> Result<bool, GateError> {
        let removed = self.login.logout(provider).await?;
        self.runtime.invalidate().await;
        Ok(removed)
    }

    pub async fn refresh(&self, provider: Provider) -> Result<StoredToken, GateError> {
        self.login.refresh(provider).await
    }

    pub async fn runtime(&self) -> Result<Arc<VoiceRuntimeConfig>, GateError> {
        self.runtime.current().await
    }

    /// Force the next session or status call to re-read settings.
    pub async fn reload_settings(&self) {
        self.runtime.invalidate().await;
    }

    pub async fn provider_statuses(&self) -> Result<Vec<ProviderStatus>, GateError> {
        Ok(self.runtime.current().await?.providers.clone())
    }

    /// Negotiate a realtime session over the current failover chain.
    pub async fn create_session(
        &self,
        tools: Vec<ToolSpec>,
        context: CallContext,
    ) -> Result<SessionDescriptor, GateError> {
        let view = self.runtime.current().await?;
        let request = SessionRequest { tools, context, instructions: view.instructions.clone() };
        self.negotiator.create_session(view.candidates.clone(), view.failover, &request).await
    }

    /// Cancel every pending login and release its listener.
    pub async fn shutdown(&self) {
        for provider in Provider::ALL {
            self.login.cancel(provider).await;
        }
    }
}
