// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser sign-in lifecycle: one pending login per provider.
//!
//! A login moves Idle (no record) -> Pending -> Complete | Error. Terminal
//! records stay until a new `start`, `cancel`, or `logout` replaces them.
//! Each attempt carries an id; results from a superseded attempt are dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::browser::BrowserOpener;
use super::callback::{CallbackListener, CallbackOutcome};
use super::exchange;
use super::pkce::{self, PkceSession};
use super::provider::{ProviderConfig, ProviderRegistry};
use crate::error::GateError;
use crate::provider::Provider;
use crate::token::store::TokenStore;
use crate::token::{epoch_ms, is_usable, StoredToken};

/// Abandoned logins are cleared after this long.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPhase {
    Idle,
    Pending,
    Complete,
    Error,
}

/// Snapshot reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginStatus {
    pub provider: Provider,
    pub phase: LoginPhase,
    /// A usable token is stored for the provider.
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum LoginState {
    Pending { attempt: Uuid, started_at: Instant, listener: Option<CallbackListener> },
    Complete { attempt: Uuid },
    Error { attempt: Uuid, code: &'static str, message: String },
}

impl LoginState {
    fn attempt(&self) -> Uuid {
        match self {
            Self::Pending { attempt, .. } | Self::Complete { attempt } | Self::Error { attempt, .. } => {
                *attempt
            }
        }
    }

    fn take_listener(&mut self) -> Option<CallbackListener> {
        match self {
            Self::Pending { listener, .. } => listener.take(),
            _ => None,
        }
    }
}

/// Owns the pending-login registry and the OAuth HTTP client.
pub struct LoginCoordinator {
    registry: ProviderRegistry,
    store: Arc<TokenStore>,
    http: reqwest::Client,
    browser: Arc<dyn BrowserOpener>,
    login_timeout: Duration,
    logins: Mutex<HashMap<Provider, LoginState>>,
    /// Serializes `start` so cancel-then-rebind of a fixed port cannot interleave.
    start_lock: Mutex<()>,
    refresh_lock: Mutex<()>,
    changed: watch::Sender<u64>,
}

impl LoginCoordinator {
    pub fn new(
        registry: ProviderRegistry,
        store: Arc<TokenStore>,
        http: reqwest::Client,
        browser: Arc<dyn BrowserOpener>,
        login_timeout: Duration,
    ) -> Arc<Self> {
        let (changed, _) = watch::channel(0);
        Arc::new(Self {
            registry,
            store,
            http,
            browser,
            login_timeout,
            logins: Mutex::new(HashMap::new()),
            start_lock: Mutex::new(()),
            refresh_lock: Mutex::new(()),
            changed,
        })
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Begin a browser sign-in and return the authorize URL without waiting
    /// for the user. Any pending login for the provider is cancelled first.
    pub async fn start(self: &Arc<Self>, provider: Provider) -> Result<String, GateError> {
        let config = self.registry.get(provider)?.clone();
        if config.client_id.trim().is_empty() {
            return Err(GateError::Validation(format!(
                "no OAuth client id configured for {provider}"
            )));
        }

        let _start = self.start_lock.lock().await;
        self.cancel(provider).await;

        let session = PkceSession::generate();
        let authorize_url = pkce::build_auth_url(&config, &session)?;
        let attempt = Uuid::new_v4();
        let bound =
            CallbackListener::bind(config.listener_port, &config.callback_path, session.state.clone())
                .await;
        let (listener, outcome_rx) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                tracing::warn!(provider = %provider, err = %e, "oauth login could not start");
                self.logins.lock().await.insert(
                    provider,
                    LoginState::Error { attempt, code: e.code(), message: e.to_string() },
                );
                self.notify();
                return Err(e);
            }
        };
        let stop = listener.shutdown_token();
        let port = listener.local_addr().port();
        self.logins.lock().await.insert(
            provider,
            LoginState::Pending { attempt, started_at: Instant::now(), listener: Some(listener) },
        );
        self.notify();
        tracing::info!(provider = %provider, port, "oauth login started");

        let this = Arc::clone(self);
        let verifier = session.code_verifier;
        tokio::spawn(async move {
            this.drive(provider, attempt, config, verifier, outcome_rx, stop).await;
        });

        if let Err(e) = self.browser.open(&authorize_url) {
            tracing::warn!(provider = %provider, err = %e, "open the authorize URL manually");
        }
        Ok(authorize_url)
    }

    /// Wait for the callback, then exchange the code. Runs detached from `start`.
    async fn drive(
        self: Arc<Self>,
        provider: Provider,
        attempt: Uuid,
        config: ProviderConfig,
        code_verifier: String,
        outcome_rx: oneshot::Receiver<CallbackOutcome>,
        stop: CancellationToken,
    ) {
        let outcome = tokio::select! {
            res = outcome_rx => match res {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::debug!(provider = %provider, "callback listener closed before redirect");
                    return;
                }
            },
            _ = tokio::time::sleep(self.login_timeout) => {
                stop.cancel();
                tracing::warn!(provider = %provider, "oauth login timed out");
                self.expire(provider, attempt).await;
                return;
            }
        };

        let code = match outcome {
            CallbackOutcome::Code(code) => code,
            CallbackOutcome::Denied { error, description } => {
                let message = match description {
                    Some(desc) => format!("{error}: {desc}"),
                    None => error,
                };
                tracing::warn!(provider = %provider, %message, "provider refused sign-in");
                let next = LoginState::Error { attempt, code: "provider_error", message };
                self.settle(provider, next).await;
                return;
            }
            CallbackOutcome::Rejected(violation) => {
                tracing::warn!(provider = %provider, %violation, "oauth callback rejected");
                let err = GateError::ProtocolViolation(violation);
                let next = LoginState::Error { attempt, code: err.code(), message: err.to_string() };
                self.settle(provider, next).await;
                return;
            }
        };

        // Not raced against cancellation; a superseded result is dropped below.
        let result = exchange::exchange_code(&self.http, &config, &code, &code_verifier).await;

        let mut logins = self.logins.lock().await;
        if logins.get(&provider).map(LoginState::attempt) != Some(attempt) {
            tracing::debug!(provider = %provider, "ignoring stale oauth exchange result");
            return;
        }
        let next = match result {
            Ok(token) => match self.store.put(provider, token.into_payload(epoch_ms())).await {
                Ok(_) => {
                    tracing::info!(provider = %provider, "oauth login complete");
                    LoginState::Complete { attempt }
                }
                Err(e) => {
                    tracing::warn!(provider = %provider, err = %e, "could not store oauth token");
                    LoginState::Error { attempt, code: e.code(), message: e.to_string() }
                }
            },
            Err(e) => {
                tracing::warn!(provider = %provider, err = %e, "oauth token exchange failed");
                LoginState::Error { attempt, code: e.code(), message: e.to_string() }
            }
        };
        let replaced = logins.insert(provider, next);
        drop(logins);
        close_listener(replaced).await;
        self.notify();
    }

    /// Replace the record for `next`'s attempt. No-op if the attempt was superseded.
    async fn settle(&self, provider: Provider, next: LoginState) {
        let mut logins = self.logins.lock().await;
        if logins.get(&provider).map(LoginState::attempt) != Some(next.attempt()) {
            tracing::debug!(provider = %provider, "ignoring stale oauth callback result");
            return;
        }
        let replaced = logins.insert(provider, next);
        drop(logins);
        close_listener(replaced).await;
        self.notify();
    }

    /// Drop a timed-out pending record, returning the provider to Idle.
    async fn expire(&self, provider: Provider, attempt: Uuid) {
        let mut logins = self.logins.lock().await;
        let is_pending = matches!(
            logins.get(&provider),
            Some(LoginState::Pending { attempt: current, .. }) if *current == attempt
        );
        if !is_pending {
            return;
        }
        let removed = logins.remove(&provider);
        drop(logins);
        close_listener(removed).await;
        self.notify();
    }

    /// Current login phase plus whether a usable token is stored.
    pub async fn status(&self, provider: Provider) -> Result<LoginStatus, GateError> {
        let mut logins = self.logins.lock().await;
        let abandoned = matches!(
            logins.get(&provider),
            Some(LoginState::Pending { started_at, .. }) if started_at.elapsed() >= self.login_timeout
        );
        let removed = if abandoned {
            tracing::info!(provider = %provider, "clearing abandoned oauth login");
            logins.remove(&provider)
        } else {
            None
        };

        let (phase, error_code, error) = match logins.get(&provider) {
            None => (LoginPhase::Idle, None, None),
            Some(LoginState::Pending { .. }) => (LoginPhase::Pending, None, None),
            Some(LoginState::Complete { .. }) => (LoginPhase::Complete, None, None),
            Some(LoginState::Error { code, message, .. }) => {
                (LoginPhase::Error, Some((*code).to_owned()), Some(message.clone()))
            }
        };
        drop(logins);
        if removed.is_some() {
            close_listener(removed).await;
            self.notify();
        }

        let connected = match self.store.get(provider).await? {
            Some(token) => is_usable(&token, epoch_ms()),
            None => false,
        };
        Ok(LoginStatus { provider, phase, connected, error_code, error })
    }

    /// Block until the login leaves Pending or `timeout` elapses.
    pub async fn wait(&self, provider: Provider, timeout: Duration) -> Result<LoginStatus, GateError> {
        let mut rx = self.changed.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.status(provider).await?;
            if status.phase != LoginPhase::Pending {
                return Ok(status);
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Ok(status),
            }
        }
    }

    /// Abandon any login for `provider` and release its listener.
    /// Returns true if a pending attempt was cancelled.
    pub async fn cancel(&self, provider: Provider) -> bool {
        let removed = self.logins.lock().await.remove(&provider);
        let was_pending = matches!(removed, Some(LoginState::Pending { .. }));
        if removed.is_some() {
            close_listener(removed).await;
            self.notify();
        }
        if was_pending {
            tracing::info!(provider = %provider, "oauth login cancelled");
        }
        was_pending
    }

    /// Cancel any login and delete the stored token.
    pub async fn logout(&self, provider: Provider) -> Result<bool, GateError> {
        self.cancel(provider).await;
        let removed = self.store.remove(provider).await?;
        self.notify();
        tracing::info!(provider = %provider, removed, "signed out");
        Ok(removed)
    }

    /// The stored record, usable or not.
    pub async fn stored_token(&self, provider: Provider) -> Result<Option<StoredToken>, GateError> {
        self.store.get(provider).await
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self, provider: Provider) -> Result<StoredToken, GateError> {
        let config = self.registry.get(provider)?;
        let _guard = self.refresh_lock.lock().await;
        self.store.reload().await?;
        self.refresh_locked(provider, config).await
    }

    /// Return a usable token, refreshing a stale one when a refresh token exists.
    /// `Ok(None)` when nothing usable can be produced without user interaction.
    pub async fn ensure_fresh(&self, provider: Provider) -> Result<Option<StoredToken>, GateError> {
        let Some(token) = self.store.get(provider).await? else {
            return Ok(None);
        };
        if is_usable(&token, epoch_ms()) {
            return Ok(Some(token));
        }
        let Ok(config) = self.registry.get(provider) else {
            return Ok(None);
        };
        if token.refresh_token.is_none() {
            return Ok(None);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        self.store.reload().await?;
        if let Some(current) = self.store.get(provider).await? {
            if is_usable(&current, epoch_ms()) {
                return Ok(Some(current));
            }
        }
        self.refresh_locked(provider, config).await.map(Some)
    }

    async fn refresh_locked(
        &self,
        provider: Provider,
        config: &ProviderConfig,
    ) -> Result<StoredToken, GateError> {
        let previous = self.store.get(provider).await?;
        let Some(refresh_token) = previous.and_then(|t| t.refresh_token) else {
            return Err(GateError::NoRefreshToken(provider.to_string()));
        };

        let response = exchange::refresh_token(&self.http, config, &refresh_token)
            .await
            .inspect_err(|e| tracing::warn!(provider = %provider, err = %e, "token refresh failed"))?;
        let mut payload = response.into_payload(epoch_ms());
        if payload.refresh_token.is_none() {
            payload.refresh_token = Some(refresh_token);
        }
        let token = self.store.put(provider, payload).await?;
        tracing::info!(provider = %provider, expires_at = ?token.expires_at, "refreshed oauth token");
        self.notify();
        Ok(token)
    }

    fn notify(&self) {
        self.changed.send_modify(|generation| *generation += 1);
    }
}

async fn close_listener(state: Option<LoginState>) {
    if let Some(listener) = state.and_then(|mut s| s.take_listener()) {
        listener.close().await;
    }
}

#[cfg(test)]
#[path = "login_tests.rs"]
mod tests;
