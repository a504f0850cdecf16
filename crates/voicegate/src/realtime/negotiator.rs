// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential session negotiation across the ordered candidate chain.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::candidate::{order_candidates, RealtimeCandidate};
use super::classify::BootstrapFailure;
use super::client::SessionBootstrapper;
use super::{CallContext, SessionRequest};
use crate::credential::{CredentialResolver, ResolvedCredential};
use crate::endpoint::{self, AzureProtocol};
use crate::error::GateError;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailoverPolicy {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upper bound on bootstrap attempts per session. Zero behaves as one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_max_attempts() -> usize {
    3
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self { enabled: default_enabled(), max_attempts: default_max_attempts() }
    }
}

impl FailoverPolicy {
    /// Attempts to make given `usable` candidates.
    pub fn attempts(&self, usable: usize) -> usize {
        if self.enabled {
            self.max_attempts.max(1).min(usable)
        } else {
            usable.min(1)
        }
    }
}

/// A live session the client can connect to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Ephemeral credential for the signalling handshake.
    pub token: String,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub model: String,
    pub voice_id: String,
    pub provider: Provider,
    pub signalling_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_protocol: Option<AzureProtocol>,
    /// 1-based index of the attempt that succeeded.
    pub attempt: usize,
    #[serde(default)]
    pub context: CallContext,
}

impl std::fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("token", &crate::redact::mask_token(&self.token))
            .field("expires_at", &self.expires_at)
            .field("model", &self.model)
            .field("voice_id", &self.voice_id)
            .field("provider", &self.provider)
            .field("signalling_url", &self.signalling_url)
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// Walks the failover chain one candidate at a time.
pub struct RealtimeSessionNegotiator {
    resolver: Arc<CredentialResolver>,
    bootstrapper: Arc<dyn SessionBootstrapper>,
}

impl RealtimeSessionNegotiator {
    pub fn new(resolver: Arc<CredentialResolver>, bootstrapper: Arc<dyn SessionBootstrapper>) -> Self {
        Self { resolver, bootstrapper }
    }

    /// Open a session on the first candidate that accepts one.
    ///
    /// Candidates without a usable credential are skipped up front. A
    /// non-retryable failure aborts immediately; otherwise the next candidate
    /// is tried until the attempt budget is spent, and the last failure is
    /// returned. When no candidate is usable because a token refresh failed,
    /// that failure is returned instead of [`GateError::NotConfigured`].
    pub async fn create_session(
        &self,
        candidates: Vec<RealtimeCandidate>,
        policy: FailoverPolicy,
        request: &SessionRequest,
    ) -> Result<SessionDescriptor, GateError> {
        let mut usable: Vec<(RealtimeCandidate, ResolvedCredential)> = Vec::new();
        let mut credential_fault: Option<GateError> = None;
        for candidate in order_candidates(candidates) {
            if !candidate.is_complete() {
                tracing::debug!(candidate = %candidate.label(), "skipping incomplete connection");
                continue;
            }
            match self.resolver.resolve(&candidate).await {
                Ok(Some(credential)) => usable.push((candidate, credential)),
                Ok(None) => {
                    tracing::debug!(candidate = %candidate.label(), "no usable credential");
                }
                Err(e) => {
                    tracing::warn!(candidate = %candidate.label(), err = %e, "credential unavailable");
                    credential_fault = Some(e);
                }
            }
        }
        if usable.is_empty() {
            return Err(credential_fault.unwrap_or(GateError::NotConfigured));
        }

        let attempts = policy.attempts(usable.len());
        let mut last_failure: Option<(Provider, BootstrapFailure)> = None;

        for (index, (candidate, credential)) in usable.into_iter().take(attempts).enumerate() {
            let attempt = index + 1;
            let plan = endpoint::build_bootstrap(&candidate, &credential, request)?;
            tracing::debug!(
                candidate = %candidate.label(),
                attempt,
                url = %plan.request.url,
                "bootstrapping realtime session"
            );

            let result = self
                .bootstrapper
                .bootstrap(&plan.request)
                .await
                .and_then(|body| endpoint::parse_bootstrap_response(&plan, &body));
            let failure = match result {
                Ok(grant) => {
                    tracing::info!(
                        provider = %plan.provider,
                        model = %plan.model,
                        attempt,
                        "realtime session ready"
                    );
                    return Ok(SessionDescriptor {
                        token: grant.token,
                        expires_at: grant.expires_at,
                        model: plan.model,
                        voice_id: plan.voice_id,
                        provider: plan.provider,
                        signalling_url: plan.signalling_url,
                        azure_protocol: plan.azure_protocol,
                        attempt,
                        context: request.context.clone(),
                    });
                }
                Err(failure) => failure,
            };

            let retryable = failure.is_retryable();
            let more = policy.enabled && attempt < attempts;
            tracing::warn!(
                candidate = %candidate.label(),
                attempt,
                retryable,
                err = %failure,
                "realtime session bootstrap failed"
            );
            if !retryable || !more {
                return Err(GateError::SessionFailed {
                    provider: candidate.provider.to_string(),
                    failure,
                });
            }
            last_failure = Some((candidate.provider, failure));
        }

        // Unreachable in practice: the final attempt always returns above.
        match last_failure {
            Some((provider, failure)) => {
                Err(GateError::SessionFailed { provider: provider.to_string(), failure })
            }
            None => Err(GateError::NotConfigured),
        }
    }
}

#[cfg(test)]
#[path = "negotiator_tests.rs"]
mod tests;
