// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use crate::credential::AuthSource;
use crate::provider::Provider;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateRole {
    Primary,
    #[default]
    Fallback,
}

/// One configured realtime connection; a link in the failover chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeCandidate {
    pub provider: Provider,
    /// Endpoint override. Required for Azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Explicit per-connection key; wins over every other source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub auth_source: AuthSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Azure deployment; also selects GA vs preview protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub role: CandidateRole,
    #[serde(default)]
    pub weight: i32,
}

impl RealtimeCandidate {
    pub fn new(provider: Provider, auth_source: AuthSource) -> Self {
        Self {
            provider,
            endpoint: None,
            api_key: None,
            auth_source,
            model: None,
            deployment_name: None,
            voice_id: None,
            role: CandidateRole::Fallback,
            weight: 0,
        }
    }

    /// Whether the connection has every field its provider needs to build a request.
    pub fn is_complete(&self) -> bool {
        match self.provider {
            Provider::Azure => {
                non_blank(self.endpoint.as_deref()) && non_blank(self.deployment_name.as_deref())
            }
            Provider::OpenAi | Provider::Gemini => true,
        }
    }

    /// Short label for logs, e.g. `azure/gpt-realtime`.
    pub fn label(&self) -> String {
        match self.deployment_name.as_deref().or(self.model.as_deref()) {
            Some(name) => format!("{}/{name}", self.provider),
            None => self.provider.to_string(),
        }
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Primary first, then by descending weight. Stable for ties.
pub fn order_candidates(mut candidates: Vec<RealtimeCandidate>) -> Vec<RealtimeCandidate> {
    candidates.sort_by_key(|c| (c.role != CandidateRole::Primary, std::cmp::Reverse(c.weight)));
    candidates
}

#[cfg(test)]
#[path = "candidate_tests.rs"]
mod tests;
