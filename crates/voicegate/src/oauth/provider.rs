// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static OAuth descriptors for providers that support browser sign-in.

use std::collections::BTreeMap;

use crate::error::GateError;
use crate::provider::Provider;
use crate::settings::OAuthClientSettings;

/// Immutable per-provider OAuth contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub client_id: String,
    /// Absent for public (PKCE-only) clients.
    pub client_secret: Option<String>,
    pub authorize_url: String,
    pub token_url: String,
    /// Host placed in the redirect URI. The listener itself always binds 127.0.0.1.
    pub redirect_host: String,
    pub callback_path: String,
    pub listener_port: u16,
    pub scopes: Vec<String>,
    pub extra_params: Vec<(String, String)>,
}

impl ProviderConfig {
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}{}", self.redirect_host, self.listener_port, self.callback_path)
    }

    pub fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// OpenAI account sign-in (the ChatGPT/Codex public client).
    pub fn openai() -> Self {
        Self {
            provider: Provider::OpenAi,
            client_id: "app_EMoamEEZ73f0CkXaXp7hrann".to_owned(),
            client_secret: None,
            authorize_url: "https://auth.openai.com/oauth/authorize".to_owned(),
            token_url: "https://auth.openai.com/oauth/token".to_owned(),
            redirect_host: "localhost".to_owned(),
            callback_path: "/auth/callback".to_owned(),
            listener_port: 1455,
            scopes: ["openid", "profile", "email", "offline_access"].map(String::from).to_vec(),
            extra_params: vec![
                ("id_token_add_organizations".to_owned(), "true".to_owned()),
                ("codex_cli_simplified_flow".to_owned(), "true".to_owned()),
            ],
        }
    }

    /// Google sign-in for Gemini. The client id must be supplied through settings.
    pub fn gemini() -> Self {
        Self {
            provider: Provider::Gemini,
            client_id: String::new(),
            client_secret: None,
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_owned(),
            token_url: "https://oauth2.googleapis.com/token".to_owned(),
            redirect_host: "localhost".to_owned(),
            callback_path: "/oauth2callback".to_owned(),
            listener_port: 8085,
            scopes: [
                "https://www.googleapis.com/auth/cloud-platform",
                "https://www.googleapis.com/auth/generative-language.retriever",
                "https://www.googleapis.com/auth/userinfo.email",
            ]
            .map(String::from)
            .to_vec(),
            extra_params: vec![
                ("access_type".to_owned(), "offline".to_owned()),
                ("prompt".to_owned(), "consent".to_owned()),
            ],
        }
    }

    fn apply(&mut self, overrides: &OAuthClientSettings) {
        if let Some(ref id) = overrides.client_id {
            self.client_id = id.clone();
        }
        if let Some(ref secret) = overrides.client_secret {
            self.client_secret = Some(secret.clone());
        }
        if let Some(ref url) = overrides.authorize_url {
            self.authorize_url = url.clone();
        }
        if let Some(ref url) = overrides.token_url {
            self.token_url = url.clone();
        }
        if let Some(port) = overrides.listener_port {
            self.listener_port = port;
        }
    }
}

/// Lookup table of OAuth-capable providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: BTreeMap<Provider, ProviderConfig>,
}

impl ProviderRegistry {
    /// Built-in descriptors. Azure is API-key only and has no entry.
    pub fn builtin() -> Self {
        let providers = [ProviderConfig::openai(), ProviderConfig::gemini()]
            .into_iter()
            .map(|cfg| (cfg.provider, cfg))
            .collect();
        Self { providers }
    }

    /// Built-ins with settings overrides layered on top.
    pub fn with_overrides(overrides: &BTreeMap<Provider, OAuthClientSettings>) -> Self {
        let mut registry = Self::builtin();
        for (provider, settings) in overrides {
            if let Some(cfg) = registry.providers.get_mut(provider) {
                cfg.apply(settings);
            }
        }
        registry
    }

    /// Replace or add a descriptor.
    pub fn insert(&mut self, config: ProviderConfig) {
        self.providers.insert(config.provider, config);
    }

    pub fn get(&self, provider: Provider) -> Result<&ProviderConfig, GateError> {
        self.providers
            .get(&provider)
            .ok_or_else(|| GateError::UnknownProvider(format!("{provider} (no OAuth sign-in)")))
    }

    pub fn supports(&self, provider: Provider) -> bool {
        self.providers.contains_key(&provider)
    }
}
