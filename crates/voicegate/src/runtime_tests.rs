// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serde_json::json;

use super::*;
use crate::http;
use crate::oauth::browser::ManualBrowser;
use crate::oauth::login::DEFAULT_LOGIN_TIMEOUT;
use crate::oauth::provider::ProviderRegistry;
use crate::realtime::candidate::CandidateRole;
use crate::token::TokenPayload;

struct Fixture {
    dir: tempfile::TempDir,
    store: Arc<TokenStore>,
    cache: RuntimeConfigCache,
}

impl Fixture {
    fn settings_path(&self) -> PathBuf {
        self.dir.path().join("voice.json")
    }

    fn write_settings(&self, settings: serde_json::Value) {
        std::fs::write(self.settings_path(), settings.to_string()).expect("write settings");
    }
}

fn fixture(env: &[(&str, &str)], settings: Option<serde_json::Value>, ttl: Duration) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings_path = dir.path().join("voice.json");
    if let Some(settings) = settings {
        std::fs::write(&settings_path, settings.to_string()).expect("write settings");
    }
    let store = Arc::new(TokenStore::new(dir.path().join("tokens.json"), Duration::from_secs(5)));
    let login = LoginCoordinator::new(
        ProviderRegistry::builtin(),
        Arc::clone(&store),
        http::client(Duration::from_secs(5)).expect("http client"),
        Arc::new(ManualBrowser),
        DEFAULT_LOGIN_TIMEOUT,
    );
    let env = EnvOverrides::from_pairs(env.iter().map(|(k, v)| (*k, *v)));
    let resolver = Arc::new(CredentialResolver::new(env, Arc::clone(&login)));
    let cache = RuntimeConfigCache::new(settings_path, resolver, login, Arc::clone(&store), ttl);
    Fixture { dir, store, cache }
}

fn status_of(view: &VoiceRuntimeConfig, provider: Provider) -> &ProviderStatus {
    view.providers.iter().find(|p| p.provider == provider).expect("provider status")
}

#[tokio::test]
async fn configured_connections_are_ordered_and_filtered() -> anyhow::Result<()> {
    let f = fixture(
        &[],
        Some(json!({
            "connections": [
                { "provider": "openai", "api_key": "sk-low", "weight": 1 },
                { "provider": "azure", "api_key": "az-key" },
                { "provider": "gemini", "api_key": "g-key", "role": "primary" },
                { "provider": "openai", "api_key": "sk-high", "weight": 9 },
                { "provider": "openai" }
            ],
            "failover": { "enabled": true, "max_attempts": 2 },
            "instructions": "be brief"
        })),
        Duration::from_secs(60),
    );

    let view = f.cache.current().await?;

    let keys: Vec<_> = view.candidates.iter().map(|c| c.api_key.as_deref()).collect();
    // Azure lacks endpoint/deployment and the bare openai entry has no key.
    assert_eq!(keys, [Some("g-key"), Some("sk-high"), Some("sk-low")]);
    assert_eq!(view.candidates[0].role, CandidateRole::Primary);
    assert_eq!(view.failover, FailoverPolicy { enabled: true, max_attempts: 2 });
    assert_eq!(view.instructions.as_deref(), Some("be brief"));
    assert!(!status_of(&view, Provider::Azure).configured);
    Ok(())
}

#[tokio::test]
async fn environment_fills_missing_connection_fields() -> anyhow::Result<()> {
    let f = fixture(
        &[
            ("VOICEGATE_AZURE_ENDPOINT", "https://res.openai.azure.com/"),
            ("VOICEGATE_AZURE_DEPLOYMENT", "gpt-realtime"),
            ("VOICEGATE_OPENAI_MODEL", "env-model"),
        ],
        Some(json!({
            "connections": [
                { "provider": "azure", "api_key": "az-key" },
                { "provider": "openai", "api_key": "sk-a", "model": "pinned" }
            ]
        })),
        Duration::from_secs(60),
    );

    let view = f.cache.current().await?;

    let azure = view.candidates.iter().find(|c| c.provider == Provider::Azure).expect("azure");
    assert_eq!(azure.deployment_name.as_deref(), Some("gpt-realtime"));
    assert_eq!(azure.endpoint.as_deref(), Some("https://res.openai.azure.com/"));
    let openai = view.candidates.iter().find(|c| c.provider == Provider::OpenAi).expect("openai");
    assert_eq!(openai.model.as_deref(), Some("pinned"));
    Ok(())
}

#[tokio::test]
async fn implicit_candidates_come_from_keys_and_tokens() -> anyhow::Result<()> {
    let f = fixture(
        &[("GEMINI_API_KEY", "g-env")],
        Some(json!({ "provider_keys": { "azure": "az-default" } })),
        Duration::from_secs(60),
    );
    f.store
        .put(Provider::OpenAi, TokenPayload { access_token: "oauth-at".to_owned(), ..Default::default() })
        .await?;

    let view = f.cache.current().await?;

    let found: Vec<_> = view.candidates.iter().map(|c| (c.provider, c.auth_source)).collect();
    // Azure has a default key but no endpoint, so it cannot be used.
    assert_eq!(found, [(Provider::OpenAi, AuthSource::OAuth), (Provider::Gemini, AuthSource::ApiKey)]);

    let openai = status_of(&view, Provider::OpenAi);
    assert!(openai.configured && openai.connected && openai.oauth_supported);
    assert_eq!(openai.login, LoginPhase::Idle);
    assert_eq!(status_of(&view, Provider::Gemini).auth_source, Some(AuthSource::ApiKey));
    assert!(!status_of(&view, Provider::Azure).oauth_supported);
    Ok(())
}

#[tokio::test]
async fn missing_settings_file_is_empty_view() -> anyhow::Result<()> {
    let f = fixture(&[], None, Duration::from_secs(60));

    let view = f.cache.current().await?;

    assert!(view.candidates.is_empty());
    assert_eq!(view.failover, FailoverPolicy::default());
    assert!(view.providers.iter().all(|p| !p.configured && !p.connected));
    Ok(())
}

#[tokio::test]
async fn unreadable_settings_is_config_error() {
    let f = fixture(&[], None, Duration::from_secs(60));
    std::fs::write(f.settings_path(), "{ not json").expect("write");

    let err = f.cache.current().await;

    assert!(matches!(err, Err(GateError::Config(_))));
}

#[tokio::test]
async fn view_is_memoized_until_invalidated() -> anyhow::Result<()> {
    let f = fixture(
        &[],
        Some(json!({ "connections": [{ "provider": "openai", "api_key": "sk-a" }] })),
        Duration::from_secs(60),
    );

    let first = f.cache.current().await?;
    f.write_settings(json!({ "connections": [] }));
    let second = f.cache.current().await?;
    assert!(Arc::ptr_eq(&first, &second));

    f.cache.invalidate().await;
    let third = f.cache.current().await?;
    assert!(third.candidates.is_empty());
    Ok(())
}

#[tokio::test]
async fn token_writes_invalidate_the_view() -> anyhow::Result<()> {
    let f = fixture(&[], None, Duration::from_secs(60));

    let before = f.cache.current().await?;
    assert!(before.candidates.is_empty());

    f.store
        .put(Provider::OpenAi, TokenPayload { access_token: "fresh".to_owned(), ..Default::default() })
        .await?;
    let after = f.cache.current().await?;

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.candidates.len(), 1);
    Ok(())
}

#[tokio::test]
async fn expired_ttl_rebuilds() -> anyhow::Result<()> {
    let f = fixture(&[], None, Duration::from_millis(20));

    let first = f.cache.current().await?;
    tokio::time::sleep(Duration::from_millis(40)).await;
    let second = f.cache.current().await?;

    assert!(!Arc::ptr_eq(&first, &second));
    Ok(())
}
