// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser sign-in end to end: authorize URL, loopback redirect, token
//! exchange, then a session bootstrapped with the stored OAuth token.

mod support;

use std::time::Duration;

use serde_json::json;

use voicegate::credential::AuthSource;
use voicegate::oauth::login::LoginPhase;
use voicegate::realtime::CallContext;
use voicegate::token::{epoch_ms, TokenPayload};
use voicegate::Provider;

#[tokio::test]
async fn sign_in_then_open_session_with_oauth_token() -> anyhow::Result<()> {
    let (token_addr, grants) = support::spawn_token_server(json!({
        "access_token": "oauth-access",
        "refresh_token": "oauth-refresh",
        "expires_in": 3600
    }))
    .await;
    let (session_addr, session_log) =
        support::spawn_session_server(200, json!({ "value": "ek_oauth_session" })).await;
    let t = support::gate(
        Some(json!({
            "connections": [{
                "provider": "openai",
                "auth_source": "oauth",
                "endpoint": format!("http://{session_addr}")
            }]
        })),
        &[],
        Some(token_addr),
    );

    let before = t.gate.provider_statuses().await?;
    let openai = before.iter().find(|s| s.provider == Provider::OpenAi).expect("openai");
    assert!(!openai.configured && !openai.connected);

    let url = t.gate.start_login(Provider::OpenAi).await?;
    assert!(url.contains("code_challenge_method=S256"));
    let resp = t.redirect(&format!("code=the-code&state={}", t.last_state())).await?;
    assert!(resp.status().is_success());

    let status = t.gate.wait_login(Provider::OpenAi, Duration::from_secs(5)).await?;
    assert_eq!(status.phase, LoginPhase::Complete);
    assert!(status.connected);
    let form = grants.lock().unwrap().clone();
    assert!(form[0].contains("grant_type=authorization_code"));
    assert!(form[0].contains("code=the-code"));

    let after = t.gate.provider_statuses().await?;
    let openai = after.iter().find(|s| s.provider == Provider::OpenAi).expect("openai");
    assert!(openai.configured && openai.connected);
    assert_eq!(openai.auth_source, Some(AuthSource::OAuth));

    let session = t.gate.create_session(Vec::new(), CallContext::default()).await?;
    assert_eq!(session.token, "ek_oauth_session");
    assert_eq!(
        session_log.lock().unwrap()[0].authorization.as_deref(),
        Some("Bearer oauth-access")
    );

    assert!(t.gate.logout(Provider::OpenAi).await?);
    let err = t.gate.create_session(Vec::new(), CallContext::default()).await;
    assert!(matches!(err, Err(voicegate::GateError::NotConfigured)));
    Ok(())
}

#[tokio::test]
async fn forged_redirect_leaves_provider_disconnected() -> anyhow::Result<()> {
    let (token_addr, grants) = support::spawn_token_server(json!({ "access_token": "never" })).await;
    let t = support::gate(None, &[], Some(token_addr));

    t.gate.start_login(Provider::OpenAi).await?;
    let resp = t.redirect("code=stolen&state=not-the-state").await?;
    assert!(resp.text().await?.contains("Sign-in failed"));

    let status = t.gate.wait_login(Provider::OpenAi, Duration::from_secs(5)).await?;
    assert_eq!(status.phase, LoginPhase::Error);
    assert_eq!(status.error_code.as_deref(), Some("state_mismatch"));
    assert!(!status.connected);
    assert!(grants.lock().unwrap().is_empty());
    assert!(t.gate.store().get(Provider::OpenAi).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn stale_token_is_refreshed_before_bootstrap() -> anyhow::Result<()> {
    let (token_addr, grants) =
        support::spawn_token_server(json!({ "access_token": "refreshed-access", "expires_in": 3600 })).await;
    let (session_addr, session_log) =
        support::spawn_session_server(200, json!({ "value": "ek_after_refresh" })).await;
    let t = support::gate(
        Some(json!({
            "connections": [{
                "provider": "openai",
                "auth_source": "oauth",
                "endpoint": format!("http://{session_addr}")
            }]
        })),
        &[],
        Some(token_addr),
    );
    t.gate
        .store()
        .put(
            Provider::OpenAi,
            TokenPayload {
                access_token: "expired-access".to_owned(),
                refresh_token: Some("keep-me".to_owned()),
                token_type: None,
                expires_at: Some(epoch_ms().saturating_sub(60_000)),
            },
        )
        .await?;

    let session = t.gate.create_session(Vec::new(), CallContext::default()).await?;

    assert_eq!(session.token, "ek_after_refresh");
    assert_eq!(
        session_log.lock().unwrap()[0].authorization.as_deref(),
        Some("Bearer refreshed-access")
    );
    assert!(grants.lock().unwrap()[0].contains("grant_type=refresh_token"));
    let stored = t.gate.store().get(Provider::OpenAi).await?.expect("token");
    assert_eq!(stored.refresh_token.as_deref(), Some("keep-me"));
    Ok(())
}

#[tokio::test]
async fn refresh_without_refresh_token_is_rejected() -> anyhow::Result<()> {
    let t = support::gate(None, &[], None);
    t.gate
        .store()
        .put(Provider::OpenAi, TokenPayload { access_token: "bare".to_owned(), ..Default::default() })
        .await?;

    let err = t.gate.refresh(Provider::OpenAi).await;

    match err {
        Err(e) => assert_eq!(e.code(), "no_refresh_token"),
        Ok(token) => anyhow::bail!("unexpected refresh {token:?}"),
    }
    let stored = t.gate.store().get(Provider::OpenAi).await?.expect("token");
    assert_eq!(stored.access_token, "bare");
    Ok(())
}

fn stale_oauth_token() -> TokenPayload {
    TokenPayload {
        access_token: "expired-access".to_owned(),
        refresh_token: Some("rt-live".to_owned()),
        token_type: None,
        expires_at: Some(epoch_ms().saturating_sub(60_000)),
    }
}

#[tokio::test]
async fn unreachable_token_endpoint_is_not_reported_as_unconfigured() -> anyhow::Result<()> {
    let closed = std::net::SocketAddr::from(([127, 0, 0, 1], support::free_port()));
    let (session_addr, session_log) =
        support::spawn_session_server(200, json!({ "value": "ek_unused" })).await;
    let t = support::gate(
        Some(json!({
            "connections": [{
                "provider": "openai",
                "auth_source": "oauth",
                "endpoint": format!("http://{session_addr}")
            }]
        })),
        &[],
        Some(closed),
    );
    t.gate.store().put(Provider::OpenAi, stale_oauth_token()).await?;

    let err = t.gate.create_session(Vec::new(), CallContext::default()).await;

    match err {
        Err(e) => assert_eq!(e.code(), "exchange_failure", "{e}"),
        Ok(session) => anyhow::bail!("unexpected session {session:?}"),
    }
    assert!(session_log.lock().unwrap().is_empty());
    let kept = t.gate.store().get(Provider::OpenAi).await?.expect("token");
    assert_eq!(kept.access_token, "expired-access");
    Ok(())
}

#[tokio::test]
async fn refresh_fault_on_primary_still_reaches_api_key_fallback() -> anyhow::Result<()> {
    let closed = std::net::SocketAddr::from(([127, 0, 0, 1], support::free_port()));
    let (oauth_addr, oauth_log) =
        support::spawn_session_server(200, json!({ "value": "ek_unused" })).await;
    let (key_addr, _) = support::spawn_session_server(200, json!({ "value": "ek_from_key" })).await;
    let t = support::gate(
        Some(json!({
            "connections": [
                {
                    "provider": "openai",
                    "auth_source": "oauth",
                    "role": "primary",
                    "endpoint": format!("http://{oauth_addr}")
                },
                { "provider": "openai", "endpoint": format!("http://{key_addr}"), "api_key": "sk-fallback" }
            ]
        })),
        &[],
        Some(closed),
    );
    t.gate.store().put(Provider::OpenAi, stale_oauth_token()).await?;

    let session = t.gate.create_session(Vec::new(), CallContext::default()).await?;

    assert_eq!(session.token, "ek_from_key");
    assert!(oauth_log.lock().unwrap().is_empty());
    Ok(())
}
