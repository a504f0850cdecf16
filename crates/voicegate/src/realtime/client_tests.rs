// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use super::*;
use crate::http;

type Seen = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

/// Helper: session endpoint with a fixed status/body that records requests.
async fn mock_session_server(status: u16, body: &'static str) -> (SocketAddr, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let app = Router::new().route(
        "/v1/realtime/client_secrets",
        post(move |headers: HeaderMap, axum::Json(json): axum::Json<Value>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push((headers, json));
                (
                    axum::http::StatusCode::from_u16(status)
                        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                    body,
                )
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (addr, seen)
}

fn request_to(addr: SocketAddr) -> BootstrapRequest {
    BootstrapRequest {
        url: format!("http://{addr}/v1/realtime/client_secrets"),
        headers: vec![("Authorization".to_owned(), "Bearer sk-test".to_owned())],
        body: serde_json::json!({ "session": { "type": "realtime" } }),
    }
}

#[tokio::test]
async fn posts_json_with_headers() -> anyhow::Result<()> {
    let (addr, seen) = mock_session_server(200, r#"{"value":"ek_1"}"#).await;
    let bootstrapper = HttpBootstrapper::new(http::client(Duration::from_secs(5))?);

    let body = bootstrapper.bootstrap(&request_to(addr)).await.map_err(|e| anyhow::anyhow!("{e}"))?;

    assert_eq!(body["value"], "ek_1");
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0.get("authorization").and_then(|v| v.to_str().ok()), Some("Bearer sk-test"));
    assert_eq!(seen[0].1["session"]["type"], "realtime");
    Ok(())
}

#[tokio::test]
async fn error_status_carries_redacted_message() -> anyhow::Result<()> {
    let (addr, _) = mock_session_server(
        401,
        r#"{"error":{"message":"Incorrect API key provided: sk-abcdefghijklmnop","code":"invalid_api_key"}}"#,
    )
    .await;
    let bootstrapper = HttpBootstrapper::new(http::client(Duration::from_secs(5))?);

    let err = bootstrapper.bootstrap(&request_to(addr)).await;

    match err {
        Err(BootstrapFailure::Http { status, message }) => {
            assert_eq!(status, 401);
            assert!(message.contains("invalid_api_key"), "{message}");
            assert!(!message.contains("abcdefghijklmnop"), "{message}");
        }
        other => anyhow::bail!("expected http failure, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn non_json_success_is_invalid_response() -> anyhow::Result<()> {
    let (addr, _) = mock_session_server(200, "<html>proxy login</html>").await;
    let bootstrapper = HttpBootstrapper::new(http::client(Duration::from_secs(5))?);

    let err = bootstrapper.bootstrap(&request_to(addr)).await;

    assert!(matches!(err, Err(BootstrapFailure::InvalidResponse(_))));
    Ok(())
}

#[test]
fn error_detail_falls_back_to_body() {
    assert_eq!(error_detail(""), "empty response body");
    assert_eq!(error_detail("bad gateway"), "bad gateway");
    assert_eq!(error_detail(r#"{"error":"model_not_supported"}"#), "model_not_supported");
}
