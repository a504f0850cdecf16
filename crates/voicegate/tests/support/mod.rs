// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: in-process provider mocks and a gate wired against them.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;

use voicegate::credential::EnvOverrides;
use voicegate::http;
use voicegate::oauth::browser::BrowserOpener;
use voicegate::oauth::provider::{ProviderConfig, ProviderRegistry};
use voicegate::realtime::client::HttpBootstrapper;
use voicegate::token::store::TokenStore;
use voicegate::{GateParts, VoiceGate};

/// One request seen by a mock provider.
#[derive(Debug, Clone)]
pub struct Seen {
    pub path: String,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub google_key: Option<String>,
    pub body: serde_json::Value,
}

pub type Log = Arc<Mutex<Vec<Seen>>>;

/// Realtime provider answering every POST with `status` and `body`.
pub async fn spawn_session_server(status: u16, body: serde_json::Value) -> (SocketAddr, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, raw: String| {
        let sink = Arc::clone(&sink);
        let body = body.to_string();
        async move {
            let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
            sink.lock().unwrap().push(Seen {
                path: uri.path_and_query().map(|p| p.to_string()).unwrap_or_default(),
                authorization: header("authorization"),
                api_key: header("api-key"),
                google_key: header("x-goog-api-key"),
                body: serde_json::from_str(&raw).unwrap_or_default(),
            });
            (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)
        }
    });
    (serve(app).await, log)
}

/// OAuth token endpoint answering every grant with `body`; records form bodies.
pub async fn spawn_token_server(body: serde_json::Value) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let grants = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&grants);
    let app = Router::new().route(
        "/token",
        post(move |form: String| {
            let sink = Arc::clone(&sink);
            let body = body.to_string();
            async move {
                sink.lock().unwrap().push(form);
                body
            }
        }),
    );
    (serve(app).await, grants)
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    addr
}

pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("free port")
}

#[derive(Default)]
pub struct RecordingBrowser {
    pub opened: Mutex<Vec<String>>,
}

impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        self.opened.lock().unwrap().push(url.to_owned());
        Ok(())
    }
}

pub struct TestGate {
    pub dir: tempfile::TempDir,
    pub gate: VoiceGate,
    pub browser: Arc<RecordingBrowser>,
    pub callback_port: u16,
}

impl TestGate {
    pub fn settings_path(&self) -> PathBuf {
        self.dir.path().join("voice.json")
    }

    /// Deliver the browser redirect for the most recent authorize URL.
    pub async fn redirect(&self, query: &str) -> reqwest::Result<reqwest::Response> {
        http::client(Duration::from_secs(5))
            .expect("http client")
            .get(format!("http://127.0.0.1:{}/auth/callback?{query}", self.callback_port))
            .send()
            .await
    }

    pub fn last_state(&self) -> String {
        let opened = self.browser.opened.lock().unwrap();
        let url = reqwest::Url::parse(opened.last().expect("browser opened")).expect("authorize url");
        url.query_pairs().find(|(k, _)| k == "state").map(|(_, v)| v.into_owned()).expect("state")
    }
}

/// A gate whose OpenAI sign-in talks to `token_addr` and whose settings file
/// holds `settings` (omitted when `None`).
pub fn gate(
    settings: Option<serde_json::Value>,
    env: &[(&str, &str)],
    token_addr: Option<SocketAddr>,
) -> TestGate {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings_path = dir.path().join("voice.json");
    if let Some(settings) = settings {
        std::fs::write(&settings_path, settings.to_string()).expect("write settings");
    }

    let callback_port = free_port();
    let mut openai = ProviderConfig::openai();
    openai.listener_port = callback_port;
    if let Some(addr) = token_addr {
        openai.token_url = format!("http://{addr}/token");
    }
    let mut registry = ProviderRegistry::builtin();
    registry.insert(openai);

    let browser = Arc::new(RecordingBrowser::default());
    let client = http::client(Duration::from_secs(5)).expect("http client");
    let gate = VoiceGate::assemble(GateParts {
        settings_path,
        store: Arc::new(TokenStore::new(dir.path().join("tokens.json"), Duration::from_secs(5))),
        registry,
        browser: Arc::clone(&browser) as Arc<dyn BrowserOpener>,
        env: EnvOverrides::from_pairs(env.iter().map(|(k, v)| (*k, *v))),
        http: client.clone(),
        bootstrapper: Arc::new(HttpBootstrapper::new(client)),
        login_timeout: Duration::from_secs(30),
        runtime_ttl: Duration::from_secs(60),
    });
    TestGate { dir, gate, browser, callback_port }
}
