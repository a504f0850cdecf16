// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot loopback listener for the OAuth redirect.
//!
//! Binds `127.0.0.1:<port>` explicitly (never `localhost`, which may resolve to
//! `::1` first). The first request on the callback path is authoritative; the
//! server shuts itself down right after answering it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, Uri};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{GateError, Violation};

/// How long `close` waits for in-flight connections before aborting the task.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Raw redirect query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Lenient parse: malformed encodings decode lossily instead of failing,
    /// so a garbled redirect still consumes the one-shot slot.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };
        let Ok(url) = Url::parse(&format!("http://127.0.0.1/?{query}")) else {
            return params;
        };
        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

/// What the single authoritative callback request amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code(String),
    /// The provider redirected with `error=`.
    Denied { error: String, description: Option<String> },
    Rejected(Violation),
}

impl CallbackOutcome {
    /// Validate redirect parameters against the state issued for this attempt.
    pub fn evaluate(params: CallbackParams, expected_state: &str) -> Self {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            return Self::Denied { error, description: params.error_description };
        }
        let state_ok = params
            .state
            .as_deref()
            .is_some_and(|got| constant_time_eq(got.as_bytes(), expected_state.as_bytes()));
        if !state_ok {
            return Self::Rejected(Violation::StateMismatch);
        }
        match params.code.filter(|c| !c.trim().is_empty()) {
            Some(code) => Self::Code(code),
            None => Self::Rejected(Violation::MissingCode),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    #[allow(deprecated)]
    ring::constant_time::verify_slices_are_equal(a, b).is_ok()
}

struct CallbackState {
    expected_state: String,
    sender: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
    shutdown: CancellationToken,
}

/// Handle to a running listener. Dropping it does not stop the server; call `close`.
pub struct CallbackListener {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl CallbackListener {
    /// Bind the listener and start serving. The receiver yields the first
    /// callback's outcome, or errors if the listener closes without one.
    pub async fn bind(
        port: u16,
        path: &str,
        expected_state: String,
    ) -> Result<(Self, oneshot::Receiver<CallbackOutcome>), GateError> {
        let bind_addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| GateError::Listener(format!("failed to bind {bind_addr}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| GateError::Listener(format!("listener has no local address: {e}")))?;

        let (tx, rx) = oneshot::channel();
        let shutdown = CancellationToken::new();
        let state = Arc::new(CallbackState {
            expected_state,
            sender: Mutex::new(Some(tx)),
            shutdown: shutdown.clone(),
        });
        let app = Router::new().route(path, get(handle_callback)).with_state(state);

        let serve_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(serve_shutdown.cancelled_owned());
            if let Err(e) = server.await {
                tracing::warn!(err = %e, "oauth callback listener failed");
            }
        });

        tracing::debug!(%addr, "oauth callback listener bound");
        Ok((Self { addr, shutdown, task }, rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop serving and wait until the port is released.
    pub async fn close(self) {
        self.shutdown.cancel();
        let mut task = self.task;
        if tokio::time::timeout(CLOSE_GRACE, &mut task).await.is_err() {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!(addr = %self.addr, "oauth callback listener closed");
    }
}

async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    uri: Uri,
) -> impl IntoResponse {
    let Some(sender) = state.sender.lock().await.take() else {
        return page(PageKind::AlreadyHandled);
    };

    let params = CallbackParams::from_query(uri.query());
    let outcome = CallbackOutcome::evaluate(params, &state.expected_state);
    let kind = match outcome {
        CallbackOutcome::Code(_) => PageKind::Success,
        _ => PageKind::Failure,
    };
    let _ = sender.send(outcome);
    state.shutdown.cancel();
    page(kind)
}

enum PageKind {
    Success,
    Failure,
    AlreadyHandled,
}

fn page(kind: PageKind) -> impl IntoResponse {
    let (title, body) = match kind {
        PageKind::Success => ("Signed in", "Sign-in complete. You can close this window."),
        PageKind::Failure => ("Sign-in failed", "Sign-in did not complete. Return to the app and try again."),
        PageKind::AlreadyHandled => ("Already handled", "This sign-in link was already used."),
    };
    let html = format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family:sans-serif;text-align:center;margin-top:4em\">\
         <h2>{title}</h2><p>{body}</p></body></html>"
    );
    ([(header::CONNECTION, "close")], Html(html))
}

#[cfg(test)]
#[path = "callback_tests.rs"]
mod tests;
