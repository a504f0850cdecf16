// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use super::classify::BootstrapFailure;
use crate::endpoint::BootstrapRequest;
use crate::redact;

/// Performs one bootstrap request and returns the provider's JSON body.
pub trait SessionBootstrapper: Send + Sync {
    fn bootstrap<'a>(
        &'a self,
        request: &'a BootstrapRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, BootstrapFailure>> + Send + 'a>>;
}

/// Bootstrapper backed by a shared reqwest client.
pub struct HttpBootstrapper {
    client: reqwest::Client,
}

impl HttpBootstrapper {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl SessionBootstrapper for HttpBootstrapper {
    fn bootstrap<'a>(
        &'a self,
        request: &'a BootstrapRequest,
    ) -> Pin<Box<dyn Future<Output = Result<Value, BootstrapFailure>> + Send + 'a>> {
        Box::pin(async move {
            let mut req = self.client.post(&request.url).json(&request.body);
            for (name, value) in &request.headers {
                req = req.header(name.as_str(), value.as_str());
            }

            let resp = req.send().await.map_err(|e| BootstrapFailure::from_reqwest(&e))?;
            let status = resp.status();
            let text = resp.text().await.map_err(|e| BootstrapFailure::from_reqwest(&e))?;
            if !status.is_success() {
                return Err(BootstrapFailure::Http {
                    status: status.as_u16(),
                    message: error_detail(&text),
                });
            }
            serde_json::from_str(&text).map_err(|e| {
                BootstrapFailure::InvalidResponse(format!(
                    "unreadable body ({e}): {}",
                    redact::snippet(&text)
                ))
            })
        })
    }
}

/// Prefer `error.message` from an OpenAI/Google-style error envelope.
fn error_detail(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        let error = v.get("error")?;
        let message = error.get("message").and_then(Value::as_str);
        let code = error.get("code").and_then(|c| match c {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        match (message, code) {
            (Some(m), Some(c)) => Some(format!("{m} ({c})")),
            (Some(m), None) => Some(m.to_owned()),
            (None, Some(c)) => Some(c),
            (None, None) => error.as_str().map(str::to_owned),
        }
    });
    match message {
        Some(m) => redact::snippet(&m),
        None if body.trim().is_empty() => "empty response body".to_owned(),
        None => redact::snippet(body),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
