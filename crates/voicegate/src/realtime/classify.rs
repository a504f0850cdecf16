// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session bootstrap failures and whether they justify trying the next provider.

use std::error::Error as _;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// The model name often sits between "model" and "not supported".
static UNSUPPORTED_MODEL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bmodel\b[^.]{0,80}\bnot (?:supported|available)\b|\bunsupported model\b|model_not_supported|does not support (?:the )?model",
    )
    .ok()
});

/// Network-level cause of a failed bootstrap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Timeout,
    Connect,
    Reset,
    Dns,
    Other,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Reset => "reset",
            Self::Dns => "dns",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapFailure {
    /// Provider answered with a non-success status. Message is already redacted.
    Http { status: u16, message: String },
    Transport { kind: TransportKind, message: String },
    /// 2xx with a body that carried no usable credential.
    InvalidResponse(String),
}

impl BootstrapFailure {
    /// Whether another provider might succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, message } => {
                is_retryable_status(*status) || mentions_unsupported_model(message)
            }
            Self::Transport { kind, .. } => *kind != TransportKind::Other,
            Self::InvalidResponse(message) => mentions_unsupported_model(message),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Map a reqwest send error onto a transport kind.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let message = crate::redact::redact(&error_chain(err));
        // The top-level text names the request URL; classify on the causes only.
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else {
            match classify_transport_detail(&source_chain(err)) {
                TransportKind::Other if err.is_connect() => TransportKind::Connect,
                kind => kind,
            }
        };
        Self::Transport { kind, message }
    }
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status, message } => write!(f, "HTTP {status}: {message}"),
            Self::Transport { kind, message } => write!(f, "{kind} error: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid response: {message}"),
        }
    }
}

/// Auth, conflict, rate-limit, timeout and server-side statuses.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 401 | 403 | 408 | 409 | 429) || (500..=599).contains(&status)
}

/// Providers phrase this differently; match the common spellings.
pub fn mentions_unsupported_model(message: &str) -> bool {
    UNSUPPORTED_MODEL.as_ref().is_some_and(|re| re.is_match(message))
}

/// Classify a transport error description by case-insensitive substring.
pub fn classify_transport_detail(detail: &str) -> TransportKind {
    let lower = detail.to_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
        return TransportKind::Timeout;
    }
    if lower.contains("dns")
        || lower.contains("failed to lookup")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || lower.contains("nodename nor servname")
    {
        return TransportKind::Dns;
    }
    if lower.contains("connection reset")
        || lower.contains("reset by peer")
        || lower.contains("broken pipe")
        || lower.contains("connection closed")
        || lower.contains("incomplete message")
        || lower.contains("unexpected eof")
    {
        return TransportKind::Reset;
    }
    if lower.contains("connection refused")
        || lower.contains("error trying to connect")
        || lower.contains("network is unreachable")
        || lower.contains("host is unreachable")
    {
        return TransportKind::Connect;
    }
    TransportKind::Other
}

fn error_chain(err: &reqwest::Error) -> String {
    let causes = source_chain(err);
    if causes.is_empty() {
        err.to_string()
    } else {
        format!("{err}: {causes}")
    }
}

fn source_chain(err: &reqwest::Error) -> String {
    let mut parts = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
