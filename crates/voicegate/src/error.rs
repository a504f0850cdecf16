// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use crate::realtime::classify::BootstrapFailure;

/// A malformed OAuth callback. Never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    StateMismatch,
    MissingCode,
}

impl Violation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StateMismatch => "state_mismatch",
            Self::MissingCode => "missing_code",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the credential and session layers.
#[derive(Debug)]
pub enum GateError {
    /// Caller supplied an invalid value (empty token, bad URL).
    Validation(String),
    /// Provider name is not one of the supported providers, or has no OAuth contract.
    UnknownProvider(String),
    /// Refresh requested but the stored record carries no refresh token.
    NoRefreshToken(String),
    /// No candidate has a usable credential.
    NotConfigured,
    ProtocolViolation(Violation),
    /// Token endpoint returned a non-success status or an unusable body.
    ExchangeFailure { status: Option<u16>, message: String },
    /// Every attempted session bootstrap failed; carries the last failure.
    SessionFailed { provider: String, failure: BootstrapFailure },
    /// Settings file could not be read or parsed.
    Config(String),
    Listener(String),
    Storage(String),
}

impl GateError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownProvider(_) => "unknown_provider",
            Self::NoRefreshToken(_) => "no_refresh_token",
            Self::NotConfigured => "not_configured",
            Self::ProtocolViolation(v) => v.as_str(),
            Self::ExchangeFailure { .. } => "exchange_failure",
            Self::SessionFailed { .. } => "session_failed",
            Self::Config(_) => "config",
            Self::Listener(_) => "listener",
            Self::Storage(_) => "storage",
        }
    }
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "invalid input: {msg}"),
            Self::UnknownProvider(p) => write!(f, "unknown provider: {p}"),
            Self::NoRefreshToken(p) => write!(f, "no refresh token stored for {p}"),
            Self::NotConfigured => f.write_str("no realtime provider has a usable credential"),
            Self::ProtocolViolation(v) => write!(f, "oauth callback rejected: {v}"),
            Self::ExchangeFailure { status: Some(status), message } => {
                write!(f, "token endpoint returned {status}: {message}")
            }
            Self::ExchangeFailure { status: None, message } => {
                write!(f, "token request failed: {message}")
            }
            Self::SessionFailed { provider, failure } => {
                write!(f, "realtime session bootstrap failed ({provider}): {failure}")
            }
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Listener(msg) => write!(f, "callback listener error: {msg}"),
            Self::Storage(msg) => write!(f, "token storage error: {msg}"),
        }
    }
}

impl std::error::Error for GateError {}
