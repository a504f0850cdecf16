// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Voicegate: credential bootstrap and realtime session failover for voice providers.

pub mod config;
pub mod credential;
pub mod endpoint;
pub mod error;
pub mod gate;
pub mod http;
pub mod oauth;
pub mod provider;
pub mod realtime;
pub mod redact;
pub mod runtime;
pub mod settings;
pub mod token;

pub use crate::config::GateConfig;
pub use crate::error::GateError;
pub use crate::gate::{GateParts, VoiceGate};
pub use crate::provider::Provider;
