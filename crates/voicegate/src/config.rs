// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Process-level configuration for the voice gate.
#[derive(Debug, Clone, clap::Args)]
pub struct GateConfig {
    /// Directory holding `tokens.json`.
    #[arg(long, env = "VOICEGATE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Path to the voice settings JSON file (connections, keys, failover).
    #[arg(long, env = "VOICEGATE_VOICE_CONFIG")]
    pub voice_config: Option<PathBuf>,

    /// Log format (json or text).
    #[arg(long, env = "VOICEGATE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "VOICEGATE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Token store snapshot TTL in milliseconds.
    #[arg(long, default_value_t = 5000, env = "VOICEGATE_TOKEN_CACHE_MS")]
    pub token_cache_ms: u64,

    /// Runtime config cache TTL in milliseconds.
    #[arg(long, default_value_t = 5000, env = "VOICEGATE_RUNTIME_CACHE_MS")]
    pub runtime_cache_ms: u64,

    /// Seconds before an unanswered browser sign-in is abandoned.
    #[arg(long, default_value_t = 300, env = "VOICEGATE_LOGIN_TIMEOUT_SECS")]
    pub login_timeout_secs: u64,

    /// Timeout for token and session bootstrap requests, in seconds.
    #[arg(long, default_value_t = 20, env = "VOICEGATE_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            voice_config: None,
            log_format: "text".into(),
            log_level: "info".into(),
            token_cache_ms: 5000,
            runtime_cache_ms: 5000,
            login_timeout_secs: 300,
            http_timeout_secs: 20,
        }
    }
}

impl GateConfig {
    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.token_cache_ms)
    }

    pub fn runtime_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.runtime_cache_ms)
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Explicit `--state-dir`, else the environment default.
    pub fn resolved_state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(state_dir)
    }

    pub fn token_path(&self) -> PathBuf {
        self.resolved_state_dir().join("tokens.json")
    }

    /// Explicit `--voice-config`, else `voice.json` in the state dir.
    pub fn voice_config_path(&self) -> PathBuf {
        self.voice_config.clone().unwrap_or_else(|| self.resolved_state_dir().join("voice.json"))
    }
}

/// Resolve the state directory.
///
/// Checks `VOICEGATE_STATE_DIR`, then `$XDG_STATE_HOME/voicegate`,
/// then `$HOME/.local/state/voicegate`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VOICEGATE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("voicegate");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/voicegate");
    }
    PathBuf::from(".voicegate")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
