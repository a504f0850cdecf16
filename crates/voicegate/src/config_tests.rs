// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::Parser;
use serial_test::serial;

use super::*;

#[derive(Parser)]
struct Cli {
    #[command(flatten)]
    config: GateConfig,
}

/// Run `f` with the given variables set (or removed), restoring them afterwards.
fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
    let saved: Vec<(String, Option<String>)> =
        vars.iter().map(|(k, _)| ((*k).to_owned(), std::env::var(k).ok())).collect();
    for (key, value) in vars {
        match value {
            Some(v) => std::env::set_var(key, v),
            None => std::env::remove_var(key),
        }
    }
    let out = f();
    for (key, value) in saved {
        match value {
            Some(v) => std::env::set_var(&key, v),
            None => std::env::remove_var(&key),
        }
    }
    out
}

#[test]
#[serial]
fn state_dir_prefers_explicit_variable() {
    let dir = with_env(
        &[("VOICEGATE_STATE_DIR", Some("/tmp/vg")), ("XDG_STATE_HOME", Some("/xdg"))],
        state_dir,
    );
    assert_eq!(dir, PathBuf::from("/tmp/vg"));
}

#[test]
#[serial]
fn state_dir_falls_back_to_xdg_then_home() {
    let xdg = with_env(
        &[("VOICEGATE_STATE_DIR", None), ("XDG_STATE_HOME", Some("/xdg")), ("HOME", Some("/home/u"))],
        state_dir,
    );
    assert_eq!(xdg, PathBuf::from("/xdg/voicegate"));

    let home = with_env(
        &[("VOICEGATE_STATE_DIR", None), ("XDG_STATE_HOME", None), ("HOME", Some("/home/u"))],
        state_dir,
    );
    assert_eq!(home, PathBuf::from("/home/u/.local/state/voicegate"));
}

#[test]
#[serial]
fn cli_defaults_match_default_impl() {
    let parsed = with_env(
        &[
            ("VOICEGATE_STATE_DIR", None),
            ("VOICEGATE_VOICE_CONFIG", None),
            ("VOICEGATE_LOG_FORMAT", None),
            ("VOICEGATE_LOG_LEVEL", None),
            ("VOICEGATE_TOKEN_CACHE_MS", None),
            ("VOICEGATE_RUNTIME_CACHE_MS", None),
            ("VOICEGATE_LOGIN_TIMEOUT_SECS", None),
            ("VOICEGATE_HTTP_TIMEOUT_SECS", None),
        ],
        || Cli::try_parse_from(["voicegate"]),
    )
    .expect("parse");
    let defaults = GateConfig::default();

    assert_eq!(parsed.config.log_format, defaults.log_format);
    assert_eq!(parsed.config.token_cache_ttl(), defaults.token_cache_ttl());
    assert_eq!(parsed.config.login_timeout(), std::time::Duration::from_secs(300));
    assert_eq!(parsed.config.http_timeout(), defaults.http_timeout());
}

#[test]
fn paths_derive_from_explicit_state_dir() {
    let config = GateConfig { state_dir: Some(PathBuf::from("/srv/vg")), ..Default::default() };
    assert_eq!(config.token_path(), PathBuf::from("/srv/vg/tokens.json"));
    assert_eq!(config.voice_config_path(), PathBuf::from("/srv/vg/voice.json"));

    let pinned = GateConfig { voice_config: Some(PathBuf::from("/etc/voice.json")), ..config };
    assert_eq!(pinned.voice_config_path(), PathBuf::from("/etc/voice.json"));
}
