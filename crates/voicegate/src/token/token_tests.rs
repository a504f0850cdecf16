// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn token_expiring_at(expires_at: Option<u64>) -> StoredToken {
    StoredToken {
        access_token: "at".to_owned(),
        refresh_token: None,
        token_type: "Bearer".to_owned(),
        expires_at,
        updated_at: 0,
    }
}

#[test]
fn token_inside_margin_is_not_usable() {
    let now = 1_700_000_000_000;
    assert!(!is_usable(&token_expiring_at(Some(now + 10_000)), now));
}

#[test]
fn token_outside_margin_is_usable() {
    let now = 1_700_000_000_000;
    assert!(is_usable(&token_expiring_at(Some(now + 60_000)), now));
}

#[test]
fn token_exactly_at_margin_is_not_usable() {
    let now = 1_700_000_000_000;
    assert!(!is_usable(&token_expiring_at(Some(now + EXPIRY_MARGIN_MS)), now));
}

#[test]
fn token_without_expiry_is_usable() {
    assert!(is_usable(&token_expiring_at(None), u64::MAX));
}

#[test]
fn serializes_with_camel_case_and_null_refresh() -> anyhow::Result<()> {
    let json = serde_json::to_value(token_expiring_at(Some(5)))?;
    assert_eq!(json["accessToken"], "at");
    assert!(json["refreshToken"].is_null());
    assert_eq!(json["expiresAt"], 5);
    assert_eq!(json["tokenType"], "Bearer");
    Ok(())
}
