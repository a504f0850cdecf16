// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser OAuth sign-in: PKCE, loopback callback, token exchange and refresh.

pub mod browser;
pub mod callback;
pub mod exchange;
pub mod login;
pub mod pkce;
pub mod provider;
