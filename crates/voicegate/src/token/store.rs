// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cached, single-writer access to the token document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use super::{epoch_ms, persist, StoredToken, TokenPayload};
use crate::error::GateError;
use crate::provider::Provider;

struct Snapshot {
    loaded_at: Instant,
    tokens: HashMap<String, StoredToken>,
}

/// Reads are served from a snapshot refreshed every `cache_ttl`; writes go
/// straight to disk and drop the snapshot.
pub struct TokenStore {
    path: PathBuf,
    cache_ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
    write_lock: Mutex<()>,
    generation: AtomicU64,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            path: path.into(),
            cache_ttl,
            snapshot: RwLock::new(None),
            write_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Incremented on every successful write.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn get(&self, provider: Provider) -> Result<Option<StoredToken>, GateError> {
        {
            let snapshot = self.snapshot.read().await;
            if let Some(ref snap) = *snapshot {
                if snap.loaded_at.elapsed() < self.cache_ttl {
                    return Ok(snap.tokens.get(provider.as_str()).cloned());
                }
            }
        }
        let mut tokens = self.load().await?;
        Ok(tokens.remove(provider.as_str()))
    }

    /// Force a fresh read of the token file into the snapshot.
    pub async fn reload(&self) -> Result<(), GateError> {
        self.load().await.map(drop)
    }

    /// Read the file and cache it unless a write landed meanwhile; a read that
    /// raced a write is returned to the caller but never cached.
    async fn load(&self) -> Result<HashMap<String, StoredToken>, GateError> {
        let generation = self.generation();
        let doc = persist::load(&self.path).map_err(|e| storage_error(&self.path, e))?;
        let tokens = persist::tokens(&doc);

        let mut snapshot = self.snapshot.write().await;
        if self.generation() == generation {
            *snapshot = Some(Snapshot { loaded_at: Instant::now(), tokens: tokens.clone() });
        } else {
            tracing::debug!("discarding token snapshot read during a write");
        }
        Ok(tokens)
    }

    /// Replace the provider's record. Rejects an empty access token.
    pub async fn put(
        &self,
        provider: Provider,
        payload: TokenPayload,
    ) -> Result<StoredToken, GateError> {
        if payload.access_token.trim().is_empty() {
            return Err(GateError::Validation("access token must not be empty".to_owned()));
        }
        let token = StoredToken {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token.filter(|t| !t.is_empty()),
            token_type: payload.token_type.unwrap_or_else(|| "Bearer".to_owned()),
            expires_at: payload.expires_at,
            updated_at: epoch_ms(),
        };

        let _guard = self.write_lock.lock().await;
        let mut doc = persist::load(&self.path).map_err(|e| storage_error(&self.path, e))?;
        persist::merge_entry(&mut doc, provider.as_str(), &token)
            .map_err(|e| storage_error(&self.path, e))?;
        persist::save(&self.path, &doc).map_err(|e| storage_error(&self.path, e))?;
        self.invalidate().await;

        tracing::debug!(provider = %provider, expires_at = ?token.expires_at, "stored token");
        Ok(token)
    }

    /// Delete the provider's record. Returns whether one existed.
    pub async fn remove(&self, provider: Provider) -> Result<bool, GateError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = persist::load(&self.path).map_err(|e| storage_error(&self.path, e))?;
        if doc.remove(provider.as_str()).is_none() {
            return Ok(false);
        }
        persist::save(&self.path, &doc).map_err(|e| storage_error(&self.path, e))?;
        self.invalidate().await;

        tracing::debug!(provider = %provider, "removed token");
        Ok(true)
    }

    // Bumped under the snapshot lock so `load` never installs across a write.
    async fn invalidate(&self) {
        let mut snapshot = self.snapshot.write().await;
        *snapshot = None;
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

fn storage_error(path: &Path, e: anyhow::Error) -> GateError {
    GateError::Storage(format!("{}: {e:#}", path.display()))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
