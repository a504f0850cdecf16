// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token document IO: raw JSON load and atomic save.
//!
//! The document is kept as an untyped map so fields this crate does not know
//! about, at the top level or inside a provider entry, survive a rewrite.

use std::collections::HashMap;
use std::path::Path;

use serde_json::{Map, Value};

use super::StoredToken;

pub type TokenDocument = Map<String, Value>;

/// Load the token document. A missing file is an empty document.
pub fn load(path: &Path) -> anyhow::Result<TokenDocument> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(&contents)? {
        Value::Object(doc) => Ok(doc),
        other => anyhow::bail!("token file is not a JSON object (found {})", json_kind(&other)),
    }
}

/// Save the document atomically (write tmp + rename).
///
/// The temp name carries PID and a counter so concurrent writers never share
/// a partially written file.
pub fn save(path: &Path, doc: &TokenDocument) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(doc)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Typed view of every entry that parses as a token record.
pub fn tokens(doc: &TokenDocument) -> HashMap<String, StoredToken> {
    doc.iter()
        .filter_map(|(provider, entry)| {
            let token: StoredToken = serde_json::from_value(entry.clone()).ok()?;
            (!token.access_token.is_empty()).then(|| (provider.clone(), token))
        })
        .collect()
}

/// Overlay `token` onto the existing entry for `provider`, keeping unknown keys.
pub fn merge_entry(doc: &mut TokenDocument, provider: &str, token: &StoredToken) -> anyhow::Result<()> {
    let Value::Object(fields) = serde_json::to_value(token)? else {
        anyhow::bail!("token record did not serialize to an object");
    };
    let entry = doc.entry(provider.to_owned()).or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Value::Object(existing) = entry {
        existing.extend(fields);
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
