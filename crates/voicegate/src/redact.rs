// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Secret scrubbing for provider error bodies and log fields.

use std::sync::LazyLock;

use regex::Regex;

const REDACTED: &str = "[REDACTED]";

/// Longest provider body excerpt kept in an error message.
pub const MAX_SNIPPET_CHARS: usize = 512;

static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // JSON string fields whose name looks like a credential.
        (
            r#"(?i)"([a-z0-9_\-]*(?:token|secret|password|authorization|api[_-]?key|client_secret|code_verifier)[a-z0-9_\-]*)"\s*:\s*"[^"]*""#,
            r#""$1":"[REDACTED]""#,
        ),
        (r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/=\-]+", "$1 [REDACTED]"),
        (r"(?i)([?&](?:key|api-key|access_token|refresh_token|code)=)[^&\s]+", "${1}[REDACTED]"),
        (r"\b(?:sk|ek|rk)[-_][A-Za-z0-9_\-]{8,}", REDACTED),
        (r"\bya29\.[A-Za-z0-9._\-]+", REDACTED),
        (r"\bAIza[0-9A-Za-z_\-]{20,}", REDACTED),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Replace anything that looks like a credential in `text`.
pub fn redact(text: &str) -> String {
    let mut out = text.to_owned();
    for (re, replacement) in RULES.iter() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Redact and truncate a provider response body for inclusion in an error.
pub fn snippet(body: &str) -> String {
    let cleaned = redact(body.trim());
    if cleaned.chars().count() <= MAX_SNIPPET_CHARS {
        return cleaned;
    }
    let mut cut: String = cleaned.chars().take(MAX_SNIPPET_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Show only the edges of a secret, e.g. `ek_abc…wxyz`.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len().max(4));
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}

#[cfg(test)]
#[path = "redact_tests.rs"]
mod tests;
