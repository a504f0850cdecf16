// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider realtime bootstrap requests.
//!
//! Pure functions: given a candidate, its credential and the session request,
//! compute the ephemeral-credential request, the signalling URL and how to read
//! the provider's answer. Nothing here performs IO.

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::credential::{AuthSource, ResolvedCredential};
use crate::error::GateError;
use crate::provider::Provider;
use crate::realtime::candidate::RealtimeCandidate;
use crate::realtime::classify::BootstrapFailure;
use crate::realtime::{SessionRequest, ToolSpec};
use crate::redact::mask_token;

pub const OPENAI_ORIGIN: &str = "https://api.openai.com";
pub const GEMINI_ORIGIN: &str = "https://generativelanguage.googleapis.com";
pub const AZURE_PREVIEW_API_VERSION: &str = "2025-04-01-preview";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-realtime";
pub const DEFAULT_OPENAI_VOICE: &str = "marin";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";
pub const DEFAULT_GEMINI_VOICE: &str = "Puck";

const GEMINI_CONSTRAINED_PATH: &str =
    "/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContentConstrained";

/// Azure realtime wire protocol, chosen by deployment name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AzureProtocol {
    /// `/openai/v1/realtime/...`; session body must carry `type`.
    Ga,
    /// `/openai/realtimeapi/...?api-version=...`; rejects `type`.
    Preview,
}

/// GA deployments are named `gpt-realtime*`; everything else
/// (e.g. `gpt-4o-realtime-preview`) speaks the preview protocol.
pub fn azure_protocol(deployment: &str) -> AzureProtocol {
    if deployment.trim().to_ascii_lowercase().starts_with("gpt-realtime") {
        AzureProtocol::Ga
    } else {
        AzureProtocol::Preview
    }
}

/// Reduce a user-supplied endpoint to `scheme://host[:port]`.
///
/// Accepts bare hosts (assumes https) and websocket schemes (mapped to their
/// http equivalents). Paths, queries and fragments are dropped.
pub fn normalize_origin(raw: &str) -> Result<String, GateError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GateError::Validation("endpoint is empty".to_owned()));
    }
    let with_scheme =
        if trimmed.contains("://") { trimmed.to_owned() } else { format!("https://{trimmed}") };
    let url = Url::parse(&with_scheme)
        .map_err(|e| GateError::Validation(format!("invalid endpoint {trimmed}: {e}")))?;
    let scheme = match url.scheme() {
        "https" | "wss" => "https",
        "http" | "ws" => "http",
        other => {
            return Err(GateError::Validation(format!("unsupported endpoint scheme: {other}")));
        }
    };
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| GateError::Validation(format!("endpoint has no host: {trimmed}")))?;
    // `port()` is None when it matches the scheme default; re-derive for ws/wss.
    let port = url.port().filter(|p| {
        let default = if scheme == "https" { 443 } else { 80 };
        *p != default
    });
    Ok(match port {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

fn preview_signalling_url(origin: &str, deployment: &str) -> Result<String, GateError> {
    let base = format!("{}/openai/realtime", websocket_origin(origin));
    let mut url = Url::parse(&base)
        .map_err(|e| GateError::Validation(format!("invalid signalling url {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("api-version", AZURE_PREVIEW_API_VERSION)
        .append_pair("deployment", deployment);
    Ok(url.into())
}

/// `https://x` -> `wss://x`, `http://x` -> `ws://x`.
fn websocket_origin(origin: &str) -> String {
    if let Some(rest) = origin.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = origin.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        origin.to_owned()
    }
}

/// The HTTP call that mints an ephemeral session credential.
#[derive(Clone, PartialEq)]
pub struct BootstrapRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl fmt::Debug for BootstrapRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, String)> =
            self.headers.iter().map(|(k, v)| (k.as_str(), mask_token(v))).collect();
        f.debug_struct("BootstrapRequest")
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Request plus the values the caller needs once it succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapPlan {
    pub provider: Provider,
    pub request: BootstrapRequest,
    pub signalling_url: String,
    pub model: String,
    pub voice_id: String,
    pub azure_protocol: Option<AzureProtocol>,
}

/// Ephemeral credential parsed from a bootstrap response.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub token: String,
    /// Epoch milliseconds.
    pub expires_at: Option<u64>,
}

impl fmt::Debug for SessionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGrant")
            .field("token", &mask_token(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Compute the bootstrap request for `candidate`.
pub fn build_bootstrap(
    candidate: &RealtimeCandidate,
    credential: &ResolvedCredential,
    request: &SessionRequest,
) -> Result<BootstrapPlan, GateError> {
    match candidate.provider {
        Provider::OpenAi => build_openai(candidate, credential, request),
        Provider::Azure => build_azure(candidate, credential, request),
        Provider::Gemini => build_gemini(candidate, credential, request),
    }
}

fn pick_model(candidate: &RealtimeCandidate, request: &SessionRequest, default: &str) -> String {
    candidate
        .model
        .as_deref()
        .or(request.context.preferred_model.as_deref())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(default)
        .to_owned()
}

fn pick_voice(candidate: &RealtimeCandidate, default: &str) -> String {
    candidate
        .voice_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_owned()
}

fn bearer(secret: &str) -> (String, String) {
    ("Authorization".to_owned(), format!("Bearer {secret}"))
}

fn auth_header(credential: &ResolvedCredential, api_key_header: &str) -> (String, String) {
    match credential.source {
        AuthSource::OAuth => bearer(&credential.secret),
        AuthSource::ApiKey => (api_key_header.to_owned(), credential.secret.clone()),
    }
}

fn openai_tools(tools: &[ToolSpec]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
            .collect(),
    )
}

fn gemini_tools(tools: &[ToolSpec]) -> Value {
    let declarations: Vec<Value> = tools
        .iter()
        .map(|t| json!({ "name": t.name, "description": t.description, "parameters": t.parameters }))
        .collect();
    json!([{ "functionDeclarations": declarations }])
}

/// GA session object shared by OpenAI and Azure GA.
fn ga_session_body(model: &str, voice: &str, request: &SessionRequest) -> Value {
    let mut session = Map::new();
    session.insert("type".to_owned(), json!("realtime"));
    session.insert("model".to_owned(), json!(model));
    session.insert("audio".to_owned(), json!({ "output": { "voice": voice } }));
    if let Some(ref instructions) = request.instructions {
        session.insert("instructions".to_owned(), json!(instructions));
    }
    if !request.tools.is_empty() {
        session.insert("tools".to_owned(), openai_tools(&request.tools));
    }
    json!({ "session": session })
}

fn build_openai(
    candidate: &RealtimeCandidate,
    credential: &ResolvedCredential,
    request: &SessionRequest,
) -> Result<BootstrapPlan, GateError> {
    let origin = match candidate.endpoint.as_deref() {
        Some(endpoint) => normalize_origin(endpoint)?,
        None => OPENAI_ORIGIN.to_owned(),
    };
    let model = pick_model(candidate, request, DEFAULT_OPENAI_MODEL);
    let voice_id = pick_voice(candidate, DEFAULT_OPENAI_VOICE);
    Ok(BootstrapPlan {
        provider: Provider::OpenAi,
        request: BootstrapRequest {
            url: format!("{origin}/v1/realtime/client_secrets"),
            headers: vec![bearer(&credential.secret)],
            body: ga_session_body(&model, &voice_id, request),
        },
        signalling_url: format!("{origin}/v1/realtime/calls"),
        model,
        voice_id,
        azure_protocol: None,
    })
}

fn build_azure(
    candidate: &RealtimeCandidate,
    credential: &ResolvedCredential,
    request: &SessionRequest,
) -> Result<BootstrapPlan, GateError> {
    let endpoint = candidate
        .endpoint
        .as_deref()
        .ok_or_else(|| GateError::Validation("azure connection needs an endpoint".to_owned()))?;
    let deployment = candidate
        .deployment_name
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| GateError::Validation("azure connection needs a deployment name".to_owned()))?;
    let origin = normalize_origin(endpoint)?;
    let voice_id = pick_voice(candidate, DEFAULT_OPENAI_VOICE);
    let protocol = azure_protocol(deployment);

    let (url, body, signalling_url) = match protocol {
        AzureProtocol::Ga => (
            format!("{origin}/openai/v1/realtime/client_secrets"),
            ga_session_body(deployment, &voice_id, request),
            format!("{origin}/openai/v1/realtime/calls"),
        ),
        AzureProtocol::Preview => {
            let mut body = Map::new();
            body.insert("model".to_owned(), json!(deployment));
            body.insert("voice".to_owned(), json!(voice_id));
            if let Some(ref instructions) = request.instructions {
                body.insert("instructions".to_owned(), json!(instructions));
            }
            if !request.tools.is_empty() {
                body.insert("tools".to_owned(), openai_tools(&request.tools));
            }
            (
                format!(
                    "{origin}/openai/realtimeapi/sessions?api-version={AZURE_PREVIEW_API_VERSION}"
                ),
                Value::Object(body),
                preview_signalling_url(&origin, deployment)?,
            )
        }
    };

    Ok(BootstrapPlan {
        provider: Provider::Azure,
        request: BootstrapRequest { url, headers: vec![auth_header(credential, "api-key")], body },
        signalling_url,
        model: deployment.to_owned(),
        voice_id,
        azure_protocol: Some(protocol),
    })
}

fn build_gemini(
    candidate: &RealtimeCandidate,
    credential: &ResolvedCredential,
    request: &SessionRequest,
) -> Result<BootstrapPlan, GateError> {
    let origin = match candidate.endpoint.as_deref() {
        Some(endpoint) => normalize_origin(endpoint)?,
        None => GEMINI_ORIGIN.to_owned(),
    };
    let model = pick_model(candidate, request, DEFAULT_GEMINI_MODEL);
    let voice_id = pick_voice(candidate, DEFAULT_GEMINI_VOICE);
    let model_path =
        if model.starts_with("models/") { model.clone() } else { format!("models/{model}") };

    let mut config = Map::new();
    config.insert("responseModalities".to_owned(), json!(["AUDIO"]));
    config.insert(
        "speechConfig".to_owned(),
        json!({ "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice_id } } }),
    );
    if let Some(ref instructions) = request.instructions {
        config.insert("systemInstruction".to_owned(), json!({ "parts": [{ "text": instructions }] }));
    }
    if !request.tools.is_empty() {
        config.insert("tools".to_owned(), gemini_tools(&request.tools));
    }
    let body = json!({
        "uses": 1,
        "liveConnectConstraints": { "model": model_path, "config": config },
    });

    Ok(BootstrapPlan {
        provider: Provider::Gemini,
        request: BootstrapRequest {
            url: format!("{origin}/v1alpha/auth_tokens"),
            headers: vec![auth_header(credential, "x-goog-api-key")],
            body,
        },
        signalling_url: format!("{}{GEMINI_CONSTRAINED_PATH}", websocket_origin(&origin)),
        model,
        voice_id,
        azure_protocol: None,
    })
}

/// Extract the ephemeral credential from a 2xx bootstrap response.
pub fn parse_bootstrap_response(
    plan: &BootstrapPlan,
    body: &Value,
) -> Result<SessionGrant, BootstrapFailure> {
    let (token, expires_at) = match plan.provider {
        Provider::OpenAi | Provider::Azure => {
            // GA: top-level `value`. Preview: nested under `client_secret`.
            let secret = body.get("client_secret").filter(|v| v.is_object()).unwrap_or(body);
            (
                secret.get("value").and_then(Value::as_str),
                secret.get("expires_at").and_then(Value::as_u64).map(to_epoch_ms),
            )
        }
        Provider::Gemini => (body.get("name").and_then(Value::as_str), None),
    };
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Ok(SessionGrant { token: token.to_owned(), expires_at }),
        None => {
            let detail = body
                .get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .map(|e| e.as_str().map(str::to_owned).unwrap_or_else(|| e.to_string()))
                .unwrap_or_else(|| "response carried no ephemeral credential".to_owned());
            Err(BootstrapFailure::InvalidResponse(crate::redact::snippet(&detail)))
        }
    }
}

/// Provider timestamps are epoch seconds; anything already in ms passes through.
fn to_epoch_ms(value: u64) -> u64 {
    if value < 100_000_000_000 {
        value.saturating_mul(1000)
    } else {
        value
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
